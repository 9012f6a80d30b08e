//! Catalog reads from `inkwell.book`.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use inkwell_core::{BookCatalog, BookId, BookSnapshot, BookStatus, Price};

use super::CatalogError;

#[derive(Debug, FromRow)]
struct BookRow {
    status: BookStatus,
    stock: i32,
    price: Decimal,
}

/// A catalog entry to insert or update.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub id: BookId,
    pub title: String,
    pub status: BookStatus,
    pub stock: u32,
    pub price: Price,
}

/// Book catalog backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgBookCatalog {
    pool: PgPool,
}

impl PgBookCatalog {
    /// Create a catalog over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a book, or update it if the ID already exists.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DataCorruption` if `stock` does not fit the
    /// column, or `CatalogError::Database` if the query fails.
    pub async fn upsert_book(&self, book: &NewBook) -> Result<(), CatalogError> {
        let stock = i32::try_from(book.stock)
            .map_err(|_| CatalogError::DataCorruption(format!("stock {} too large", book.stock)))?;

        sqlx::query(
            r"
            INSERT INTO inkwell.book (id, title, status, stock, price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                status = EXCLUDED.status,
                stock = EXCLUDED.stock,
                price = EXCLUDED.price,
                updated_at = now()
            ",
        )
        .bind(book.id.as_uuid())
        .bind(&book.title)
        .bind(book.status)
        .bind(stock)
        .bind(book.price.amount())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl BookCatalog for PgBookCatalog {
    type Error = CatalogError;

    async fn get_book(&self, book_id: BookId) -> Result<Option<BookSnapshot>, CatalogError> {
        let row = sqlx::query_as::<_, BookRow>(
            "SELECT status, stock, price FROM inkwell.book WHERE id = $1",
        )
        .bind(Uuid::from(book_id))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stock = u32::try_from(row.stock).map_err(|_| {
            CatalogError::DataCorruption(format!("negative stock for book {book_id}"))
        })?;
        let price = Price::new(row.price).map_err(|e| {
            CatalogError::DataCorruption(format!("invalid price for book {book_id}: {e}"))
        })?;

        Ok(Some(BookSnapshot {
            status: row.status,
            stock,
            price,
        }))
    }
}
