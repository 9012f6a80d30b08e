//! `PostgreSQL` cart store.
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow` rows) so
//! the crate builds without a database or an offline query cache.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use inkwell_core::{
    BookId, Cart, CartId, CartItem, CartOwner, CartParts, Email, Price, Quantity, SessionToken,
    UserId,
};

use super::{CartStore, RepositoryError};

#[derive(Debug, FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    session_id: Option<String>,
    guest_email: Option<String>,
    expires_at: DateTime<Utc>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CartItemRow {
    book_id: Uuid,
    quantity: i16,
    price: Decimal,
    added_at: DateTime<Utc>,
}

/// Cart store backed by the `inkwell.cart` and `inkwell.cart_item` tables.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn owner_from_row(row: &CartRow) -> Result<CartOwner, RepositoryError> {
    match (row.user_id, row.session_id.as_deref()) {
        (Some(user_id), None) => Ok(CartOwner::User(UserId::new(user_id))),
        (None, Some(session)) => SessionToken::parse(session)
            .map(CartOwner::Guest)
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid session token in cart {}: {e}", row.id))
            }),
        _ => Err(RepositoryError::DataCorruption(format!(
            "cart {} must have exactly one owner",
            row.id
        ))),
    }
}

fn item_from_row(row: CartItemRow) -> Result<CartItem, RepositoryError> {
    let quantity = Quantity::new(i64::from(row.quantity)).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid quantity for book {}: {e}", row.book_id))
    })?;
    let price = Price::new(row.price).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid price for book {}: {e}", row.book_id))
    })?;

    Ok(CartItem {
        book_id: BookId::new(row.book_id),
        quantity,
        price,
        added_at: row.added_at,
    })
}

/// Load the lines of `row` and rebuild the aggregate.
async fn hydrate<'e>(
    executor: impl PgExecutor<'e>,
    row: CartRow,
) -> Result<Cart, RepositoryError> {
    let owner = owner_from_row(&row)?;

    let guest_email = row
        .guest_email
        .as_deref()
        .map(Email::parse)
        .transpose()
        .map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid guest email in database: {e}"))
        })?;

    let items = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT book_id, quantity, price, added_at
        FROM inkwell.cart_item
        WHERE cart_id = $1
        ORDER BY position
        ",
    )
    .bind(row.id)
    .fetch_all(executor)
    .await?
    .into_iter()
    .map(item_from_row)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart::restore(CartParts {
        id: CartId::new(row.id),
        owner,
        items,
        guest_email,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    }))
}

/// Write the header and lines of `cart`, checking its version.
///
/// Returns the new version.
async fn write_cart(conn: &mut PgConnection, cart: &Cart) -> Result<i64, RepositoryError> {
    let total_items = i32::try_from(cart.total_items()).map_err(|_| {
        RepositoryError::DataCorruption(format!("cart {} holds too many items", cart.id()))
    })?;

    let version: Option<i64> = sqlx::query_scalar(
        r"
        UPDATE inkwell.cart
        SET user_id = $3,
            session_id = $4,
            total_items = $5,
            total_price = $6,
            guest_email = $7,
            expires_at = $8,
            updated_at = $9,
            version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING version
        ",
    )
    .bind(cart.id().as_uuid())
    .bind(cart.version())
    .bind(cart.owner().user_id().map(|id| id.as_uuid()))
    .bind(cart.owner().session().map(SessionToken::as_str))
    .bind(total_items)
    .bind(cart.total_price())
    .bind(cart.guest_email().map(Email::as_str))
    .bind(cart.expires_at())
    .bind(cart.updated_at())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict("cart owner already has a cart".to_owned());
        }
        RepositoryError::Database(e)
    })?;

    let Some(version) = version else {
        return Err(RepositoryError::Conflict(format!(
            "cart {} was modified concurrently",
            cart.id()
        )));
    };

    sqlx::query("DELETE FROM inkwell.cart_item WHERE cart_id = $1")
        .bind(cart.id().as_uuid())
        .execute(&mut *conn)
        .await?;

    if !cart.is_empty() {
        let items = cart.items();
        let book_ids: Vec<Uuid> = items.iter().map(|item| item.book_id.as_uuid()).collect();
        let positions: Vec<i32> = (0..).take(items.len()).collect();
        let quantities: Vec<i16> = items
            .iter()
            .map(|item| i16::from(item.quantity.get()))
            .collect();
        let prices: Vec<Decimal> = items.iter().map(|item| item.price.amount()).collect();
        let added: Vec<DateTime<Utc>> = items.iter().map(|item| item.added_at).collect();

        sqlx::query(
            r"
            INSERT INTO inkwell.cart_item (cart_id, book_id, position, quantity, price, added_at)
            SELECT $1, book_id, position, quantity, price, added_at
            FROM UNNEST($2::uuid[], $3::int4[], $4::int2[], $5::numeric[], $6::timestamptz[])
                AS line(book_id, position, quantity, price, added_at)
            ",
        )
        .bind(cart.id().as_uuid())
        .bind(book_ids)
        .bind(positions)
        .bind(quantities)
        .bind(prices)
        .bind(added)
        .execute(&mut *conn)
        .await?;
    }

    Ok(version)
}

/// Delete `owner`'s cart if it has expired, freeing the owner's unique slot.
async fn delete_expired(conn: &mut PgConnection, owner: &CartOwner) -> Result<(), RepositoryError> {
    let query = match owner {
        CartOwner::User(user_id) => sqlx::query(
            "DELETE FROM inkwell.cart WHERE user_id = $1 AND expires_at <= now()",
        )
        .bind(user_id.as_uuid()),
        CartOwner::Guest(session) => sqlx::query(
            "DELETE FROM inkwell.cart WHERE session_id = $1 AND expires_at <= now()",
        )
        .bind(session.as_str()),
    };
    let deleted = query.execute(conn).await?.rows_affected();
    if deleted > 0 {
        tracing::debug!("replaced expired cart");
    }
    Ok(())
}

fn with_version(cart: &Cart, version: i64) -> Cart {
    let mut parts = cart.clone().into_parts();
    parts.version = version;
    Cart::restore(parts)
}

impl CartStore for PgCartStore {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, session_id, guest_email, expires_at, version, created_at, updated_at
            FROM inkwell.cart
            WHERE user_id = $1 AND expires_at > now()
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(hydrate(&self.pool, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_session(
        &self,
        session: &SessionToken,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, session_id, guest_email, expires_at, version, created_at, updated_at
            FROM inkwell.cart
            WHERE session_id = $1 AND expires_at > now()
            ",
        )
        .bind(session.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(hydrate(&self.pool, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_or_create(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        let fresh = Cart::new(owner.clone(), Utc::now());

        // The no-op DO UPDATE makes RETURNING yield the existing row on conflict.
        let query = match owner {
            CartOwner::User(_) => {
                r"
                INSERT INTO inkwell.cart (id, user_id, session_id, expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                ON CONFLICT (user_id) WHERE user_id IS NOT NULL
                DO UPDATE SET user_id = EXCLUDED.user_id
                RETURNING id, user_id, session_id, guest_email, expires_at, version, created_at, updated_at
                "
            }
            CartOwner::Guest(_) => {
                r"
                INSERT INTO inkwell.cart (id, user_id, session_id, expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                ON CONFLICT (session_id) WHERE session_id IS NOT NULL
                DO UPDATE SET session_id = EXCLUDED.session_id
                RETURNING id, user_id, session_id, guest_email, expires_at, version, created_at, updated_at
                "
            }
        };

        let mut tx = self.pool.begin().await?;
        delete_expired(&mut tx, owner).await?;

        let row = sqlx::query_as::<_, CartRow>(query)
            .bind(fresh.id().as_uuid())
            .bind(owner.user_id().map(|id| id.as_uuid()))
            .bind(owner.session().map(SessionToken::as_str))
            .bind(fresh.expires_at())
            .bind(fresh.created_at())
            .fetch_one(&mut *tx)
            .await?;

        if row.id == fresh.id().as_uuid() {
            tracing::debug!(cart_id = %row.id, "created cart");
        }

        let cart = hydrate(&mut *tx, row).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn claim_guest(
        &self,
        session: &SessionToken,
        user_id: UserId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        delete_expired(&mut tx, &CartOwner::User(user_id)).await?;

        let row = sqlx::query_as::<_, CartRow>(
            r"
            UPDATE inkwell.cart
            SET user_id = $1,
                session_id = NULL,
                updated_at = now(),
                version = version + 1
            WHERE session_id = $2 AND expires_at > now()
            RETURNING id, user_id, session_id, guest_email, expires_at, version, created_at, updated_at
            ",
        )
        .bind(user_id.as_uuid())
        .bind(session.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("user already has a cart".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cart = hydrate(&mut *tx, row).await?;
        tx.commit().await?;

        Ok(Some(cart))
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let version = write_cart(&mut tx, cart).await?;
        tx.commit().await?;

        Ok(with_version(cart, version))
    }

    async fn absorb(&self, target: &Cart, source: &Cart) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let version = write_cart(&mut tx, target).await?;

        let deleted = sqlx::query("DELETE FROM inkwell.cart WHERE id = $1 AND version = $2")
            .bind(source.id().as_uuid())
            .bind(source.version())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back the target write.
            return Err(RepositoryError::Conflict(format!(
                "cart {} was modified concurrently",
                source.id()
            )));
        }

        tx.commit().await?;

        Ok(with_version(target, version))
    }

    async fn delete(&self, id: CartId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM inkwell.cart WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM inkwell.cart WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
