//! Seed the catalog with books from a YAML file.
//!
//! ```yaml
//! books:
//!   - id: 5b0c3c1e-8f2a-4d7e-9c61-0a4f1f6b2d10
//!     title: The Left Hand of Darkness
//!     stock: 12
//!     price: "14.99"
//!   - id: 9e7d4b2a-1c3f-4e5d-8a6b-7c8d9e0f1a2b
//!     title: Out of print
//!     status: discontinued
//!     stock: 0
//!     price: "9.50"
//! ```
//!
//! Existing books with the same ID are updated in place.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use inkwell_core::{BookId, BookStatus, Price};
use inkwell_storefront::db::PgBookCatalog;
use inkwell_storefront::db::books::NewBook;

use super::{CommandError, connect};

/// Top level of a seed file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    books: Vec<SeedBook>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedBook {
    id: BookId,
    title: String,
    #[serde(default)]
    status: BookStatus,
    stock: u32,
    price: Price,
}

impl From<SeedBook> for NewBook {
    fn from(book: SeedBook) -> Self {
        Self {
            id: book.id,
            title: book.title,
            status: book.status,
            stock: book.stock,
            price: book.price,
        }
    }
}

/// Problems that make a seed file unusable.
fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, book) in seed.books.iter().enumerate() {
        if book.title.trim().is_empty() {
            errors.push(format!("books[{index}]: title is empty"));
        }
        if !seen.insert(book.id) {
            errors.push(format!("books[{index}]: duplicate id {}", book.id));
        }
    }
    errors
}

/// Insert or update every book in `path`.
///
/// The file is parsed and validated before connecting to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database write fails.
pub async fn books(path: &Path) -> Result<(), CommandError> {
    info!(path = %path.display(), "Loading books from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    info!(books = seed.books.len(), "Parsed seed file");

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Validation(errors.len()));
    }

    let catalog = PgBookCatalog::new(connect().await?);

    let total = seed.books.len();
    for book in seed.books {
        catalog.upsert_book(&NewBook::from(book)).await?;
    }

    info!(upserted = total, "Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SEED: &str = r#"
books:
  - id: 5b0c3c1e-8f2a-4d7e-9c61-0a4f1f6b2d10
    title: The Left Hand of Darkness
    stock: 12
    price: "14.99"
  - id: 9e7d4b2a-1c3f-4e5d-8a6b-7c8d9e0f1a2b
    title: Out of print
    status: discontinued
    stock: 0
    price: "9.50"
"#;

    #[test]
    fn test_parse_seed_file() {
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        assert_eq!(seed.books.len(), 2);
        assert_eq!(seed.books[0].status, BookStatus::Active);
        assert_eq!(seed.books[0].price.to_string(), "$14.99");
        assert_eq!(seed.books[1].status, BookStatus::Discontinued);
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_validate_reports_duplicates_and_blank_titles() {
        let yaml = r#"
books:
  - id: 5b0c3c1e-8f2a-4d7e-9c61-0a4f1f6b2d10
    title: "  "
    stock: 1
    price: "1.00"
  - id: 5b0c3c1e-8f2a-4d7e-9c61-0a4f1f6b2d10
    title: Again
    stock: 1
    price: "1.00"
"#;
        let seed: SeedFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(validate(&seed).len(), 2);
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let yaml = r#"
books:
  - id: 5b0c3c1e-8f2a-4d7e-9c61-0a4f1f6b2d10
    title: Refund
    stock: 1
    price: "-1.00"
"#;
        assert!(serde_yaml::from_str::<SeedFile>(yaml).is_err());
    }
}
