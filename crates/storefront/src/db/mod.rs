//! Cart persistence and catalog access.
//!
//! # Database: `inkwell`
//!
//! ## Tables
//!
//! - `inkwell.cart` - One row per cart, owned by a user or a guest session
//! - `inkwell.cart_item` - Cart lines, primary key `(cart_id, book_id)`
//! - `inkwell.book` - Catalog fields read by pre-checkout validation
//!
//! # Stores
//!
//! [`CartStore`] is the seam between the cart service and storage. Two
//! implementations exist: [`PgCartStore`] for `PostgreSQL` and
//! [`MemoryCartStore`] for local development and tests. [`CartBackend`]
//! selects one at startup.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p inkwell-cli -- migrate
//! ```

pub mod books;
pub mod carts;
pub mod memory;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use inkwell_core::{
    BookCatalog, BookId, BookSnapshot, Cart, CartId, CartOwner, SessionToken, UserId,
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use books::PgBookCatalog;
pub use carts::PgCartStore;
pub use memory::{MemoryBookCatalog, MemoryCartStore};

/// Errors from cart storage.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// A concurrent writer won (stale version or unique constraint).
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database error from sqlx.
    #[error("catalog query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// A catalog row could not be interpreted.
    #[error("invalid catalog data: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage for carts.
///
/// Implementations must make `find_or_create` and `claim_guest` atomic per
/// identity and reject stale writes in `save` and `absorb` with
/// [`RepositoryError::Conflict`].
pub trait CartStore: Send + Sync {
    /// The cart owned by `user_id`, if any.
    fn find_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// The guest cart for `session`, if any.
    fn find_by_session(
        &self,
        session: &SessionToken,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// The cart for `owner`, creating an empty one if none exists.
    ///
    /// Concurrent calls for the same owner return the same cart.
    fn find_or_create(
        &self,
        owner: &CartOwner,
    ) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Reassign the guest cart for `session` to `user_id`.
    ///
    /// Returns `None` when there is no guest cart for `session`, and
    /// [`RepositoryError::Conflict`] when the user already owns a cart.
    fn claim_guest(
        &self,
        session: &SessionToken,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Persist items, totals and metadata of a loaded cart.
    ///
    /// Returns the cart at its new version.
    fn save(&self, cart: &Cart) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Persist `target` and delete `source` in one step.
    fn absorb(
        &self,
        target: &Cart,
        source: &Cart,
    ) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Delete a cart. Returns `false` if it did not exist.
    fn delete(&self, id: CartId) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every cart whose `expires_at` is before `now`.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Check that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// The cart store selected at startup.
#[derive(Debug, Clone)]
pub enum CartBackend {
    Postgres(PgCartStore),
    Memory(MemoryCartStore),
}

impl CartStore for CartBackend {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        match self {
            Self::Postgres(store) => store.find_by_user(user_id).await,
            Self::Memory(store) => store.find_by_user(user_id).await,
        }
    }

    async fn find_by_session(
        &self,
        session: &SessionToken,
    ) -> Result<Option<Cart>, RepositoryError> {
        match self {
            Self::Postgres(store) => store.find_by_session(session).await,
            Self::Memory(store) => store.find_by_session(session).await,
        }
    }

    async fn find_or_create(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        match self {
            Self::Postgres(store) => store.find_or_create(owner).await,
            Self::Memory(store) => store.find_or_create(owner).await,
        }
    }

    async fn claim_guest(
        &self,
        session: &SessionToken,
        user_id: UserId,
    ) -> Result<Option<Cart>, RepositoryError> {
        match self {
            Self::Postgres(store) => store.claim_guest(session, user_id).await,
            Self::Memory(store) => store.claim_guest(session, user_id).await,
        }
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        match self {
            Self::Postgres(store) => store.save(cart).await,
            Self::Memory(store) => store.save(cart).await,
        }
    }

    async fn absorb(&self, target: &Cart, source: &Cart) -> Result<Cart, RepositoryError> {
        match self {
            Self::Postgres(store) => store.absorb(target, source).await,
            Self::Memory(store) => store.absorb(target, source).await,
        }
    }

    async fn delete(&self, id: CartId) -> Result<bool, RepositoryError> {
        match self {
            Self::Postgres(store) => store.delete(id).await,
            Self::Memory(store) => store.delete(id).await,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        match self {
            Self::Postgres(store) => store.purge_expired(now).await,
            Self::Memory(store) => store.purge_expired(now).await,
        }
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(store) => store.ping().await,
        }
    }
}

/// The catalog selected at startup.
#[derive(Debug, Clone)]
pub enum CatalogBackend {
    Postgres(PgBookCatalog),
    Memory(MemoryBookCatalog),
}

impl BookCatalog for CatalogBackend {
    type Error = CatalogError;

    async fn get_book(&self, book_id: BookId) -> Result<Option<BookSnapshot>, CatalogError> {
        match self {
            Self::Postgres(catalog) => catalog.get_book(book_id).await,
            Self::Memory(catalog) => catalog.get_book(book_id).await,
        }
    }
}
