//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{StoreKind, StorefrontConfig};
use crate::db::{
    self, CartBackend, CatalogBackend, MemoryBookCatalog, MemoryCartStore, PgBookCatalog,
    PgCartStore,
};
use crate::error::AppError;
use crate::services::CartService;

/// The cart service as wired into the HTTP layer.
pub type Carts = CartService<CartBackend, CatalogBackend>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the cart service and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    carts: Carts,
}

impl AppState {
    /// Create a new application state from already-built backends.
    #[must_use]
    pub fn new(config: StorefrontConfig, store: CartBackend, catalog: CatalogBackend) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                carts: CartService::new(store, catalog),
            }),
        }
    }

    /// Build the backends named by `config.store` and create the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL is missing or the pool cannot
    /// connect.
    pub async fn from_config(config: StorefrontConfig) -> Result<Self, AppError> {
        let (store, catalog) = match config.store {
            StoreKind::Postgres => {
                let url = config.database_url.as_ref().ok_or_else(|| {
                    AppError::Internal("postgres store requires a database URL".to_string())
                })?;
                let pool = db::create_pool(url)
                    .await
                    .map_err(|e| AppError::Internal(format!("database connection failed: {e}")))?;
                tracing::info!("Database pool created");
                (
                    CartBackend::Postgres(PgCartStore::new(pool.clone())),
                    CatalogBackend::Postgres(PgBookCatalog::new(pool)),
                )
            }
            StoreKind::Memory => {
                tracing::warn!("Using in-memory cart store; carts are lost on restart");
                (
                    CartBackend::Memory(MemoryCartStore::new()),
                    CatalogBackend::Memory(MemoryBookCatalog::new()),
                )
            }
        };

        Ok(Self::new(config, store, catalog))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn carts(&self) -> &Carts {
        &self.inner.carts
    }
}
