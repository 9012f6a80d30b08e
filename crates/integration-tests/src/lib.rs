//! Integration tests for the Inkwell cart service.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p inkwell-integration-tests
//! ```
//!
//! Each test starts its own storefront on an ephemeral port, backed by the
//! in-memory cart store and catalog, and talks to it over HTTP with
//! `reqwest`. No database is required.

use std::net::SocketAddr;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio::net::TcpListener;

use inkwell_core::{BookId, BookSnapshot};
use inkwell_storefront::config::StorefrontConfig;
use inkwell_storefront::db::{CartBackend, CatalogBackend, MemoryBookCatalog, MemoryCartStore};
use inkwell_storefront::middleware::{SESSION_HEADER, USER_HEADER};
use inkwell_storefront::state::AppState;

/// A running storefront plus handles to its in-memory backends.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub carts: MemoryCartStore,
    pub catalog: MemoryBookCatalog,
}

/// Who a request is made as.
#[derive(Debug, Clone, Copy, Default)]
pub struct As<'a> {
    pub user_id: Option<&'a str>,
    pub session: Option<&'a str>,
}

impl<'a> As<'a> {
    /// A guest with the given session token.
    #[must_use]
    pub const fn guest(session: &'a str) -> Self {
        Self {
            user_id: None,
            session: Some(session),
        }
    }

    /// A signed-in user.
    #[must_use]
    pub const fn user(user_id: &'a str) -> Self {
        Self {
            user_id: Some(user_id),
            session: None,
        }
    }

    /// A signed-in user still carrying their guest session.
    #[must_use]
    pub const fn user_with_session(user_id: &'a str, session: &'a str) -> Self {
        Self {
            user_id: Some(user_id),
            session: Some(session),
        }
    }

    fn apply(self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(user_id) = self.user_id {
            request = request.header(USER_HEADER, user_id);
        }
        if let Some(session) = self.session {
            request = request.header(SESSION_HEADER, session);
        }
        request
    }
}

impl TestServer {
    /// Start a storefront on `127.0.0.1` with a random port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("Failed to read local addr");

        let carts = MemoryCartStore::new();
        let catalog = MemoryBookCatalog::new();
        let state = AppState::new(
            StorefrontConfig::in_memory(addr),
            CartBackend::Memory(carts.clone()),
            CatalogBackend::Memory(catalog.clone()),
        );

        let app = inkwell_storefront::app(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            carts,
            catalog,
        }
    }

    /// Put a book in the catalog.
    pub async fn stock_book(&self, book_id: BookId, book: BookSnapshot) {
        self.catalog.insert(book_id, book).await;
    }

    /// Build a request to `path` as `who`.
    #[must_use]
    pub fn request(&self, method: reqwest::Method, path: &str, who: As<'_>) -> RequestBuilder {
        who.apply(self.client.request(method, format!("{}{path}", self.base_url)))
    }
}

/// Read a JSON body, or `Null` for an empty one.
///
/// # Panics
///
/// Panics if the body cannot be read or is not valid JSON.
#[allow(clippy::expect_used)]
pub async fn json_body(response: Response) -> Value {
    let bytes = response.bytes().await.expect("Failed to read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
