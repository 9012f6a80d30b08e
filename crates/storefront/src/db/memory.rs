//! In-memory stores for local development and tests.
//!
//! Every operation takes the map's write lock for its whole duration, which
//! gives the same per-identity atomicity the `PostgreSQL` store gets from
//! upserts and transactions. Carts past `expires_at` are invisible to lookups
//! and replaced on the next find-or-create, as in `PostgreSQL`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use inkwell_core::{
    BookCatalog, BookId, BookSnapshot, Cart, CartId, CartOwner, SessionToken, UserId,
};

use super::{CartStore, CatalogError, RepositoryError};

/// Cart store holding every cart in a shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    carts: Arc<RwLock<HashMap<CartId, Cart>>>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored carts.
    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }

    /// Whether the store holds no carts.
    pub async fn is_empty(&self) -> bool {
        self.carts.read().await.is_empty()
    }
}

fn find_owned<'a>(
    carts: &'a HashMap<CartId, Cart>,
    owner: &CartOwner,
    now: DateTime<Utc>,
) -> Option<&'a Cart> {
    carts
        .values()
        .find(|cart| cart.owner() == owner && !cart.is_expired(now))
}

/// Remove an expired cart held by `owner`, freeing the owner slot.
fn drop_expired(carts: &mut HashMap<CartId, Cart>, owner: &CartOwner, now: DateTime<Utc>) {
    carts.retain(|_, cart| cart.owner() != owner || !cart.is_expired(now));
}

fn next_version(cart: Cart) -> Cart {
    let mut parts = cart.into_parts();
    parts.version += 1;
    Cart::restore(parts)
}

fn check_version(carts: &HashMap<CartId, Cart>, cart: &Cart) -> Result<(), RepositoryError> {
    let stored = carts.get(&cart.id()).ok_or(RepositoryError::NotFound)?;
    if stored.version() != cart.version() {
        return Err(RepositoryError::Conflict(format!(
            "cart {} was modified concurrently",
            cart.id()
        )));
    }
    Ok(())
}

impl CartStore for MemoryCartStore {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(find_owned(&carts, &CartOwner::User(user_id), Utc::now()).cloned())
    }

    async fn find_by_session(
        &self,
        session: &SessionToken,
    ) -> Result<Option<Cart>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(find_owned(&carts, &CartOwner::Guest(session.clone()), Utc::now()).cloned())
    }

    async fn find_or_create(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        let now = Utc::now();
        let mut carts = self.carts.write().await;
        drop_expired(&mut carts, owner, now);
        if let Some(cart) = find_owned(&carts, owner, now) {
            return Ok(cart.clone());
        }

        let cart = Cart::new(owner.clone(), now);
        carts.insert(cart.id(), cart.clone());
        tracing::debug!(cart_id = %cart.id(), "created cart");
        Ok(cart)
    }

    async fn claim_guest(
        &self,
        session: &SessionToken,
        user_id: UserId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let now = Utc::now();
        let guest = CartOwner::Guest(session.clone());
        let user = CartOwner::User(user_id);
        let mut carts = self.carts.write().await;
        drop_expired(&mut carts, &guest, now);
        drop_expired(&mut carts, &user, now);

        let Some(id) = find_owned(&carts, &guest, now).map(Cart::id) else {
            return Ok(None);
        };
        if find_owned(&carts, &user, now).is_some() {
            return Err(RepositoryError::Conflict("user already has a cart".to_owned()));
        }

        let Some(mut cart) = carts.remove(&id) else {
            return Ok(None);
        };
        cart.claim(user_id, now);
        let cart = next_version(cart);
        carts.insert(id, cart.clone());
        Ok(Some(cart))
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, RepositoryError> {
        let mut carts = self.carts.write().await;
        check_version(&carts, cart)?;

        if let Some(other) = carts
            .values()
            .find(|other| other.id() != cart.id() && other.owner() == cart.owner())
        {
            return Err(RepositoryError::Conflict(format!(
                "owner of cart {} already has cart {}",
                cart.id(),
                other.id()
            )));
        }

        let saved = next_version(cart.clone());
        carts.insert(saved.id(), saved.clone());
        Ok(saved)
    }

    async fn absorb(&self, target: &Cart, source: &Cart) -> Result<Cart, RepositoryError> {
        let mut carts = self.carts.write().await;
        check_version(&carts, target)?;
        check_version(&carts, source)?;

        carts.remove(&source.id());
        let saved = next_version(target.clone());
        carts.insert(saved.id(), saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: CartId) -> Result<bool, RepositoryError> {
        Ok(self.carts.write().await.remove(&id).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut carts = self.carts.write().await;
        let before = carts.len();
        carts.retain(|_, cart| !cart.is_expired(now));
        Ok(u64::try_from(before - carts.len()).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Catalog holding book snapshots in a shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBookCatalog {
    books: Arc<RwLock<HashMap<BookId, BookSnapshot>>>,
}

impl MemoryBookCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a book.
    pub async fn insert(&self, book_id: BookId, book: BookSnapshot) {
        self.books.write().await.insert(book_id, book);
    }

    /// Remove a book. Returns `false` if it was not present.
    pub async fn remove(&self, book_id: BookId) -> bool {
        self.books.write().await.remove(&book_id).is_some()
    }
}

impl BookCatalog for MemoryBookCatalog {
    type Error = CatalogError;

    async fn get_book(&self, book_id: BookId) -> Result<Option<BookSnapshot>, CatalogError> {
        Ok(self.books.read().await.get(&book_id).copied())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use inkwell_core::{BookStatus, Price, Quantity};
    use rust_decimal::Decimal;

    use super::*;

    fn session(s: &str) -> SessionToken {
        SessionToken::parse(s).unwrap()
    }

    fn price(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2)).unwrap()
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = MemoryCartStore::new();
        let owner = CartOwner::Guest(session("guest-1"));

        let first = store.find_or_create(&owner).await.unwrap();
        let second = store.find_or_create(&owner).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_rejects_stale_writes() {
        let store = MemoryCartStore::new();
        let user = UserId::generate();
        let mut cart = store.find_or_create(&CartOwner::User(user)).await.unwrap();
        let stale = cart.clone();

        cart.add_item(BookId::generate(), Quantity::ONE, Some(price(1500)), Utc::now())
            .unwrap();
        let saved = store.save(&cart).await.unwrap();
        assert_eq!(saved.version(), cart.version() + 1);
        assert_eq!(saved.total_items(), 1);

        let err = store.save(&stale).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = store.find_by_user(user).await.unwrap().unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn test_save_unknown_cart_is_not_found() {
        let store = MemoryCartStore::new();
        let cart = Cart::new(CartOwner::User(UserId::generate()), Utc::now());
        assert!(matches!(
            store.save(&cart).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_claim_guest_reassigns_owner() {
        let store = MemoryCartStore::new();
        let token = session("guest-claim");
        let guest = store
            .find_or_create(&CartOwner::Guest(token.clone()))
            .await
            .unwrap();
        let user = UserId::generate();

        let claimed = store.claim_guest(&token, user).await.unwrap().unwrap();

        assert_eq!(claimed.id(), guest.id());
        assert_eq!(claimed.owner(), &CartOwner::User(user));
        assert!(store.find_by_session(&token).await.unwrap().is_none());
        assert_eq!(
            store.find_by_user(user).await.unwrap().map(|c| c.id()),
            Some(guest.id())
        );
    }

    #[tokio::test]
    async fn test_claim_guest_without_guest_cart() {
        let store = MemoryCartStore::new();
        let claimed = store
            .claim_guest(&session("nobody"), UserId::generate())
            .await
            .unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_claim_guest_conflicts_with_existing_user_cart() {
        let store = MemoryCartStore::new();
        let token = session("guest-2");
        let user = UserId::generate();
        store
            .find_or_create(&CartOwner::Guest(token.clone()))
            .await
            .unwrap();
        store.find_or_create(&CartOwner::User(user)).await.unwrap();

        let err = store.claim_guest(&token, user).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(store.find_by_session(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_absorb_deletes_source() {
        let store = MemoryCartStore::new();
        let token = session("guest-3");
        let user = UserId::generate();
        let guest = store
            .find_or_create(&CartOwner::Guest(token.clone()))
            .await
            .unwrap();
        let mut target = store.find_or_create(&CartOwner::User(user)).await.unwrap();

        target.merge(&guest, Utc::now());
        let saved = store.absorb(&target, &guest).await.unwrap();

        assert_eq!(saved.id(), target.id());
        assert!(store.find_by_session(&token).await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryCartStore::new();
        store
            .find_or_create(&CartOwner::Guest(session("old")))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 0);
        let later = Utc::now() + Duration::days(31);
        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    async fn expire(store: &MemoryCartStore, cart: Cart) -> Cart {
        let mut parts = cart.into_parts();
        parts.expires_at = Utc::now() - Duration::minutes(1);
        store.save(&Cart::restore(parts)).await.unwrap()
    }

    #[tokio::test]
    async fn test_expired_cart_is_replaced() {
        let store = MemoryCartStore::new();
        let token = session("stale");
        let owner = CartOwner::Guest(token.clone());
        let stale = store.find_or_create(&owner).await.unwrap();
        expire(&store, stale.clone()).await;

        assert!(store.find_by_session(&token).await.unwrap().is_none());

        let fresh = store.find_or_create(&owner).await.unwrap();
        assert_ne!(fresh.id(), stale.id());
        assert!(!fresh.is_expired(Utc::now()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_claim_ignores_expired_guest_cart() {
        let store = MemoryCartStore::new();
        let token = session("stale-guest");
        let guest = store
            .find_or_create(&CartOwner::Guest(token.clone()))
            .await
            .unwrap();
        expire(&store, guest).await;

        let claimed = store.claim_guest(&token, UserId::generate()).await.unwrap();
        assert!(claimed.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_claim_replaces_expired_user_cart() {
        let store = MemoryCartStore::new();
        let user = UserId::generate();
        let token = session("fresh-guest");
        let old = store.find_or_create(&CartOwner::User(user)).await.unwrap();
        expire(&store, old).await;
        let guest = store
            .find_or_create(&CartOwner::Guest(token.clone()))
            .await
            .unwrap();

        let claimed = store.claim_guest(&token, user).await.unwrap().unwrap();
        assert_eq!(claimed.id(), guest.id());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_catalog() {
        let catalog = MemoryBookCatalog::new();
        let book_id = BookId::generate();
        let book = BookSnapshot {
            status: BookStatus::Active,
            stock: 3,
            price: price(999),
        };

        assert!(catalog.get_book(book_id).await.unwrap().is_none());
        catalog.insert(book_id, book).await;
        assert_eq!(catalog.get_book(book_id).await.unwrap(), Some(book));
        assert!(catalog.remove(book_id).await);
        assert!(!catalog.remove(book_id).await);
    }
}
