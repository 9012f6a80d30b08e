//! Cart service.
//!
//! Resolves the caller's cart and applies operations to it:
//! 1. Resolve the identity to exactly one cart (claiming a guest cart on login)
//! 2. Apply the mutation to the aggregate
//! 3. Save with an optimistic version check
//!
//! A lost version race is returned to the caller as a conflict; nothing here
//! retries.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use inkwell_core::{
    BookCatalog, BookId, Cart, CartError, CartIdentity, CartOwner, ValidationIssue,
};

use crate::db::{CartStore, CatalogError, RepositoryError};
use crate::error::{AppError, add_breadcrumb};
use crate::models::{
    AddItemRequest, CheckoutPreview, GuestEmailRequest, MergeCartRequest, UpdateItemRequest,
};

/// Cart operations over a store and a catalog.
#[derive(Debug, Clone)]
pub struct CartService<S, C> {
    store: S,
    catalog: C,
}

impl<S, C> CartService<S, C>
where
    S: CartStore,
    C: BookCatalog<Error = CatalogError>,
{
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: S, catalog: C) -> Self {
        Self { store, catalog }
    }

    /// The underlying cart store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Find or create the authoritative cart for `identity`.
    ///
    /// A signed-in user gets their own cart. If they have none yet and also
    /// present a guest session, the guest cart is claimed. Guests get the cart
    /// for their session.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidIdentity` if the identity is empty, or a
    /// storage error.
    #[instrument(skip(self, identity), fields(user_id = ?identity.user_id()))]
    pub async fn resolve(&self, identity: &CartIdentity) -> Result<Cart, AppError> {
        match (identity.user_id(), identity.session()) {
            (Some(user_id), session) => {
                if let Some(cart) = self.store.find_by_user(user_id).await? {
                    return Ok(cart);
                }

                if let Some(session) = session {
                    match self.store.claim_guest(session, user_id).await {
                        Ok(Some(cart)) => {
                            let cart_id = cart.id().to_string();
                            info!(%cart_id, "Claimed guest cart");
                            add_breadcrumb(
                                "cart",
                                "Claimed guest cart",
                                Some(&[("cart_id", cart_id.as_str())]),
                            );
                            return Ok(cart);
                        }
                        Ok(None) => {}
                        // Another request created the user cart first.
                        Err(RepositoryError::Conflict(reason)) => {
                            warn!(%reason, "Guest cart claim lost to a concurrent request");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }

                Ok(self.store.find_or_create(&CartOwner::User(user_id)).await?)
            }
            (None, Some(session)) => Ok(self
                .store
                .find_or_create(&CartOwner::Guest(session.clone()))
                .await?),
            (None, None) => Err(CartError::InvalidIdentity.into()),
        }
    }

    /// The existing cart for `identity`, without creating or claiming one.
    async fn find_existing(&self, identity: &CartIdentity) -> Result<Option<Cart>, AppError> {
        if let Some(user_id) = identity.user_id() {
            return Ok(self.store.find_by_user(user_id).await?);
        }
        match identity.session() {
            Some(session) => Ok(self.store.find_by_session(session).await?),
            None => Err(CartError::InvalidIdentity.into()),
        }
    }

    /// Resolve, apply `apply`, and save if it reports a change.
    async fn mutate<F>(&self, identity: &CartIdentity, apply: F) -> Result<Cart, AppError>
    where
        F: FnOnce(&mut Cart, DateTime<Utc>) -> Result<bool, CartError> + Send,
    {
        let mut cart = self.resolve(identity).await?;
        if apply(&mut cart, Utc::now())? {
            cart = self.store.save(&cart).await?;
        }
        Ok(cart)
    }

    /// Add copies of a book to the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Quantity` if the line would exceed the maximum,
    /// `CartError::PriceRequired` for a new line without a price, or a
    /// storage error.
    #[instrument(skip(self, identity, request), fields(book_id = %request.book_id))]
    pub async fn add_item(
        &self,
        identity: &CartIdentity,
        request: AddItemRequest,
    ) -> Result<Cart, AppError> {
        let cart = self
            .mutate(identity, |cart, now| {
                cart.add_item(request.book_id, request.quantity, request.price, now)
                    .map(|()| true)
            })
            .await?;

        debug!(cart_id = %cart.id(), total_items = cart.total_items(), "Added item");
        Ok(cart)
    }

    /// Set the quantity of a line; zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the book is not in the cart,
    /// `CartError::Quantity` if the quantity is too large, or a storage error.
    #[instrument(skip(self, identity, request), fields(quantity = request.quantity))]
    pub async fn update_item(
        &self,
        identity: &CartIdentity,
        book_id: BookId,
        request: UpdateItemRequest,
    ) -> Result<Cart, AppError> {
        self.mutate(identity, |cart, now| {
            cart.update_item(book_id, request.quantity, now)
                .map(|()| true)
        })
        .await
    }

    /// Remove a line. Removing a book that is not in the cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self, identity))]
    pub async fn remove_item(
        &self,
        identity: &CartIdentity,
        book_id: BookId,
    ) -> Result<Cart, AppError> {
        self.mutate(identity, |cart, now| Ok(cart.remove_item(book_id, now)))
            .await
    }

    /// Remove every line, keeping the cart.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self, identity))]
    pub async fn clear(&self, identity: &CartIdentity) -> Result<Cart, AppError> {
        self.mutate(identity, |cart, now| {
            if cart.is_empty() {
                return Ok(false);
            }
            cart.clear(now);
            Ok(true)
        })
        .await
    }

    /// Delete the caller's cart entirely.
    ///
    /// Returns `false` if there was no cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidIdentity` if the identity is empty, or a
    /// storage error.
    #[instrument(skip(self, identity))]
    pub async fn discard(&self, identity: &CartIdentity) -> Result<bool, AppError> {
        let Some(cart) = self.find_existing(identity).await? else {
            return Ok(false);
        };

        let deleted = self.store.delete(cart.id()).await?;
        info!(cart_id = %cart.id(), deleted, "Discarded cart");
        Ok(deleted)
    }

    /// Fold a guest cart into the signed-in user's cart.
    ///
    /// The guest cart is deleted in the same step. If the guest session has
    /// no cart the user's cart is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when the caller is not signed in, or a
    /// storage error.
    #[instrument(skip(self, identity, request))]
    pub async fn merge_guest(
        &self,
        identity: &CartIdentity,
        request: MergeCartRequest,
    ) -> Result<Cart, AppError> {
        if identity.user_id().is_none() {
            return Err(AppError::BadRequest(
                "merging a guest cart requires a signed-in user".to_string(),
            ));
        }

        let mut target = self.resolve(identity).await?;
        let Some(guest) = self.store.find_by_session(&request.session_token).await? else {
            debug!(cart_id = %target.id(), "No guest cart to merge");
            return Ok(target);
        };

        target.merge(&guest, Utc::now());
        let merged = self.store.absorb(&target, &guest).await?;

        info!(
            cart_id = %merged.id(),
            guest_cart_id = %guest.id(),
            total_items = merged.total_items(),
            "Merged guest cart"
        );
        let cart_id = merged.id().to_string();
        add_breadcrumb(
            "cart",
            "Merged guest cart",
            Some(&[("cart_id", cart_id.as_str())]),
        );

        Ok(merged)
    }

    /// Set or clear the guest checkout email.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self, identity, request))]
    pub async fn set_guest_email(
        &self,
        identity: &CartIdentity,
        request: GuestEmailRequest,
    ) -> Result<Cart, AppError> {
        self.mutate(identity, |cart, now| {
            cart.set_guest_email(request.email, now);
            Ok(true)
        })
        .await
    }

    /// Total copies in the caller's cart, zero when there is no cart yet.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidIdentity` if the identity is empty, or a
    /// storage error.
    pub async fn count(&self, identity: &CartIdentity) -> Result<u32, AppError> {
        Ok(self
            .find_existing(identity)
            .await?
            .map_or(0, |cart| cart.total_items()))
    }

    /// Compare every line against the catalog.
    ///
    /// The cart is not modified.
    ///
    /// # Errors
    ///
    /// Returns a storage or catalog error.
    #[instrument(skip(self, identity))]
    pub async fn validate(&self, identity: &CartIdentity) -> Result<Vec<ValidationIssue>, AppError> {
        let cart = self.resolve(identity).await?;
        let issues = cart.validate_items(&self.catalog).await?;

        if !issues.is_empty() {
            info!(cart_id = %cart.id(), issues = issues.len(), "Cart failed validation");
        }
        Ok(issues)
    }

    /// Validation issues plus the order lines the cart would produce.
    ///
    /// # Errors
    ///
    /// Returns a storage or catalog error.
    #[instrument(skip(self, identity))]
    pub async fn checkout_preview(
        &self,
        identity: &CartIdentity,
    ) -> Result<CheckoutPreview, AppError> {
        let cart = self.resolve(identity).await?;
        let issues = cart.validate_items(&self.catalog).await?;
        Ok(CheckoutPreview::new(&cart, issues))
    }

    /// Check that storage is reachable.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.store.ping().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use inkwell_core::{BookSnapshot, BookStatus, Price, Quantity, SessionToken, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{MemoryBookCatalog, MemoryCartStore};

    type Service = CartService<MemoryCartStore, MemoryBookCatalog>;

    fn service() -> Service {
        CartService::new(MemoryCartStore::new(), MemoryBookCatalog::new())
    }

    fn session(s: &str) -> SessionToken {
        SessionToken::parse(s).unwrap()
    }

    fn price(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2)).unwrap()
    }

    fn add(book_id: BookId, quantity: i64, cents: i64) -> AddItemRequest {
        AddItemRequest {
            book_id,
            quantity: Quantity::new(quantity).unwrap(),
            price: Some(price(cents)),
        }
    }

    #[tokio::test]
    async fn test_resolve_requires_identity() {
        let err = service().resolve(&CartIdentity::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Cart(CartError::InvalidIdentity)));
    }

    #[tokio::test]
    async fn test_resolve_creates_one_cart_per_identity() {
        let svc = service();
        let identity = CartIdentity::guest(session("guest-a"));

        let first = svc.resolve(&identity).await.unwrap();
        let second = svc.resolve(&identity).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert!(first.is_empty());
        assert_eq!(svc.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_resolve_yields_one_cart() {
        let svc = service();
        let identity = CartIdentity::user(UserId::generate());

        let (a, b, c) = tokio::join!(
            svc.resolve(&identity),
            svc.resolve(&identity),
            svc.resolve(&identity)
        );

        let ids = [a.unwrap().id(), b.unwrap().id(), c.unwrap().id()];
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(svc.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_guest_resolve_yields_one_cart() {
        let svc = service();
        let token = session("first-visit");
        let identity = CartIdentity::guest(token.clone());

        let (a, b, c) = tokio::join!(
            svc.resolve(&identity),
            svc.resolve(&identity),
            svc.resolve(&identity)
        );

        let ids = [a.unwrap().id(), b.unwrap().id(), c.unwrap().id()];
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(svc.store().len().await, 1);
        assert_eq!(
            svc.store().find_by_session(&token).await.unwrap().unwrap().id(),
            ids[0]
        );
    }

    #[tokio::test]
    async fn test_resolve_replaces_expired_cart() {
        let svc = service();
        let identity = CartIdentity::guest(session("lapsed"));
        let stale = svc
            .add_item(&identity, add(BookId::generate(), 1, 900))
            .await
            .unwrap();

        let mut parts = stale.clone().into_parts();
        parts.expires_at = Utc::now() - chrono::Duration::days(1);
        svc.store().save(&Cart::restore(parts)).await.unwrap();

        assert_eq!(svc.count(&identity).await.unwrap(), 0);
        let fresh = svc.resolve(&identity).await.unwrap();
        assert_ne!(fresh.id(), stale.id());
        assert!(fresh.is_empty());
        assert_eq!(svc.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_claims_guest_cart_on_login() {
        let svc = service();
        let token = session("guest-login");
        let book_id = BookId::generate();
        let guest = svc
            .add_item(&CartIdentity::guest(token.clone()), add(book_id, 2, 1500))
            .await
            .unwrap();

        let user = UserId::generate();
        let identity = CartIdentity::new(Some(user), Some(token.clone())).unwrap();
        let cart = svc.resolve(&identity).await.unwrap();

        assert_eq!(cart.id(), guest.id());
        assert_eq!(cart.owner(), &CartOwner::User(user));
        assert_eq!(cart.total_items(), 2);
        assert!(svc.store().find_by_session(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_existing_user_cart() {
        let svc = service();
        let user = UserId::generate();
        let token = session("guest-second");
        let user_cart = svc.resolve(&CartIdentity::user(user)).await.unwrap();
        svc.resolve(&CartIdentity::guest(token.clone())).await.unwrap();

        let identity = CartIdentity::new(Some(user), Some(token.clone())).unwrap();
        let cart = svc.resolve(&identity).await.unwrap();

        assert_eq!(cart.id(), user_cart.id());
        // The guest cart is left for an explicit merge.
        assert!(svc.store().find_by_session(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_update_remove_flow() {
        let svc = service();
        let identity = CartIdentity::guest(session("flow"));
        let a = BookId::generate();
        let b = BookId::generate();

        svc.add_item(&identity, add(a, 1, 1000)).await.unwrap();
        svc.add_item(&identity, add(a, 1, 1200)).await.unwrap();
        let cart = svc.add_item(&identity, add(b, 3, 500)).await.unwrap();
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.total_items(), 5);
        assert_eq!(cart.total_price(), Decimal::new(3900, 2));

        let cart = svc
            .update_item(&identity, b, UpdateItemRequest { quantity: 0 })
            .await
            .unwrap();
        assert_eq!(cart.total_items(), 2);
        assert!(cart.item(b).is_none());

        let cart = svc.remove_item(&identity, a).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let svc = service();
        let identity = CartIdentity::guest(session("missing"));
        let err = svc
            .update_item(&identity, BookId::generate(), UpdateItemRequest { quantity: 2 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cart(CartError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_add_leaves_stored_cart_untouched() {
        let svc = service();
        let identity = CartIdentity::guest(session("overflow"));
        let book_id = BookId::generate();
        let before = svc.add_item(&identity, add(book_id, 9, 1000)).await.unwrap();

        let err = svc
            .add_item(&identity, add(book_id, 2, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cart(CartError::Quantity(_))));

        let after = svc.resolve(&identity).await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_remove_absent_item_does_not_save() {
        let svc = service();
        let identity = CartIdentity::guest(session("noop"));
        let before = svc.resolve(&identity).await.unwrap();

        let after = svc.remove_item(&identity, BookId::generate()).await.unwrap();
        assert_eq!(after.version(), before.version());
    }

    #[tokio::test]
    async fn test_merge_guest_cart() {
        let svc = service();
        let user = UserId::generate();
        let token = session("merge-me");
        let shared = BookId::generate();
        let only_guest = BookId::generate();

        svc.add_item(&CartIdentity::user(user), add(shared, 1, 1000))
            .await
            .unwrap();
        let guest_identity = CartIdentity::guest(token.clone());
        svc.add_item(&guest_identity, add(shared, 2, 900))
            .await
            .unwrap();
        svc.add_item(&guest_identity, add(only_guest, 1, 450))
            .await
            .unwrap();

        let merged = svc
            .merge_guest(
                &CartIdentity::user(user),
                MergeCartRequest {
                    session_token: token.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(merged.item(shared).unwrap().quantity.get(), 3);
        assert_eq!(merged.item(shared).unwrap().price, price(1000));
        assert_eq!(merged.item(only_guest).unwrap().price, price(450));
        assert_eq!(merged.total_items(), 4);
        assert!(svc.store().find_by_session(&token).await.unwrap().is_none());
        assert_eq!(svc.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_merge_requires_user() {
        let svc = service();
        let err = svc
            .merge_guest(
                &CartIdentity::guest(session("anon")),
                MergeCartRequest {
                    session_token: session("other"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_merge_without_guest_cart_is_noop() {
        let svc = service();
        let identity = CartIdentity::user(UserId::generate());
        let before = svc.resolve(&identity).await.unwrap();

        let after = svc
            .merge_guest(
                &identity,
                MergeCartRequest {
                    session_token: session("ghost"),
                },
            )
            .await
            .unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_clear_and_discard() {
        let svc = service();
        let identity = CartIdentity::guest(session("bye"));
        svc.add_item(&identity, add(BookId::generate(), 2, 700))
            .await
            .unwrap();

        let cart = svc.clear(&identity).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(svc.count(&identity).await.unwrap(), 0);

        assert!(svc.discard(&identity).await.unwrap());
        assert!(!svc.discard(&identity).await.unwrap());
        assert!(svc.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_count_does_not_create_cart() {
        let svc = service();
        let identity = CartIdentity::guest(session("counter"));
        assert_eq!(svc.count(&identity).await.unwrap(), 0);
        assert!(svc.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_validate_reports_issues_without_mutating() {
        let catalog = MemoryBookCatalog::new();
        let svc = CartService::new(MemoryCartStore::new(), catalog.clone());
        let identity = CartIdentity::guest(session("validate"));

        let gone = BookId::generate();
        let scarce = BookId::generate();
        let repriced = BookId::generate();
        svc.add_item(&identity, add(gone, 1, 1000)).await.unwrap();
        svc.add_item(&identity, add(scarce, 5, 1000)).await.unwrap();
        let before = svc.add_item(&identity, add(repriced, 1, 1000)).await.unwrap();

        catalog
            .insert(
                scarce,
                BookSnapshot {
                    status: BookStatus::Active,
                    stock: 2,
                    price: price(1000),
                },
            )
            .await;
        catalog
            .insert(
                repriced,
                BookSnapshot {
                    status: BookStatus::Active,
                    stock: 10,
                    price: price(1250),
                },
            )
            .await;

        let issues = svc.validate(&identity).await.unwrap();
        assert_eq!(
            issues,
            vec![
                ValidationIssue::Unavailable { book_id: gone },
                ValidationIssue::InsufficientStock {
                    book_id: scarce,
                    available: 2,
                    requested: 5,
                },
                ValidationIssue::PriceChanged {
                    book_id: repriced,
                    old_price: price(1000),
                    new_price: price(1250),
                },
            ]
        );

        let after = svc.resolve(&identity).await.unwrap();
        assert_eq!(after, before);

        let preview = svc.checkout_preview(&identity).await.unwrap();
        assert!(!preview.ready);
        assert_eq!(preview.issues.len(), 3);
        assert_eq!(preview.items.len(), 3);
    }

    #[tokio::test]
    async fn test_guest_email() {
        let svc = service();
        let identity = CartIdentity::guest(session("mail"));
        let cart = svc
            .set_guest_email(
                &identity,
                GuestEmailRequest {
                    email: Some(inkwell_core::Email::parse("reader@example.com").unwrap()),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            cart.guest_email().map(inkwell_core::Email::as_str),
            Some("reader@example.com")
        );
    }
}
