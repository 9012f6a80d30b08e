//! Cart ownership and caller identity.

use serde::{Deserialize, Serialize};

use super::CartError;
use crate::types::{SessionToken, UserId};

/// Who a cart belongs to.
///
/// A cart has exactly one owner: a signed-in user or an anonymous guest
/// session. Claiming a guest cart replaces the `Guest` owner with `User`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Owned by an authenticated user.
    User(UserId),
    /// Owned by an anonymous guest session.
    Guest(SessionToken),
}

impl CartOwner {
    /// The owning user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    /// The owning guest session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionToken> {
        match self {
            Self::User(_) => None,
            Self::Guest(token) => Some(token),
        }
    }
}

/// The identity a caller presents when asking for its cart.
///
/// Either part may be missing, but not both. When both are present the user
/// takes precedence and the session is only used to claim a guest cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartIdentity {
    user_id: Option<UserId>,
    session: Option<SessionToken>,
}

impl CartIdentity {
    /// Build an identity from its optional parts.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidIdentity`] when both parts are `None`.
    pub fn new(
        user_id: Option<UserId>,
        session: Option<SessionToken>,
    ) -> Result<Self, CartError> {
        if user_id.is_none() && session.is_none() {
            return Err(CartError::InvalidIdentity);
        }
        Ok(Self { user_id, session })
    }

    /// Identity of a signed-in user with no guest session.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            session: None,
        }
    }

    /// Identity of an anonymous guest.
    #[must_use]
    pub fn guest(session: SessionToken) -> Self {
        Self {
            user_id: None,
            session: Some(session),
        }
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// The guest session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }
}
