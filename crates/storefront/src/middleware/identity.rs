//! Cart identity extraction.
//!
//! Authentication happens upstream: the gateway verifies the shopper and
//! forwards their ID in `x-user-id`. Guests carry an opaque token in
//! `x-cart-session`, issued by `POST /api/cart/session`.

use axum::{extract::FromRequestParts, http::request::Parts};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use inkwell_core::{CartIdentity, SessionToken, SessionTokenError, UserId};

use crate::error::{AppError, set_sentry_user};

/// Header carrying the authenticated user's ID.
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the guest session token.
pub const SESSION_HEADER: &str = "x-cart-session";

/// Random bytes in a generated session token.
const SESSION_TOKEN_BYTES: usize = 32;

/// Extractor for the caller's cart identity.
///
/// Rejects with `400 Bad Request` when neither header is present or either
/// is malformed.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequestIdentity(identity): RequestIdentity) -> impl IntoResponse {
///     format!("user: {:?}", identity.user_id())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestIdentity(pub CartIdentity);

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_HEADER)?
            .map(|raw| {
                raw.parse::<UserId>()
                    .map_err(|_| AppError::BadRequest(format!("{USER_HEADER} must be a UUID")))
            })
            .transpose()?;

        let session = header(parts, SESSION_HEADER)?
            .map(|raw| {
                SessionToken::parse(raw)
                    .map_err(|e| AppError::BadRequest(format!("{SESSION_HEADER}: {e}")))
            })
            .transpose()?;

        if let Some(user_id) = user_id {
            set_sentry_user(&user_id);
        }

        Ok(Self(CartIdentity::new(user_id, session)?))
    }
}

/// A header value as text; empty values count as absent.
fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::BadRequest(format!("{name} must be ASCII")))?
        .trim();
    Ok((!value.is_empty()).then_some(value))
}

/// Issue a fresh guest session token.
///
/// 32 random bytes, URL-safe base64 without padding (43 characters).
///
/// # Errors
///
/// Returns an error if the encoded token is rejected by [`SessionToken::parse`].
pub fn generate_session_token() -> Result<SessionToken, SessionTokenError> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    SessionToken::parse(&URL_SAFE_NO_PAD.encode(bytes))
}
