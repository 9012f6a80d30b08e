//! Cart maintenance commands.

use chrono::Utc;

use inkwell_storefront::db::{CartStore, PgCartStore};

use super::{CommandError, connect};

/// Delete every cart whose `expires_at` has passed.
///
/// The stores already hide expired carts from lookups; this reclaims the rows
/// of carts whose owners never come back, so it should run on a schedule.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn purge_expired() -> Result<(), CommandError> {
    let store = PgCartStore::new(connect().await?);

    let now = Utc::now();
    let purged = store.purge_expired(now).await?;

    tracing::info!(purged, cutoff = %now, "Purged expired carts");
    Ok(())
}
