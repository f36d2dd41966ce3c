mod claims;
mod jwt;

pub use claims::Claims;
pub use jwt::JwtVerifier;

use async_trait::async_trait;

use crate::error::AppError;

/// Unique participant name derived from a verified credential. Used as the
/// registry key for the lifetime of a connection.
pub type Identity = String;

/// Verifies an opaque bearer credential and yields the identity it names.
///
/// Invoked exactly once per connection attempt, before the transport upgrade.
/// A failure here rejects the connection outright; no relay state is created.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError>;
}
