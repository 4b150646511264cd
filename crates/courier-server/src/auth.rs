//! Identity verification seam.
//!
//! The coordination layer never makes authorization decisions itself: an
//! `authenticate` event hands its token to a [`TokenVerifier`] and either
//! binds the returned identity or reports `auth_error` to the sender.

use async_trait::async_trait;
use courier_core::Identity;
use thiserror::Error;

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token was missing or empty.
    #[error("missing or empty token")]
    MissingToken,

    /// Token was rejected by the verifier.
    #[error("token rejected")]
    Rejected,

    /// The verifier itself failed.
    #[error("verification unavailable: {0}")]
    Unavailable(String),
}

/// Credentials presented by an `authenticate` event.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub user_id: String,
    pub nickname: String,
    pub token: String,
}

/// Capability that turns a token into a verified identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify the request's token and produce the identity to bind.
    async fn verify(&self, request: &AuthRequest) -> Result<Identity, AuthError>;
}

/// Verifier that accepts any non-empty token and adopts the claimed profile.
///
/// Stands in for a real auth service in development and tests; deployments
/// implement [`TokenVerifier`] against their identity provider.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier;

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        if request.token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(Identity {
            user_id: request.user_id.clone(),
            nickname: request.nickname.clone(),
        })
    }
}
