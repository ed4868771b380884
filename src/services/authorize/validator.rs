use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::services::authorize::context::AuthorizationContext;
use crate::services::authorize::profile::ProfileError;
use crate::services::authorize::verdict::Verdict;

/// Infrastructure outcomes of a validator; business outcomes are a `Verdict`.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("profile resolver unavailable")]
    ResolverUnavailable(#[source] ProfileError),

    #[error("validation cancelled by caller")]
    Cancelled,
}

/// One link in the authorize endpoint's custom validation chain.
///
/// Runs after protocol validation, both before and after the user has signed in.
#[async_trait]
pub trait AuthorizeRequestValidator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(
        &self,
        ctx: &AuthorizationContext,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ValidationError>;
}
