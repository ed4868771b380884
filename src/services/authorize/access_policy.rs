use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::services::authorize::context::{AuthorizationContext, ROLE_CLAIM_TYPE};
use crate::services::authorize::profile::ProfileResolver;
use crate::services::authorize::validator::{AuthorizeRequestValidator, ValidationError};
use crate::services::authorize::verdict::Verdict;

/// Suffix appended to the client id to form the role a user needs for that client.
pub const BASIC_ACCESS_SUFFIX: &str = "_BasicAccess";

/// OAuth2 `error` returned to the client when the role is missing.
pub const MISSING_BASIC_ACCESS: &str = "missing_basic_access";
pub const MISSING_BASIC_ACCESS_DESCRIPTION: &str =
    "User doesn't have permission to access the specified client.";

/// Gates authorize requests on a per-client role claim.
///
/// A signed-in subject may only continue when the profile resolver issues
/// `role = "<client_id>_BasicAccess"` for them. Requests without a subject are
/// let through; the pipeline sends those to the login page.
#[derive(Clone)]
pub struct AccessPolicyValidator {
    profiles: Arc<dyn ProfileResolver>,
}

impl std::fmt::Debug for AccessPolicyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPolicyValidator").finish_non_exhaustive()
    }
}

impl AccessPolicyValidator {
    pub fn new(profiles: Arc<dyn ProfileResolver>) -> Self {
        Self { profiles }
    }

    pub fn required_role(client_id: &str) -> String {
        format!("{client_id}{BASIC_ACCESS_SUFFIX}")
    }

    /// Decide whether the request may continue.
    ///
    /// Resolver failures and cancellation are returned as errors and never
    /// turned into a verdict.
    #[tracing::instrument(
        name = "access_policy.validate",
        skip_all,
        fields(client_id = %ctx.client_id())
    )]
    pub async fn validate(
        &self,
        ctx: &AuthorizationContext,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ValidationError> {
        let Some(subject) = ctx.subject() else {
            debug!("no authenticated subject yet, access policy deferred");
            return Ok(Verdict::Allow);
        };

        let required_role = Self::required_role(ctx.client_id());
        let requested = BTreeSet::from([ROLE_CLAIM_TYPE.to_string()]);

        let claims = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(subject_id = %subject.id(), "claim resolution cancelled");
                return Err(ValidationError::Cancelled);
            }
            resolved = self.profiles.resolve(subject, &requested) => resolved.map_err(|e| {
                error!(subject_id = %subject.id(), error = %e, "failed to resolve role claims");
                ValidationError::ResolverUnavailable(e)
            })?,
        };

        if claims.iter().any(|c| c.is(ROLE_CLAIM_TYPE, &required_role)) {
            debug!(subject_id = %subject.id(), "required role present");
            return Ok(Verdict::Allow);
        }

        warn!(
            subject_id = %subject.id(),
            required_role = %required_role,
            "authorization rejected because of missing application permissions"
        );
        Ok(Verdict::deny(
            MISSING_BASIC_ACCESS,
            MISSING_BASIC_ACCESS_DESCRIPTION,
        ))
    }
}

#[async_trait]
impl AuthorizeRequestValidator for AccessPolicyValidator {
    fn name(&self) -> &'static str {
        "access_policy"
    }

    async fn validate(
        &self,
        ctx: &AuthorizationContext,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ValidationError> {
        AccessPolicyValidator::validate(self, ctx, cancel).await
    }
}
