use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::authorize::context::{Claim, Subject};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Source of issued claims for a subject.
///
/// Implementations return only claims whose type is in `requested_claim_types`
/// (possibly none) and bound their own latency.
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn resolve(
        &self,
        subject: &Subject,
        requested_claim_types: &BTreeSet<String>,
    ) -> Result<Vec<Claim>, ProfileError>;
}
