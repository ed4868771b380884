use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claim type carrying role membership.
pub const ROLE_CLAIM_TYPE: &str = "role";

/// A typed attribute asserted about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, claim_type: &str, value: &str) -> bool {
        self.claim_type == claim_type && self.value == value
    }
}

/// The authenticated principal behind an authorize request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: String,
    authenticated_at: DateTime<Utc>,
    session_id: String,
}

impl Subject {
    pub fn new(
        id: impl Into<String>,
        authenticated_at: DateTime<Utc>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            authenticated_at,
            session_id: session_id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("client_id must not be empty")]
    EmptyClientId,
}

/// Read-only snapshot of one in-flight authorize request.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    client_id: String,
    subject: Option<Subject>,
    requested_scopes: BTreeSet<String>,
}

impl AuthorizationContext {
    pub fn new(
        client_id: impl Into<String>,
        subject: Option<Subject>,
        requested_scopes: impl IntoIterator<Item = String>,
    ) -> Result<Self, ContextError> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(ContextError::EmptyClientId);
        }

        Ok(Self {
            client_id,
            subject,
            requested_scopes: requested_scopes.into_iter().collect(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `None` until the user has signed in.
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn requested_scopes(&self) -> &BTreeSet<String> {
        &self.requested_scopes
    }
}
