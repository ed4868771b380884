use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::services::clients::ClientConfig;

pub const PKCE_METHOD_S256: &str = "S256";
const CODE_CHALLENGE_MIN_LEN: usize = 43;
const CODE_CHALLENGE_MAX_LEN: usize = 128;

/// Front-channel authorization parameters, either pushed or sent directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeParameters {
    pub client_id: String,
    pub response_type: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub prompt: Option<String>,
}

/// OAuth2 error pair sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeError {
    pub error: String,
    pub description: String,
}

impl AuthorizeError {
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new("invalid_request", description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new("invalid_scope", description)
    }

    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new("unauthorized_client", description)
    }

    pub fn unsupported_response_type() -> Self {
        Self::new("unsupported_response_type", "Only response_type=code is supported.")
    }

    pub fn invalid_request_uri() -> Self {
        Self::new("invalid_request_uri", "The request_uri is invalid or has expired.")
    }

    pub fn login_required() -> Self {
        Self::new("login_required", "The user is not signed in.")
    }
}

impl fmt::Display for AuthorizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.description)
    }
}

/// Parameters that passed protocol validation for a given client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParameters {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub prompt_none: bool,
}

/// Where validation stopped.
///
/// A redirect URI that is not acceptable must never receive the error, so the
/// two cases are kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    /// Answer directly; the redirect URI is missing or not trusted.
    Direct(AuthorizeError),
    /// Redirect URI is trusted; the error can be sent there.
    Redirect {
        redirect_uri: String,
        state: Option<String>,
        error: AuthorizeError,
    },
}

impl AuthorizeParameters {
    pub fn requested_scopes(&self) -> BTreeSet<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Checks the parameters against the client registration.
    ///
    /// `pushed` is true when they arrived through an authenticated PAR call,
    /// which is the only case where unregistered redirect URIs may be allowed.
    pub fn validate(
        &self,
        client: &ClientConfig,
        pushed: bool,
        allow_unregistered_pushed_redirect_uris: bool,
    ) -> Result<ValidatedParameters, ParameterError> {
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ParameterError::Direct(AuthorizeError::invalid_request("redirect_uri is missing."))
            })?;

        let allow_unregistered = pushed && allow_unregistered_pushed_redirect_uris;
        if !client.accepts_redirect_uri(redirect_uri, allow_unregistered) {
            return Err(ParameterError::Direct(AuthorizeError::invalid_request(
                "Invalid redirect_uri.",
            )));
        }

        let redirect_error = |error: AuthorizeError| ParameterError::Redirect {
            redirect_uri: redirect_uri.to_string(),
            state: self.state.clone(),
            error,
        };

        if !client.allows_code_flow() {
            return Err(redirect_error(AuthorizeError::unauthorized_client(
                "Client is not allowed to use the authorization code flow.",
            )));
        }

        match self.response_type.as_deref() {
            Some("code") => {}
            Some(_) => return Err(redirect_error(AuthorizeError::unsupported_response_type())),
            None => {
                return Err(redirect_error(AuthorizeError::invalid_request(
                    "response_type is missing.",
                )));
            }
        }

        let scopes = self.requested_scopes();
        if scopes.is_empty() {
            return Err(redirect_error(AuthorizeError::invalid_scope("scope is missing.")));
        }
        if let Some(scope) = client.first_disallowed_scope(&scopes) {
            return Err(redirect_error(AuthorizeError::invalid_scope(format!(
                "Scope '{scope}' is not allowed for this client."
            ))));
        }

        let code_challenge = self.code_challenge.as_deref().filter(|s| !s.is_empty());
        let code_challenge_method = match code_challenge {
            Some(challenge) => {
                let method = self
                    .code_challenge_method
                    .as_deref()
                    .unwrap_or(PKCE_METHOD_S256);
                if method != PKCE_METHOD_S256 {
                    return Err(redirect_error(AuthorizeError::invalid_request(
                        "Transform algorithm not supported.",
                    )));
                }
                if !(CODE_CHALLENGE_MIN_LEN..=CODE_CHALLENGE_MAX_LEN).contains(&challenge.len()) {
                    return Err(redirect_error(AuthorizeError::invalid_request(
                        "Invalid code_challenge.",
                    )));
                }
                Some(method.to_string())
            }
            None if client.require_pkce => {
                return Err(redirect_error(AuthorizeError::invalid_request(
                    "code challenge required",
                )));
            }
            None => None,
        };

        let prompt_none = self
            .prompt
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|v| v == "none"));

        Ok(ValidatedParameters {
            client_id: client.client_id.clone(),
            redirect_uri: redirect_uri.to_string(),
            scopes,
            state: self.state.clone(),
            nonce: self.nonce.clone(),
            code_challenge: code_challenge.map(str::to_string),
            code_challenge_method,
            prompt_none,
        })
    }
}
