use serde::{Deserialize, Serialize};

use crate::services::authorize::AuthorizeParameters;

/// Form body of `POST /connect/par`.
///
/// Client credentials may be sent here (`client_secret_post`) or in the
/// Authorization header (`client_secret_basic`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushedAuthorizationForm {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Not allowed in a pushed request.
    pub request_uri: Option<String>,
    pub response_type: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub prompt: Option<String>,
}

impl PushedAuthorizationForm {
    pub fn into_parameters(self, client_id: String) -> AuthorizeParameters {
        AuthorizeParameters {
            client_id,
            response_type: self.response_type,
            redirect_uri: self.redirect_uri,
            scope: self.scope,
            state: self.state,
            nonce: self.nonce,
            code_challenge: self.code_challenge,
            code_challenge_method: self.code_challenge_method,
            prompt: self.prompt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushedAuthorizationResponse {
    pub request_uri: String,
    /// Seconds until the request_uri expires.
    pub expires_in: u64,
}
