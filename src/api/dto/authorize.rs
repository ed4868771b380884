use serde::Deserialize;

use crate::services::authorize::AuthorizeParameters;

/// Query string of `GET /connect/authorize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
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

impl AuthorizeQuery {
    pub fn split(self) -> (AuthorizeParameters, Option<String>) {
        let params = AuthorizeParameters {
            client_id: self.client_id.unwrap_or_default(),
            response_type: self.response_type,
            redirect_uri: self.redirect_uri,
            scope: self.scope,
            state: self.state,
            nonce: self.nonce,
            code_challenge: self.code_challenge,
            code_challenge_method: self.code_challenge_method,
            prompt: self.prompt,
        };
        (params, self.request_uri.filter(|s| !s.is_empty()))
    }
}

/// Query string of `GET /connect/endsession`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndSessionQuery {
    pub client_id: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
}
