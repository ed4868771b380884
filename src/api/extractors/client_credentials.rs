use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("unsupported authorization scheme")]
    Scheme,
    #[error("malformed basic credentials")]
    Malformed,
}

/// `client_secret_basic` credentials from the Authorization header, if any.
///
/// Id and secret are form-urlencoded before being joined (RFC 6749 2.3.1).
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials(pub Option<(String, String)>);

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never log the secret
        f.debug_tuple("BasicCredentials")
            .field(&self.0.as_ref().map(|(id, _)| id))
            .finish()
    }
}

impl BasicCredentials {
    pub fn parse(value: &str) -> Result<(String, String), CredentialsError> {
        let encoded = value
            .strip_prefix("Basic ")
            .ok_or(CredentialsError::Scheme)?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CredentialsError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| CredentialsError::Malformed)?;
        let (id, secret) = decoded.split_once(':').ok_or(CredentialsError::Malformed)?;

        Ok((form_decode(id), form_decode(secret)))
    }
}

fn form_decode(raw: &str) -> String {
    // A literal '=' would split the pair; keep it as data.
    let escaped = raw.replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

impl FromRequestParts<AppState> for BasicCredentials {
    type Rejection = CredentialsError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(BasicCredentials(None));
        };
        let value = value.to_str().map_err(|_| CredentialsError::Malformed)?;
        Ok(BasicCredentials(Some(Self::parse(value)?)))
    }
}

impl axum::response::IntoResponse for CredentialsError {
    fn into_response(self) -> axum::response::Response {
        tracing::debug!(error = %self, "client credentials rejected");
        crate::api::dto::oauth_error::OAuthErrorResponse::invalid_client().into_response()
    }
}
