use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};

use crate::api::dto::oauth_error::OAuthErrorResponse;
use crate::api::dto::par::{PushedAuthorizationForm, PushedAuthorizationResponse};
use crate::api::extractors::BasicCredentials;
use crate::services::authorize::AuthorizeError;
use crate::services::authorize::request::ParameterError;
use crate::services::par::ParError;
use crate::state::AppState;

/// `POST /connect/par`
pub async fn push_authorization_request(
    State(state): State<AppState>,
    BasicCredentials(basic): BasicCredentials,
    Form(form): Form<PushedAuthorizationForm>,
) -> Result<(StatusCode, Json<PushedAuthorizationResponse>), OAuthErrorResponse> {
    let (client_id, secret) = match basic {
        Some(_) if form.client_secret.is_some() => {
            return Err(OAuthErrorResponse::bad_request(AuthorizeError::invalid_request(
                "Multiple client authentication methods used.",
            )));
        }
        Some((id, _)) if form.client_id.as_deref().is_some_and(|f| f != id) => {
            return Err(OAuthErrorResponse::bad_request(AuthorizeError::invalid_request(
                "client_id does not match the authenticated client.",
            )));
        }
        Some((id, secret)) => (id, Some(secret)),
        None => (
            form.client_id.clone().unwrap_or_default(),
            form.client_secret.clone(),
        ),
    };

    let client = match state.clients.authenticate(&client_id, secret.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "PAR client authentication failed");
            return Err(OAuthErrorResponse::invalid_client());
        }
    };

    if form.request_uri.is_some() {
        return Err(OAuthErrorResponse::bad_request(AuthorizeError::invalid_request(
            "request_uri is not allowed in a pushed authorization request.",
        )));
    }

    let parameters = form.into_parameters(client.client_id.clone());
    match state.par.push(client, parameters).await {
        Ok(pushed) => Ok((
            StatusCode::CREATED,
            Json(PushedAuthorizationResponse {
                request_uri: pushed.request_uri,
                expires_in: pushed.expires_in,
            }),
        )),
        Err(ParError::InvalidParameters(
            ParameterError::Direct(error) | ParameterError::Redirect { error, .. },
        )) => {
            tracing::info!(
                client_id = %client.client_id,
                error = %error,
                "pushed request rejected"
            );
            Err(OAuthErrorResponse::bad_request(error))
        }
        Err(e) => {
            tracing::error!(
                client_id = %client.client_id,
                error = %e,
                "failed to store pushed request"
            );
            Err(OAuthErrorResponse::server_error())
        }
    }
}
