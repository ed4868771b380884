use axum::extract::{Query, RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::api::dto::authorize::AuthorizeQuery;
use crate::api::dto::oauth_error::OAuthErrorResponse;
use crate::api::extractors::MaybeSession;
use crate::error::AppError;
use crate::services::authorize::AuthorizeOutcome;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/account/login";

/// `GET /connect/authorize`
pub async fn authorize(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, AppError> {
    let (params, request_uri) = query.split();

    // Cancelled on shutdown, or when the client goes away and this future is dropped.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let outcome = state
        .authorize
        .authorize(
            &params,
            request_uri.as_deref(),
            session.as_ref().map(|s| s.subject()),
            &cancel,
        )
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                AppError::ServiceUnavailable
            } else {
                tracing::error!(error = %e, "authorize request failed");
                AppError::Internal
            }
        })?;

    match outcome {
        AuthorizeOutcome::Redirect(response) => {
            let location = response.location().map_err(|e| {
                tracing::error!(error = %e, "invalid redirect_uri after validation");
                AppError::Internal
            })?;
            Ok(found(location))
        }
        AuthorizeOutcome::Rejected(error) => {
            Ok(OAuthErrorResponse::bad_request(error).into_response())
        }
        AuthorizeOutcome::LoginRequired => {
            let return_url = format!("/connect/authorize?{}", raw_query.unwrap_or_default());
            let encoded: String =
                url::form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
            Ok(found(format!("{LOGIN_PATH}?returnUrl={encoded}")))
        }
    }
}

pub(crate) fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
