use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::session::ServerSideSession;
use crate::state::AppState;

/// Live session resolved by the session middleware from the cookie.
#[derive(Clone, Debug)]
pub struct CurrentSession(pub ServerSideSession);

/// Handlers that work both signed in and anonymous take this.
///
/// The session middleware inserts `CurrentSession` into the request
/// extensions; when it is absent the caller is anonymous.
#[derive(Clone, Debug)]
pub struct MaybeSession(pub Option<ServerSideSession>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(
            parts
                .extensions
                .get::<CurrentSession>()
                .map(|s| s.0.clone()),
        ))
    }
}
