//! Session cookie → `CurrentSession` in the request extensions.
//!
//! Handlers read it through the `MaybeSession` extractor. When sliding
//! expiration renews the session, the cookie is re-issued so the browser
//! keeps it as long as the server does.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::api::cookies::session_cookie;
use crate::api::extractors::CurrentSession;
use crate::error::AppError;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // from_fn cannot take State in axum 0.8; pass it with from_fn_with_state.
    router.layer(middleware::from_fn_with_state(state, session_middleware))
}

async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(cookie) = jar.get(&state.cookies.name) else {
        return Ok(next.run(req).await);
    };

    let now = Utc::now();
    let Some(session) = state.sessions.current(cookie.value(), now).await? else {
        return Ok(next.run(req).await);
    };

    let renewed = session.renewed_at == now && session.created_at != now;
    tracing::debug!(session_id = %session.session_id, renewed, "request has a session");
    req.extensions_mut().insert(CurrentSession(session));

    let mut res = next.run(req).await;
    // A handler that already wrote the cookie (sign-in, sign-out) wins.
    let prefix = format!("{}=", state.cookies.name);
    let handler_set_cookie = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().is_ok_and(|s| s.starts_with(&prefix)));

    if renewed && !handler_set_cookie {
        let refreshed = session_cookie(&state.cookies, cookie.value().to_string());
        match HeaderValue::from_str(&refreshed.to_string()) {
            Ok(v) => {
                res.headers_mut().append(header::SET_COOKIE, v);
            }
            Err(e) => tracing::warn!(error = %e, "could not re-issue session cookie"),
        }
    }
    Ok(res)
}
