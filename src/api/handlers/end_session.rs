use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::api::cookies::removal_cookie;
use crate::api::dto::authorize::EndSessionQuery;
use crate::api::handlers::authorize::found;
use crate::api::views::{HtmlTemplate, SignedOutView};
use crate::error::AppError;
use crate::state::AppState;

/// `GET /connect/endsession`
pub async fn end_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<EndSessionQuery>,
) -> Result<Response, AppError> {
    if let Some(cookie) = jar.get(&state.cookies.name) {
        state.sessions.end(cookie.value()).await?;
    }
    let jar = jar.remove(removal_cookie(&state.cookies));

    // Redirect only to a URI registered on the named client.
    let target = match (query.client_id.as_deref(), query.post_logout_redirect_uri.as_deref()) {
        (Some(client_id), Some(uri)) => state
            .clients
            .find(client_id)
            .filter(|c| c.accepts_post_logout_redirect_uri(uri))
            .and_then(|_| url::Url::parse(uri).ok()),
        _ => None,
    };

    match target {
        Some(mut url) => {
            if let Some(st) = query.state.as_deref() {
                url.query_pairs_mut().append_pair("state", st);
            }
            Ok((jar, found(url.into())).into_response())
        }
        None => Ok((jar, HtmlTemplate(SignedOutView)).into_response()),
    }
}
