use axum::Form;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::api::cookies::session_cookie;
use crate::api::dto::login::{LoginForm, LoginQuery};
use crate::api::views::{HtmlTemplate, LoginView};
use crate::error::AppError;
use crate::state::AppState;

/// `GET /account/login`
pub async fn login_page(Query(query): Query<LoginQuery>) -> Response {
    render(query.return_url.as_deref(), "", None)
}

/// `POST /account/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let Some(user) = state
        .users
        .validate_credentials(&form.username, &form.password)
    else {
        tracing::warn!(username = %form.username, "sign-in failed");
        let page = render(
            form.return_url.as_deref(),
            &form.username,
            Some("Invalid username or password."),
        );
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    };

    let (cookie, session) = state.sessions.start(user, Utc::now()).await?;
    tracing::info!(
        subject_id = %session.subject_id,
        session_id = %session.session_id,
        "user signed in"
    );

    let jar = jar.add(session_cookie(&state.cookies, cookie));
    let target = local_return_url(form.return_url.as_deref());
    Ok((jar, Redirect::to(target)).into_response())
}

/// Only same-site relative paths are followed after sign-in.
pub fn local_return_url(return_url: Option<&str>) -> &str {
    match return_url {
        Some(url)
            if url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\") =>
        {
            url
        }
        _ => "/",
    }
}

fn render(return_url: Option<&str>, username: &str, error: Option<&str>) -> Response {
    HtmlTemplate(LoginView {
        return_url: return_url.unwrap_or_default(),
        username,
        error,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_return_urls_are_followed() {
        assert_eq!(
            local_return_url(Some("/connect/authorize?client_id=mvc.par")),
            "/connect/authorize?client_id=mvc.par"
        );
        assert_eq!(local_return_url(Some("https://evil.test/")), "/");
        assert_eq!(local_return_url(Some("//evil.test/")), "/");
        assert_eq!(local_return_url(Some("/\\evil.test/")), "/");
        assert_eq!(local_return_url(None), "/");
    }
}
