use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Sign-in form. `return_url` is posted back untouched.
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginView<'a> {
    pub return_url: &'a str,
    pub username: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "signed_out.html")]
pub struct SignedOutView;

/// Renders an askama template as an HTML response.
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "failed to render template");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page.").into_response()
            }
        }
    }
}
