/*
 * Responsibility
 * - URL structure of the identity provider
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    authorize::authorize, discovery::discovery, end_session::end_session,
    login::{login, login_page},
    par::push_authorization_request,
};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/connect/par", post(push_authorization_request))
        .route("/connect/authorize", get(authorize))
        .route("/connect/endsession", get(end_session))
        .route("/account/login", get(login_page).post(login))
        .fallback(|| async { AppError::NotFound })
}
