/*
 * Responsibility
 * - shared context bound to the Router (AppState)
 * - cheap to Clone (everything inside is Arc or small)
 */
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::services::authorize::AuthorizeRequestPipeline;
use crate::services::clients::ClientStore;
use crate::services::par::PushedAuthorizationService;
use crate::services::session::SessionService;
use crate::services::users::TestUserStore;

/// How the session cookie is written.
#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<str>,
    pub clients: Arc<ClientStore>,
    pub users: Arc<TestUserStore>,
    pub sessions: Arc<SessionService>,
    pub par: Arc<PushedAuthorizationService>,
    pub authorize: Arc<AuthorizeRequestPipeline>,
    pub cookies: CookieSettings,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}
