/*
 * Responsibility
 * - load Config → build dependencies → assemble the Router
 * - apply middleware (session, security headers, http)
 * - serve with graceful shutdown and run the session sweeper
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::server_side_session_repo::ServerSideSessionRepo;
use crate::services::authorize::{
    AccessPolicyValidator, AuthorizationCodeStore, AuthorizeRequestPipeline,
    AuthorizeRequestValidator, ProfileResolver,
};
use crate::services::cache::{CacheClient, MemoryCache, ValkeyClient};
use crate::services::clients::ClientStore;
use crate::services::par::PushedAuthorizationService;
use crate::services::session::{
    MemorySessionStore, PgSessionStore, SessionService, SessionStore,
};
use crate::services::users::TestUserStore;
use crate::state::{AppState, CookieSettings};

const CACHE_NAMESPACE: &str = "par-idp";

fn init_tracing() {
    // Prefer RUST_LOG if set. Ex:
    // RUST_LOG=info,par_idp=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,par_idp=debug,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched.
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        issuer = %config.issuer,
        "starting identity provider in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    // `shutdown` stops accepting connections; `requests` is the parent of the
    // per-request tokens and is only cancelled once in-flight requests drained.
    let shutdown = CancellationToken::new();
    let requests = CancellationToken::new();
    let state = build_state(&config, requests.clone()).await?;

    let sweeper = state
        .sessions
        .clone()
        .spawn_sweeper(config.session_cleanup_interval(), shutdown.clone());

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;

    tokio::spawn(shutdown_signal(shutdown.clone()));
    serve(listener, app, shutdown.clone(), requests).await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "session sweeper did not stop cleanly");
    }
    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}

/// Serves until `shutdown` fires and every open connection has finished.
///
/// Requests still running during the drain keep live tokens; `requests` is
/// cancelled after the server has stopped.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: CancellationToken,
    requests: CancellationToken,
) -> std::io::Result<()> {
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;
    requests.cancel();
    tracing::debug!("request tokens cancelled");
    result
}

/// Builds every process-level service. Backends without a URL fall back to
/// in-memory stores.
pub async fn build_state(config: &Config, requests: CancellationToken) -> Result<AppState> {
    let users = Arc::new(TestUserStore::seeded());
    build_state_with(config, requests, users.clone(), users).await
}

/// Like `build_state`, with the claim source of the access policy supplied
/// by the caller.
pub async fn build_state_with(
    config: &Config,
    requests: CancellationToken,
    users: Arc<TestUserStore>,
    profiles: Arc<dyn ProfileResolver>,
) -> Result<AppState> {
    let cache: Arc<dyn CacheClient> = match &config.redis_url {
        Some(url) => Arc::new(
            ValkeyClient::connect(url, CACHE_NAMESPACE)
                .await
                .context("connect to valkey")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set; pushed requests and codes are kept in memory");
            Arc::new(MemoryCache::new())
        }
    };

    let session_store: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("connect to postgres")?;
            Arc::new(PgSessionStore::new(ServerSideSessionRepo::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; server-side sessions are kept in memory");
            Arc::new(MemorySessionStore::new())
        }
    };
    tracing::info!(
        cache = cache.backend_name(),
        sessions = session_store.backend_name(),
        "backends ready"
    );

    let clients = Arc::new(ClientStore::seeded());

    let par = Arc::new(PushedAuthorizationService::new(
        cache.clone(),
        config.par_lifetime_seconds,
        config.allow_unregistered_pushed_redirect_uris,
    ));

    let validators: Vec<Arc<dyn AuthorizeRequestValidator>> =
        vec![Arc::new(AccessPolicyValidator::new(profiles))];
    let authorize = Arc::new(AuthorizeRequestPipeline::new(
        config.issuer.clone(),
        clients.clone(),
        par.clone(),
        AuthorizationCodeStore::new(cache, config.authorization_code_lifetime_seconds),
        validators,
    ));

    let sessions = Arc::new(SessionService::new(
        session_store,
        config.session_lifetime_seconds,
        config.session_sliding_expiration,
        config.session_cleanup_batch_size,
    ));

    let cookies = CookieSettings {
        name: config.session_cookie_name.clone(),
        secure: config.app_env.is_production(),
        max_age_seconds: sessions.lifetime_seconds(),
    };

    Ok(AppState {
        issuer: Arc::from(config.issuer.as_str()),
        clients,
        users,
        sessions,
        par,
        authorize,
        cookies,
        shutdown: requests,
    })
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = middleware::session::apply(api::routes(), state.clone()).with_state(state);
    let router = middleware::security_headers::apply(router);
    middleware::http::apply(router, config.request_timeout())
}
