use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use par_idp::app::{build_router, build_state_with, serve};
use par_idp::config::Config;
use par_idp::services::authorize::{Claim, ProfileError, ProfileResolver, Subject};
use par_idp::services::users::TestUserStore;

const REDIRECT_URI: &str = "https://localhost:44300/signin-oidc";

struct UnreachableProfiles;

#[async_trait]
impl ProfileResolver for UnreachableProfiles {
    async fn resolve(
        &self,
        _subject: &Subject,
        _requested: &BTreeSet<String>,
    ) -> Result<Vec<Claim>, ProfileError> {
        Err(ProfileError::Unavailable("connection refused by 10.0.0.7".into()))
    }
}

/// Answers from the seeded users once `gate` is opened.
struct GatedProfiles {
    users: Arc<TestUserStore>,
    entered: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl ProfileResolver for GatedProfiles {
    async fn resolve(
        &self,
        subject: &Subject,
        requested: &BTreeSet<String>,
    ) -> Result<Vec<Claim>, ProfileError> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.users.resolve(subject, requested).await
    }
}

fn gated() -> (Arc<GatedProfiles>, Arc<Notify>, Arc<Notify>) {
    let entered = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let profiles = Arc::new(GatedProfiles {
        users: Arc::new(TestUserStore::seeded()),
        entered: entered.clone(),
        gate: gate.clone(),
    });
    (profiles, entered, gate)
}

async fn app_with(profiles: Arc<dyn ProfileResolver>, requests: CancellationToken) -> Router {
    let config = Config::from_vars(|key| match key {
        "AUTH_ISSUER" => Some("https://idp.test".to_string()),
        _ => None,
    })
    .unwrap();
    let users = Arc::new(TestUserStore::seeded());
    let state = build_state_with(&config, requests, users, profiles)
        .await
        .unwrap();
    build_router(state, &config)
}

fn form(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

async fn json(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_form(app: &Router, path: &str, auth: Option<String>, body: String) -> Response {
    let mut req = Request::post(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(auth) = auth {
        req = req.header(header::AUTHORIZATION, auth);
    }
    app.clone()
        .oneshot(req.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Pushes a request and signs alice in. Returns the authorize path and cookie.
async fn signed_in_authorize(app: &Router) -> (String, String) {
    let basic = format!("Basic {}", STANDARD.encode("mvc.par:secret"));
    let res = post_form(
        app,
        "/connect/par",
        Some(basic),
        form(&[
            ("response_type", "code"),
            ("redirect_uri", REDIRECT_URI),
            ("scope", "openid profile"),
            ("state", "abc"),
            ("code_challenge", "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"),
            ("code_challenge_method", "S256"),
        ]),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let request_uri = json(res).await["request_uri"].as_str().unwrap().to_string();

    let res = post_form(
        app,
        "/account/login",
        None,
        form(&[("username", "alice"), ("password", "alice"), ("returnUrl", "/")]),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let cookie = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("idsrv.session="))
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let path = format!(
        "/connect/authorize?{}",
        form(&[("client_id", "mvc.par"), ("request_uri", &request_uri)])
    );
    (path, cookie)
}

async fn get(app: Router, path: String, cookie: String) -> Response {
    app.oneshot(
        Request::get(path)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn resolver_failure_is_a_generic_server_error() {
    let app = app_with(Arc::new(UnreachableProfiles), CancellationToken::new()).await;
    let (path, cookie) = signed_in_authorize(&app).await;

    let res = get(app, path, cookie).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().get(header::LOCATION).is_none());
    let body = json(res).await;
    assert_eq!(body["error"]["code"], "INTERNAL");
    assert!(!body.to_string().contains("10.0.0.7"));
}

#[tokio::test]
async fn cancelled_request_answers_service_unavailable() {
    let requests = CancellationToken::new();
    let (profiles, entered, _gate) = gated();
    let app = app_with(profiles, requests.clone()).await;
    let (path, cookie) = signed_in_authorize(&app).await;

    let pending = tokio::spawn(get(app, path, cookie));
    entered.notified().await;
    requests.cancel();

    let res = pending.await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(res).await["error"]["code"], "UNAVAILABLE");
}

#[tokio::test]
async fn requests_in_flight_complete_during_graceful_shutdown() {
    let shutdown = CancellationToken::new();
    let requests = CancellationToken::new();
    let (profiles, entered, gate) = gated();
    let app = app_with(profiles, requests.clone()).await;
    let (path, cookie) = signed_in_authorize(&app).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, app, shutdown.clone(), requests.clone()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw_request = format!(
        "GET {path} HTTP/1.1\r\nHost: idp.test\r\nCookie: {cookie}\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(raw_request.as_bytes()).await.unwrap();

    entered.notified().await;
    shutdown.cancel();
    tokio::task::yield_now().await;
    assert!(!requests.is_cancelled());
    gate.notify_one();

    let mut raw_response = String::new();
    stream.read_to_string(&mut raw_response).await.unwrap();
    assert!(raw_response.starts_with("HTTP/1.1 302"), "{raw_response}");
    assert!(raw_response.contains("code="));

    server.await.unwrap().unwrap();
    assert!(requests.is_cancelled());
}
