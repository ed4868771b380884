use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use par_idp::app::{build_router, build_state};
use par_idp::config::Config;

const ISSUER: &str = "https://idp.test";
const REDIRECT_URI: &str = "https://localhost:44300/signin-oidc";
const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

async fn app() -> Router {
    let config = Config::from_vars(|key| match key {
        "AUTH_ISSUER" => Some(ISSUER.to_string()),
        _ => None,
    })
    .unwrap();
    let state = build_state(&config, CancellationToken::new()).await.unwrap();
    build_router(state, &config)
}

fn form(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn basic(id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

async fn json(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(res: &Response) -> String {
    res.headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

fn query_param(location: &str, name: &str) -> Option<String> {
    let url = if location.starts_with('/') {
        url::Url::parse(&format!("https://base.test{location}"))
    } else {
        url::Url::parse(location)
    }
    .unwrap();
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn session_cookie(res: &Response) -> String {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("idsrv.session="))
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string()
}

async fn push(app: &Router) -> String {
    let res = app
        .clone()
        .oneshot(
            Request::post("/connect/par")
                .header(header::AUTHORIZATION, basic("mvc.par", "secret"))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form(&[
                    ("response_type", "code"),
                    ("redirect_uri", REDIRECT_URI),
                    ("scope", "openid profile"),
                    ("state", "abc"),
                    ("nonce", "n1"),
                    ("code_challenge", CHALLENGE),
                    ("code_challenge_method", "S256"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json(res).await;
    assert_eq!(body["expires_in"], 600);
    body["request_uri"].as_str().unwrap().to_string()
}

fn authorize_path(request_uri: &str) -> String {
    format!(
        "/connect/authorize?{}",
        form(&[("client_id", "mvc.par"), ("request_uri", request_uri)])
    )
}

async fn get(app: &Router, path: &str, cookie: Option<&str>) -> Response {
    let mut req = Request::get(path);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    app.clone().oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
}

async fn sign_in(app: &Router, username: &str, return_url: &str) -> Response {
    app.clone()
        .oneshot(
            Request::post("/account/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form(&[
                    ("username", username),
                    ("password", username),
                    ("returnUrl", return_url),
                ])))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn alice_completes_the_par_flow() {
    let app = app().await;
    let request_uri = push(&app).await;

    // Anonymous: sent to the login page with the authorize URL as returnUrl.
    let res = get(&app, &authorize_path(&request_uri), None).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let login = location(&res);
    assert!(login.starts_with("/account/login?returnUrl="));
    let return_url = query_param(&login, "returnUrl").unwrap();
    assert!(return_url.starts_with("/connect/authorize?"));

    let res = sign_in(&app, "alice", &return_url).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), return_url);
    let cookie = session_cookie(&res);

    let res = get(&app, &return_url, Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(
        res.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let callback = location(&res);
    assert!(callback.starts_with(REDIRECT_URI));
    assert!(query_param(&callback, "code").is_some());
    assert_eq!(query_param(&callback, "state").as_deref(), Some("abc"));
    assert_eq!(query_param(&callback, "iss").as_deref(), Some(ISSUER));

    // request_uri is single use.
    let res = get(&app, &return_url, Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(res).await["error"], "invalid_request_uri");
}

#[tokio::test]
async fn bob_is_denied_with_missing_basic_access() {
    let app = app().await;
    let request_uri = push(&app).await;
    let return_url = authorize_path(&request_uri);

    let res = sign_in(&app, "bob", &return_url).await;
    let cookie = session_cookie(&res);

    let res = get(&app, &return_url, Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let callback = location(&res);
    assert!(callback.starts_with(REDIRECT_URI));
    assert_eq!(
        query_param(&callback, "error").as_deref(),
        Some("missing_basic_access")
    );
    assert_eq!(
        query_param(&callback, "error_description").as_deref(),
        Some("User doesn't have permission to access the specified client.")
    );
    assert_eq!(query_param(&callback, "state").as_deref(), Some("abc"));
    assert!(query_param(&callback, "code").is_none());
}

#[tokio::test]
async fn par_rejects_bad_client_credentials() {
    let app = app().await;

    let res = app
        .clone()
        .oneshot(
            Request::post("/connect/par")
                .header(header::AUTHORIZATION, basic("mvc.par", "wrong"))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form(&[("response_type", "code")])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(res).await["error"], "invalid_client");
}

#[tokio::test]
async fn par_accepts_client_secret_post_and_validates_parameters() {
    let app = app().await;

    let res = app
        .clone()
        .oneshot(
            Request::post("/connect/par")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form(&[
                    ("client_id", "mvc.par"),
                    ("client_secret", "secret"),
                    ("response_type", "code"),
                    ("redirect_uri", REDIRECT_URI),
                    ("scope", "openid"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();

    // PKCE is required for this client.
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json(res).await;
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(body["error_description"], "code challenge required");
}

#[tokio::test]
async fn authorize_without_par_is_rejected_for_par_clients() {
    let app = app().await;
    let path = format!(
        "/connect/authorize?{}",
        form(&[
            ("client_id", "mvc.par"),
            ("response_type", "code"),
            ("redirect_uri", REDIRECT_URI),
            ("scope", "openid"),
        ])
    );

    let res = get(&app, &path, None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(res).await["error"], "invalid_request");
}

#[tokio::test]
async fn end_session_signs_out_and_redirects_to_registered_uri() {
    let app = app().await;
    let res = sign_in(&app, "alice", "/").await;
    let cookie = session_cookie(&res);

    let path = format!(
        "/connect/endsession?{}",
        form(&[
            ("client_id", "mvc.par"),
            (
                "post_logout_redirect_uri",
                "https://localhost:44300/signout-callback-oidc"
            ),
            ("state", "bye"),
        ])
    );
    let res = get(&app, &path, Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let target = location(&res);
    assert!(target.starts_with("https://localhost:44300/signout-callback-oidc"));
    assert_eq!(query_param(&target, "state").as_deref(), Some("bye"));

    // The old cookie no longer carries a session.
    let request_uri = push(&app).await;
    let res = get(&app, &authorize_path(&request_uri), Some(&cookie)).await;
    assert!(location(&res).starts_with("/account/login"));
}

#[tokio::test]
async fn end_session_ignores_unregistered_redirects() {
    let app = app().await;
    let path = format!(
        "/connect/endsession?{}",
        form(&[
            ("client_id", "mvc.par"),
            ("post_logout_redirect_uri", "https://evil.test/"),
        ])
    );

    let res = get(&app, &path, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn failed_sign_in_shows_the_form_again() {
    let app = app().await;

    let res = app
        .clone()
        .oneshot(
            Request::post("/account/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form(&[
                    ("username", "alice"),
                    ("password", "nope"),
                    ("returnUrl", "/"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn discovery_advertises_par() {
    let app = app().await;

    let res = get(&app, "/.well-known/openid-configuration", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());

    let doc = json(res).await;
    assert_eq!(doc["issuer"], ISSUER);
    assert_eq!(
        doc["pushed_authorization_request_endpoint"],
        "https://idp.test/connect/par"
    );
    assert_eq!(doc["code_challenge_methods_supported"][0], "S256");
}
