use axum::Json;
use axum::extract::State;

use crate::api::dto::discovery::DiscoveryDocument;
use crate::services::authorize::request::PKCE_METHOD_S256;
use crate::services::clients::{AUTHORIZATION_CODE_GRANT, KNOWN_SCOPES};
use crate::state::AppState;

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    let issuer = state.issuer.trim_end_matches('/');
    let endpoint = |path: &str| format!("{issuer}{path}");

    Json(DiscoveryDocument {
        issuer: state.issuer.to_string(),
        authorization_endpoint: endpoint("/connect/authorize"),
        pushed_authorization_request_endpoint: endpoint("/connect/par"),
        end_session_endpoint: endpoint("/connect/endsession"),
        // PAR is enforced per client.
        require_pushed_authorization_requests: false,
        scopes_supported: strings(KNOWN_SCOPES),
        response_types_supported: strings(&["code"]),
        grant_types_supported: strings(&[AUTHORIZATION_CODE_GRANT]),
        code_challenge_methods_supported: strings(&[PKCE_METHOD_S256]),
        token_endpoint_auth_methods_supported: strings(&[
            "client_secret_basic",
            "client_secret_post",
        ]),
        subject_types_supported: strings(&["public"]),
        authorization_response_iss_parameter_supported: true,
    })
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
