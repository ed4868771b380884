//! Registered clients, client authentication and per-client request rules.
use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::services::handle;

pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// Identity resources (`openid`, `profile`) and API scopes (`api1`) the server knows.
pub const KNOWN_SCOPES: &[&str] = &["openid", "profile", "api1", OFFLINE_ACCESS_SCOPE];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_name: String,
    /// base64(sha256(secret))
    pub secret_hashes: Vec<String>,
    pub allowed_grant_types: Vec<String>,
    pub require_pkce: bool,
    pub require_pushed_authorization: bool,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub allow_offline_access: bool,
    pub allowed_scopes: Vec<String>,
}

impl ClientConfig {
    /// The PAR sample client.
    pub fn mvc_par() -> Self {
        Self {
            client_id: "mvc.par".to_string(),
            client_name: "MVC PAR Client".to_string(),
            secret_hashes: vec![handle::secret_hash("secret")],
            allowed_grant_types: vec![AUTHORIZATION_CODE_GRANT.to_string()],
            require_pkce: true,
            require_pushed_authorization: true,
            redirect_uris: Vec::new(),
            post_logout_redirect_uris: vec![
                "https://localhost:44300/signout-callback-oidc".to_string(),
            ],
            allow_offline_access: true,
            allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
        }
    }

    pub fn allows_code_flow(&self) -> bool {
        self.allowed_grant_types
            .iter()
            .any(|g| g == AUTHORIZATION_CODE_GRANT)
    }

    pub fn verify_secret(&self, secret: &str) -> bool {
        let presented = handle::secret_hash(secret);
        self.secret_hashes.iter().any(|h| *h == presented)
    }

    /// Exact-match check against the registered redirect URIs.
    ///
    /// `allow_unregistered` is only set for redirect URIs that arrived through
    /// an authenticated pushed authorization request.
    pub fn accepts_redirect_uri(&self, redirect_uri: &str, allow_unregistered: bool) -> bool {
        let Ok(parsed) = url::Url::parse(redirect_uri) else {
            return false;
        };
        if parsed.fragment().is_some() {
            return false;
        }
        allow_unregistered || self.redirect_uris.iter().any(|u| u == redirect_uri)
    }

    pub fn accepts_post_logout_redirect_uri(&self, uri: &str) -> bool {
        self.post_logout_redirect_uris.iter().any(|u| u == uri)
    }

    /// Returns the first requested scope that is unknown or not granted to this client.
    pub fn first_disallowed_scope<'a>(&self, scopes: &'a BTreeSet<String>) -> Option<&'a str> {
        scopes
            .iter()
            .find(|scope| {
                let known = KNOWN_SCOPES.contains(&scope.as_str());
                let allowed = if scope.as_str() == OFFLINE_ACCESS_SCOPE {
                    self.allow_offline_access
                } else {
                    self.allowed_scopes.iter().any(|s| s == *scope)
                };
                !(known && allowed)
            })
            .map(String::as_str)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientAuthError {
    #[error("unknown client")]
    UnknownClient,
    #[error("missing client credentials")]
    MissingCredentials,
    #[error("invalid client secret")]
    InvalidSecret,
}

#[derive(Debug, Clone, Default)]
pub struct ClientStore {
    clients: HashMap<String, ClientConfig>,
}

impl ClientStore {
    pub fn new(clients: impl IntoIterator<Item = ClientConfig>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }

    pub fn seeded() -> Self {
        Self::new([ClientConfig::mvc_par()])
    }

    pub fn find(&self, client_id: &str) -> Option<&ClientConfig> {
        self.clients.get(client_id)
    }

    /// Authenticates a confidential client with a shared secret.
    pub fn authenticate(
        &self,
        client_id: &str,
        secret: Option<&str>,
    ) -> Result<&ClientConfig, ClientAuthError> {
        let client = self.find(client_id).ok_or(ClientAuthError::UnknownClient)?;
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(ClientAuthError::MissingCredentials)?;

        if client.verify_secret(secret) {
            Ok(client)
        } else {
            Err(ClientAuthError::InvalidSecret)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn authenticates_with_the_registered_secret() {
        let store = ClientStore::seeded();

        assert!(store.authenticate("mvc.par", Some("secret")).is_ok());
        assert_eq!(
            store.authenticate("mvc.par", Some("wrong")).unwrap_err(),
            ClientAuthError::InvalidSecret
        );
        assert_eq!(
            store.authenticate("mvc.par", None).unwrap_err(),
            ClientAuthError::MissingCredentials
        );
        assert_eq!(
            store.authenticate("nope", Some("secret")).unwrap_err(),
            ClientAuthError::UnknownClient
        );
    }

    #[test]
    fn scope_rules_follow_client_registration() {
        let client = ClientConfig::mvc_par();

        assert_eq!(client.first_disallowed_scope(&scopes(&["openid", "profile"])), None);
        assert_eq!(
            client.first_disallowed_scope(&scopes(&["openid", "offline_access"])),
            None
        );
        // api1 is a known scope but not granted to this client.
        assert_eq!(client.first_disallowed_scope(&scopes(&["openid", "api1"])), Some("api1"));
        assert_eq!(
            client.first_disallowed_scope(&scopes(&["openid", "email"])),
            Some("email")
        );
    }

    #[test]
    fn offline_access_requires_client_opt_in() {
        let mut client = ClientConfig::mvc_par();
        client.allow_offline_access = false;

        assert_eq!(
            client.first_disallowed_scope(&scopes(&["offline_access"])),
            Some("offline_access")
        );
    }

    #[test]
    fn redirect_uri_rules() {
        let mut client = ClientConfig::mvc_par();
        client.redirect_uris = vec!["https://localhost:44300/signin-oidc".to_string()];

        assert!(client.accepts_redirect_uri("https://localhost:44300/signin-oidc", false));
        assert!(!client.accepts_redirect_uri("https://evil.example/cb", false));
        assert!(client.accepts_redirect_uri("https://evil.example/cb", true));
        assert!(!client.accepts_redirect_uri("not a url", true));
        assert!(!client.accepts_redirect_uri("https://localhost:44300/cb#frag", true));
    }

    #[test]
    fn sample_client_uses_code_flow_with_par() {
        let client = ClientConfig::mvc_par();
        assert!(client.allows_code_flow());
        assert!(client.require_pkce);
        assert!(client.require_pushed_authorization);
        assert!(client.accepts_post_logout_redirect_uri(
            "https://localhost:44300/signout-callback-oidc"
        ));
    }
}
