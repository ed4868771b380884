use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::services::authorize::code::{
    AuthorizationCodeGrant, AuthorizationCodeStore, CodeStoreError,
};
use crate::services::authorize::context::{AuthorizationContext, Subject};
use crate::services::authorize::request::{AuthorizeError, AuthorizeParameters, ParameterError};
use crate::services::authorize::validator::{AuthorizeRequestValidator, ValidationError};
use crate::services::authorize::verdict::Verdict;
use crate::services::clients::ClientStore;
use crate::services::par::{ParError, PushedAuthorizationService};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validator '{validator}' failed")]
    Validator {
        validator: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("pushed request store failure")]
    PushedRequests(#[from] ParError),

    #[error("authorization code store failure")]
    Codes(#[from] CodeStoreError),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Validator {
                source: ValidationError::Cancelled,
                ..
            }
        )
    }
}

/// Front-channel response parameters for the client's redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    redirect_uri: String,
    params: Vec<(&'static str, String)>,
}

impl AuthorizationResponse {
    fn code(redirect_uri: &str, code: String, state: Option<&str>, issuer: &str) -> Self {
        Self::build(redirect_uri, vec![("code", code)], state, issuer)
    }

    fn error(
        redirect_uri: &str,
        error: &AuthorizeError,
        state: Option<&str>,
        issuer: &str,
    ) -> Self {
        Self::build(
            redirect_uri,
            vec![
                ("error", error.error.clone()),
                ("error_description", error.description.clone()),
            ],
            state,
            issuer,
        )
    }

    fn build(
        redirect_uri: &str,
        mut params: Vec<(&'static str, String)>,
        state: Option<&str>,
        issuer: &str,
    ) -> Self {
        if let Some(state) = state {
            params.push(("state", state.to_string()));
        }
        params.push(("iss", issuer.to_string()));
        Self {
            redirect_uri: redirect_uri.to_string(),
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.param("error").is_some()
    }

    /// Redirect URI with the response parameters appended to its query.
    pub fn location(&self) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(&self.redirect_uri)?;
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in &self.params {
                query.append_pair(k, v);
            }
        }
        Ok(url.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// Send the browser back to the client (code or error).
    Redirect(AuthorizationResponse),
    /// The client or redirect URI cannot be trusted; answer directly.
    Rejected(AuthorizeError),
    /// No subject yet; sign in and retry the same request.
    LoginRequired,
}

/// Authorize endpoint processing: request resolution, protocol checks, the
/// custom validator chain, login requirement and code issuance.
pub struct AuthorizeRequestPipeline {
    issuer: String,
    clients: Arc<ClientStore>,
    par: Arc<PushedAuthorizationService>,
    codes: AuthorizationCodeStore,
    validators: Vec<Arc<dyn AuthorizeRequestValidator>>,
}

impl std::fmt::Debug for AuthorizeRequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizeRequestPipeline")
            .field("issuer", &self.issuer)
            .field(
                "validators",
                &self.validators.iter().map(|v| v.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AuthorizeRequestPipeline {
    pub fn new(
        issuer: impl Into<String>,
        clients: Arc<ClientStore>,
        par: Arc<PushedAuthorizationService>,
        codes: AuthorizationCodeStore,
        validators: Vec<Arc<dyn AuthorizeRequestValidator>>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            clients,
            par,
            codes,
            validators,
        }
    }

    pub fn codes(&self) -> &AuthorizationCodeStore {
        &self.codes
    }

    /// Process one front-channel authorize request.
    ///
    /// `query` carries `client_id` and, for clients that do not require PAR,
    /// the full parameter set. With a `request_uri` the pushed parameters are
    /// used instead.
    #[tracing::instrument(name = "authorize", skip_all, fields(client_id = %query.client_id))]
    pub async fn authorize(
        &self,
        query: &AuthorizeParameters,
        request_uri: Option<&str>,
        subject: Option<Subject>,
        cancel: &CancellationToken,
    ) -> Result<AuthorizeOutcome, PipelineError> {
        let now = Utc::now();

        if query.client_id.is_empty() {
            return Ok(reject(AuthorizeError::invalid_request("client_id is missing.")));
        }
        let Some(client) = self.clients.find(&query.client_id) else {
            return Ok(reject(AuthorizeError::unauthorized_client("Unknown client.")));
        };

        let (parameters, pushed) = match request_uri {
            Some(uri) => match self.par.resolve(&client.client_id, uri, now).await? {
                Some(stored) => (stored.parameters, true),
                None => return Ok(reject(AuthorizeError::invalid_request_uri())),
            },
            None if client.require_pushed_authorization => {
                return Ok(reject(AuthorizeError::invalid_request(
                    "Pushed authorization is required for this client.",
                )));
            }
            None => (query.clone(), false),
        };

        let validated = match parameters.validate(
            client,
            pushed,
            self.par.allow_unregistered_redirect_uris(),
        ) {
            Ok(v) => v,
            Err(ParameterError::Direct(error)) => return Ok(reject(error)),
            Err(ParameterError::Redirect {
                redirect_uri,
                state,
                error,
            }) => {
                warn!(error = %error, "authorize parameters rejected");
                if !self.redeem(&client.client_id, request_uri, now).await? {
                    return Ok(reject(AuthorizeError::invalid_request_uri()));
                }
                return Ok(AuthorizeOutcome::Redirect(AuthorizationResponse::error(
                    &redirect_uri,
                    &error,
                    state.as_deref(),
                    &self.issuer,
                )));
            }
        };

        let ctx = match AuthorizationContext::new(
            client.client_id.clone(),
            subject,
            validated.scopes.iter().cloned(),
        ) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(reject(AuthorizeError::invalid_request(e.to_string()))),
        };

        for validator in &self.validators {
            match validator.validate(&ctx, cancel).await {
                Ok(Verdict::Allow) => {}
                Ok(Verdict::Deny {
                    error_code,
                    error_description,
                }) => {
                    info!(
                        validator = validator.name(),
                        error = %error_code,
                        "authorize request denied"
                    );
                    if !self.redeem(&client.client_id, request_uri, now).await? {
                        return Ok(reject(AuthorizeError::invalid_request_uri()));
                    }
                    return Ok(AuthorizeOutcome::Redirect(AuthorizationResponse::error(
                        &validated.redirect_uri,
                        &AuthorizeError::new(error_code, error_description),
                        validated.state.as_deref(),
                        &self.issuer,
                    )));
                }
                Err(source) => {
                    warn!(
                        validator = validator.name(),
                        error = %source,
                        "authorize validator failed"
                    );
                    return Err(PipelineError::Validator {
                        validator: validator.name(),
                        source,
                    });
                }
            }
        }

        let Some(subject) = ctx.subject() else {
            if validated.prompt_none {
                if !self.redeem(&client.client_id, request_uri, now).await? {
                    return Ok(reject(AuthorizeError::invalid_request_uri()));
                }
                return Ok(AuthorizeOutcome::Redirect(AuthorizationResponse::error(
                    &validated.redirect_uri,
                    &AuthorizeError::login_required(),
                    validated.state.as_deref(),
                    &self.issuer,
                )));
            }
            return Ok(AuthorizeOutcome::LoginRequired);
        };

        // Redeem before issuing so a request_uri can never yield two codes.
        if !self.redeem(&client.client_id, request_uri, now).await? {
            return Ok(reject(AuthorizeError::invalid_request_uri()));
        }

        let grant = AuthorizationCodeGrant {
            client_id: client.client_id.clone(),
            subject_id: subject.id().to_string(),
            session_id: subject.session_id().to_string(),
            auth_time: subject.authenticated_at(),
            redirect_uri: validated.redirect_uri.clone(),
            scopes: validated.scopes.clone(),
            nonce: validated.nonce.clone(),
            code_challenge: validated.code_challenge.clone(),
            code_challenge_method: validated.code_challenge_method.clone(),
            created_at: now,
        };
        let code = self.codes.issue(&grant).await?;

        info!(subject_id = %subject.id(), "authorization code issued");
        Ok(AuthorizeOutcome::Redirect(AuthorizationResponse::code(
            &validated.redirect_uri,
            code,
            validated.state.as_deref(),
            &self.issuer,
        )))
    }

    // A terminal answer takes the pushed request out of the store. `false`
    // means a concurrent request already took it.
    async fn redeem(
        &self,
        client_id: &str,
        request_uri: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, PipelineError> {
        match request_uri {
            Some(uri) => Ok(self.par.redeem(client_id, uri, now).await?.is_some()),
            None => Ok(true),
        }
    }
}

fn reject(error: AuthorizeError) -> AuthorizeOutcome {
    warn!(error = %error, "authorize request rejected without redirect");
    AuthorizeOutcome::Rejected(error)
}
