use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Upper bound for every configured lifetime (one year).
pub const MAX_LIFETIME_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub issuer: String,
    // Backends; in-memory stores are used when these are unset.
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    // Lifetimes (seconds)
    pub par_lifetime_seconds: u64,
    pub authorization_code_lifetime_seconds: u64,
    pub session_lifetime_seconds: u64,
    pub session_sliding_expiration: bool,
    pub session_cleanup_interval_seconds: u64,
    pub session_cleanup_batch_size: i64,
    pub session_cookie_name: String,
    pub allow_unregistered_pushed_redirect_uris: bool,
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&var, "AUTH_PORT", 5001)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("AUTH_PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let issuer = var("AUTH_ISSUER")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("AUTH_ISSUER"))?;
        url::Url::parse(&issuer).map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))?;

        let database_url = var("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let redis_url = var("REDIS_URL").filter(|s| !s.trim().is_empty());

        let par_lifetime_seconds = lifetime_or(&var, "PAR_LIFETIME_SECONDS", 600)?; // 10 min
        let authorization_code_lifetime_seconds =
            lifetime_or(&var, "AUTHORIZATION_CODE_LIFETIME_SECONDS", 300)?; // 5 min
        let session_lifetime_seconds =
            lifetime_or(&var, "SESSION_LIFETIME_SECONDS", 36_000)?; // 10 h
        let session_sliding_expiration = parse_or(&var, "SESSION_SLIDING_EXPIRATION", true)?;
        let session_cleanup_interval_seconds =
            parse_or(&var, "SESSION_CLEANUP_INTERVAL_SECONDS", 600)?;
        let session_cleanup_batch_size: i64 = parse_or(&var, "SESSION_CLEANUP_BATCH_SIZE", 100)?;
        if session_cleanup_batch_size <= 0 {
            return Err(ConfigError::Invalid("SESSION_CLEANUP_BATCH_SIZE"));
        }
        let session_cookie_name =
            var("SESSION_COOKIE_NAME").unwrap_or_else(|| "idsrv.session".to_string());
        let allow_unregistered_pushed_redirect_uris =
            parse_or(&var, "ALLOW_UNREGISTERED_PUSHED_REDIRECT_URIS", true)?;
        let request_timeout_seconds = parse_or(&var, "REQUEST_TIMEOUT_SECONDS", 30)?;

        Ok(Config {
            addr,
            app_env,
            issuer,
            database_url,
            redis_url,
            par_lifetime_seconds,
            authorization_code_lifetime_seconds,
            session_lifetime_seconds,
            session_sliding_expiration,
            session_cleanup_interval_seconds,
            session_cleanup_batch_size,
            session_cookie_name,
            allow_unregistered_pushed_redirect_uris,
            request_timeout_seconds,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cleanup_interval_seconds.max(1))
    }
}

fn parse_or<F, T>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(key))
        }
        _ => Ok(default),
    }
}

// Lifetimes must be non-zero and at most `MAX_LIFETIME_SECONDS`.
fn lifetime_or<F>(var: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(var, key, default)? {
        0 => Err(ConfigError::Invalid(key)),
        s if s > MAX_LIFETIME_SECONDS => Err(ConfigError::Invalid(key)),
        s => Ok(s),
    }
}
