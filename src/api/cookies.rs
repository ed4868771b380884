//! Session cookie construction.
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::state::CookieSettings;

pub fn session_cookie(settings: &CookieSettings, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(settings.name.clone(), value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(settings.secure);
    cookie.set_max_age(time::Duration::seconds(settings.max_age_seconds));
    cookie
}

/// Cookie passed to `CookieJar::remove`; path must match the one that was set.
pub fn removal_cookie(settings: &CookieSettings) -> Cookie<'static> {
    let mut cookie = Cookie::from(settings.name.clone());
    cookie.set_path("/");
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secure: bool) -> CookieSettings {
        CookieSettings {
            name: "idsrv.session".into(),
            secure,
            max_age_seconds: 36000,
        }
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let rendered = session_cookie(&settings(false), "abc".into()).to_string();

        assert!(rendered.starts_with("idsrv.session=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Max-Age=36000"));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn production_cookie_is_secure() {
        let rendered = session_cookie(&settings(true), "abc".into()).to_string();
        assert!(rendered.contains("Secure"));
    }
}
