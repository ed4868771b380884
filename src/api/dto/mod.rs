pub mod authorize;
pub mod discovery;
pub mod login;
pub mod oauth_error;
pub mod par;
