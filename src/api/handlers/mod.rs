pub mod authorize;
pub mod discovery;
pub mod end_session;
pub mod login;
pub mod par;
