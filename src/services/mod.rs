/*
 * Responsibility
 * - domain logic; no axum types below this point
 */
pub mod authorize;
pub mod cache;
pub mod clients;
pub mod handle;
pub mod par;
pub mod session;
pub mod users;
