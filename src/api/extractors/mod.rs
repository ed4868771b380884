/*
 * Responsibility
 * - request-derived values handlers take as arguments
 */
mod client_credentials;
mod session;

pub use client_credentials::{BasicCredentials, CredentialsError};
pub use session::{CurrentSession, MaybeSession};
