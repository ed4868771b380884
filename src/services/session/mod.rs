//! Server-side user sessions behind the sign-in cookie.
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
pub use service::SessionService;
pub use store::{ServerSideSession, SessionStore, SessionStoreError};
