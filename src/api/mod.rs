/*
 * Responsibility
 * - public surface of the HTTP layer (routes() and the pieces handlers share)
 */
pub mod cookies;
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;
pub mod views;

pub use routes::routes;
