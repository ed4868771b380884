/*
 * Responsibility
 * - public interface of the middleware (apply functions)
 */
pub mod http;
pub mod security_headers;
pub mod session;
