pub mod error;
pub mod server_side_session_repo;
