pub mod client;
pub mod memory;
pub mod valkey;

pub use client::{CacheClient, CacheError, CacheResult, get_json, put_json, take_json};
pub use memory::MemoryCache;
pub use valkey::ValkeyClient;
