//! Opaque handles (request_uri suffixes, codes, session cookies) and their hashes.
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// 32 bytes of entropy -> URL-safe base64 without padding.
pub fn generate() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Storage key for a handle: only the hash of the value ever reaches a store.
pub fn storage_key(handle: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(handle.as_bytes()))
}

/// base64(sha256(secret)), the format client secrets are registered in.
pub fn secret_hash(secret: &str) -> String {
    STANDARD.encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_handles_are_unique_and_url_safe() {
        let a = generate().unwrap();
        let b = generate().unwrap();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn secret_hash_matches_known_value() {
        // sha256("secret"), standard base64
        assert_eq!(
            secret_hash("secret"),
            "K7gNU3sdo+OL0wNhqoVWhr3g6s1xYv72ol/pe/Unols="
        );
    }

    #[test]
    fn storage_key_is_stable() {
        assert_eq!(storage_key("abc"), storage_key("abc"));
        assert_ne!(storage_key("abc"), storage_key("abd"));
    }
}
