//! Bearer-token auth and CLI key handling for publication endpoints.

mod claims;
mod jwt;

pub use claims::Claims;
pub use jwt::JwtManager;

use rand::RngCore;

/// Generate a raw CLI key: `hp_` followed by 32 random bytes as hex.
/// The raw key is returned to the caller exactly once; only its hash is stored.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("hp_{}", hex::encode(bytes))
}

/// Generate a webhook HMAC secret: 32 random bytes as hex.
pub fn generate_webhook_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_are_prefixed_and_unique() {
        let k1 = generate_api_key();
        let k2 = generate_api_key();
        assert!(k1.starts_with("hp_"));
        assert_eq!(k1.len(), 3 + 64);
        assert_ne!(k1, k2);
    }

    #[test]
    fn webhook_secrets_are_high_entropy_hex() {
        let s = generate_webhook_secret();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
