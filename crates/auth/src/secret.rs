//! Secret helpers.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// First 8 hex characters of the SHA-256 of `data`, safe to log.
pub fn hash_for_logging(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    hex::encode(&digest[..4])
}

/// Fresh random shared secret: 32 bytes as 64 lowercase hex characters.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare two secrets without short-circuiting.
///
/// Both sides are hashed first so the comparison length never depends on
/// the input, then every byte of the digests is folded.
pub(crate) fn constant_time_eq(provided: &[u8], expected_digest: &[u8; 32]) -> bool {
    let provided: [u8; 32] = Sha256::digest(provided).into();
    provided
        .iter()
        .zip(expected_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub(crate) fn digest(secret: &[u8]) -> [u8; 32] {
    Sha256::digest(secret).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn logging_hash_is_eight_hex_chars() {
        let hash = hash_for_logging("test-data");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, hash_for_logging("test-data"));
        assert_ne!(hash, hash_for_logging("other-data"));
    }

    #[test]
    fn generated_secrets_are_64_hex_and_unique() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let secret = generate_secret();
            assert_eq!(secret.len(), 64);
            assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
            seen.insert(secret);
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn comparison_requires_exact_bytes() {
        let expected = digest(b"k-secret");
        assert!(constant_time_eq(b"k-secret", &expected));
        assert!(!constant_time_eq(b"k-secreT", &expected));
        assert!(!constant_time_eq(b"k-secret ", &expected));
        assert!(!constant_time_eq(b"", &expected));
    }
}
