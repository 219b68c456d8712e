//! Hashing helpers for values that must never appear in logs verbatim.

use sha2::{Digest, Sha256};

/// Number of hex characters kept when fingerprinting a token.
const FINGERPRINT_LEN: usize = 12;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short, stable fingerprint of a marketplace registration token.
///
/// Registration tokens are bearer credentials; log this instead.
pub fn token_fingerprint(token: &str) -> String {
    let mut digest = sha256_hex(token);
    digest.truncate(FINGERPRINT_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_token_fingerprint_is_prefix_of_digest() {
        let fingerprint = token_fingerprint("test");
        assert_eq!(fingerprint.len(), FINGERPRINT_LEN);
        assert_eq!(fingerprint, "9f86d081884c");
    }

    #[test]
    fn test_token_fingerprint_does_not_contain_token() {
        let token = "abcdefabcdef";
        assert_ne!(token_fingerprint(token), token);
    }

    #[test]
    fn test_token_fingerprint_deterministic() {
        assert_eq!(token_fingerprint("tok"), token_fingerprint("tok"));
        assert_ne!(token_fingerprint("tok-1"), token_fingerprint("tok-2"));
    }
}
