//! SHA256 digest helpers
//!
//! Digests are the primary identity of manifests, manifest lists, and
//! blobs. The registry serves them in the prefixed `sha256:<hex>` form;
//! everything stored by this crate uses that same form.

use sha2::{Digest, Sha256};

use crate::error::{MirrorError, Result};

/// Compute the bare hex SHA256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Format a bare hex digest in the prefixed registry form.
pub fn prefixed(hex_digest: &str) -> String {
    format!("sha256:{}", hex_digest)
}

/// Compute the prefixed SHA256 digest of a byte slice.
pub fn sha256_prefixed(data: &[u8]) -> String {
    prefixed(&sha256_hex(data))
}

pub fn is_valid_hex(digest: &str) -> bool {
    digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_valid_prefixed(digest: &str) -> bool {
    digest
        .strip_prefix("sha256:")
        .is_some_and(is_valid_hex)
}

/// Extract the hex part of a prefixed digest, rejecting malformed input.
pub fn hex_part(digest: &str) -> Result<&str> {
    match digest.strip_prefix("sha256:") {
        Some(hex) if is_valid_hex(hex) => Ok(hex),
        _ => Err(MirrorError::Parse(format!(
            "invalid sha256 digest '{}'",
            digest
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn empty_input_hashes_to_known_digest() {
        assert_eq!(sha256_hex(b""), EMPTY_SHA256);
        assert_eq!(sha256_prefixed(b""), format!("sha256:{}", EMPTY_SHA256));
    }

    #[test]
    fn hex_part_round_trips() {
        let digest = prefixed(EMPTY_SHA256);
        assert_eq!(hex_part(&digest).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn hex_part_rejects_malformed_digests() {
        assert!(hex_part("sha256:short").is_err());
        assert!(hex_part(EMPTY_SHA256).is_err());
        assert!(hex_part("sha512:0000").is_err());
    }

    #[test]
    fn validation_checks_length_and_charset() {
        assert!(is_valid_hex(EMPTY_SHA256));
        assert!(!is_valid_hex("xyz"));
        assert!(is_valid_prefixed(&prefixed(EMPTY_SHA256)));
        assert!(!is_valid_prefixed(EMPTY_SHA256));
    }
}
