//! PKCE verifier/challenge generation (RFC 7636, S256)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Random bytes behind the verifier. 64 bytes encode to 86 characters,
/// inside the 43..=128 range the RFC allows.
const VERIFIER_BYTES: usize = 64;

/// A verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut buf = [0u8; VERIFIER_BYTES];
        getrandom::getrandom(&mut buf).expect("OS CSPRNG failed");
        let verifier = URL_SAFE_NO_PAD.encode(buf);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_pair_shape() {
        let pair = PkcePair::generate();
        assert_eq!(pair.verifier.len(), 86);
        assert!(!pair.verifier.contains('='));
        assert!(pair
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(pair.challenge, challenge_for(&pair.verifier));
        assert_eq!(pair.challenge.len(), 43);
    }

    #[test]
    fn test_pairs_differ() {
        let a = PkcePair::generate();
        let b = PkcePair::generate();
        assert_ne!(a.verifier, b.verifier);
    }
}
