//! PKCE verifier/challenge generation (RFC 7636, S256 only).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub(crate) const CHALLENGE_METHOD: &str = "S256";

#[derive(Debug, Clone)]
pub(crate) struct PkcePair {
    pub(crate) verifier: String,
    pub(crate) challenge: String,
}

impl PkcePair {
    pub(crate) fn generate() -> Self {
        let verifier = random_urlsafe(3);
        let challenge = challenge_s256(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

pub(crate) fn challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Opaque URL-safe value built from `blocks` random v4 UUIDs (16 bytes each).
pub(crate) fn random_urlsafe(blocks: usize) -> String {
    let bytes: Vec<u8> = (0..blocks)
        .flat_map(|_| *Uuid::new_v4().as_bytes())
        .collect();
    URL_SAFE_NO_PAD.encode(bytes)
}
