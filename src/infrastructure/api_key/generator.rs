//! API key generation and verification
//!
//! The only place in the gateway allowed to see a full credential. A
//! credential is `<tag><43 base64url chars>`; the public prefix is the tag
//! plus the first 8 random characters, the stored verifier is a SHA-256
//! digest of the whole credential.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Known literal tags a credential may start with
pub const KEY_TAGS: [&str; 2] = ["gk_live_", "gk_test_"];

/// Characters of the random portion included in the public prefix
const PREFIX_RANDOM_CHARS: usize = 8;

/// Minimum length of the random portion for a credential to be well-formed
const MIN_SECRET_CHARS: usize = 16;

/// Result of generating a new API key credential
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// The full credential (only shown once at creation)
    pub key: String,
    /// The public prefix for candidate lookup
    pub prefix: String,
    /// The hashed credential for storage
    pub hash: String,
}

/// Generator for secure API key credentials
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    tag: String,
    key_bytes: usize,
}

impl KeyGenerator {
    /// Create a generator with a custom tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key_bytes: 32,
        }
    }

    /// Generator for production credentials
    pub fn live() -> Self {
        Self::new("gk_live_")
    }

    /// Generator for test credentials
    pub fn test() -> Self {
        Self::new("gk_test_")
    }

    /// Generate a new credential
    pub fn generate(&self) -> GeneratedKey {
        let mut random_bytes = vec![0u8; self.key_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let encoded = URL_SAFE_NO_PAD.encode(&random_bytes);
        self.assemble(&encoded)
    }

    /// Build a credential from a known secret portion, for deterministic
    /// test fixtures.
    pub fn from_secret(&self, secret: &str) -> GeneratedKey {
        self.assemble(secret)
    }

    fn assemble(&self, secret: &str) -> GeneratedKey {
        let key = format!("{}{}", self.tag, secret);
        let head: String = secret.chars().take(PREFIX_RANDOM_CHARS).collect();
        let prefix = format!("{}{}", self.tag, head);
        let hash = hash_key(&key);

        GeneratedKey { key, prefix, hash }
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::live()
    }
}

/// Hash a credential for storage
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    format!("sha256${}", URL_SAFE_NO_PAD.encode(digest))
}

/// Verify a raw credential against a stored hash in constant time
pub fn verify_key(key: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_key(key), stored_hash)
}

/// Structural check: ASCII only, known tag and a long-enough random portion.
///
/// This is the cheap rejection gate; it never consults the key store.
pub fn is_well_formed(raw: &str) -> bool {
    raw.is_ascii()
        && KEY_TAGS
            .iter()
            .any(|tag| raw.starts_with(tag) && raw.len() >= tag.len() + MIN_SECRET_CHARS)
}

/// Extract the public prefix (tag + first 8 random chars) from a raw
/// credential. Returns None unless the credential is well-formed.
pub fn extract_prefix(raw: &str) -> Option<&str> {
    let tag = KEY_TAGS.iter().find(|tag| raw.starts_with(*tag))?;

    if raw.len() < tag.len() + MIN_SECRET_CHARS {
        return None;
    }

    // Checked slice: a multi-byte character at the boundary means the
    // credential is not one of ours.
    raw.get(..tag.len() + PREFIX_RANDOM_CHARS)
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
