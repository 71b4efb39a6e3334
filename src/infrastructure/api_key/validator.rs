//! Key validation
//!
//! Resolves a raw credential into a verified key identity or a typed
//! rejection. Fail-closed: any key-store error is reported as an invalid
//! credential, never propagated.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::api_key::{ApiKeyId, ApiKeyStatus, KeyStore};

use super::generator;

/// Candidate sets larger than this suggest the prefix is too short for the
/// key population; worth surfacing before verification cost matters.
const COLLISION_WARN_THRESHOLD: usize = 8;

/// Why a credential was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReason {
    /// Absent credential or wrong structural format; no store lookup happened
    Malformed,
    /// No active key matched the credential (or the store failed)
    Invalid,
    /// The secret verified but the key's expiry has passed
    Expired,
}

impl std::fmt::Display for AuthReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed"),
            Self::Invalid => write!(f, "invalid"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Typed rejection. Carries the key id when one was resolvable (the expired
/// case) so usage can still be attributed.
#[derive(Debug, Clone)]
pub struct AuthRejection {
    pub reason: AuthReason,
    pub key_id: Option<ApiKeyId>,
}

impl AuthRejection {
    fn new(reason: AuthReason) -> Self {
        Self {
            reason,
            key_id: None,
        }
    }
}

/// Verified key identity handed to the rest of the pipeline
#[derive(Debug, Clone)]
pub struct ValidatedKey {
    pub id: ApiKeyId,
    pub owner_id: String,
    pub rate_limit: u32,
}

/// Resolves raw credentials against the key store
#[derive(Debug, Clone)]
pub struct KeyValidator {
    store: Arc<dyn KeyStore>,
}

impl KeyValidator {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Validate a raw credential string.
    ///
    /// Structural rejects never touch the key store. Candidates sharing the
    /// public prefix are verified in constant time, first match wins. A
    /// matching but expired key triggers an idempotent status transition on
    /// the store and is still rejected.
    pub async fn validate(&self, raw: &str) -> Result<ValidatedKey, AuthRejection> {
        if !generator::is_well_formed(raw) {
            return Err(AuthRejection::new(AuthReason::Malformed));
        }

        let Some(prefix) = generator::extract_prefix(raw) else {
            return Err(AuthRejection::new(AuthReason::Malformed));
        };

        debug!(prefix = %prefix, "validating API key");

        let candidates = match self.store.find_active_by_prefix(prefix).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "key store lookup failed, rejecting credential");
                return Err(AuthRejection::new(AuthReason::Invalid));
            }
        };

        if candidates.len() > COLLISION_WARN_THRESHOLD {
            warn!(
                prefix = %prefix,
                count = candidates.len(),
                "unusually large candidate set for key prefix"
            );
        }

        let Some(key) = candidates
            .into_iter()
            .find(|k| generator::verify_key(raw, k.secret_hash()))
        else {
            return Err(AuthRejection::new(AuthReason::Invalid));
        };

        if key.is_expired() {
            if let Err(e) = self.store.set_status(key.id(), ApiKeyStatus::Expired).await {
                warn!(key_id = %key.id(), error = %e, "failed to mark key expired");
            }

            return Err(AuthRejection {
                reason: AuthReason::Expired,
                key_id: Some(key.id().clone()),
            });
        }

        // Best-effort last-used update; never blocks the validation result.
        let store = Arc::clone(&self.store);
        let id = key.id().clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(&id).await {
                warn!(key_id = %id, error = %e, "failed to record key usage");
            }
        });

        Ok(ValidatedKey {
            id: key.id().clone(),
            owner_id: key.owner_id().to_string(),
            rate_limit: key.rate_limit(),
        })
    }
}
