use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::warn;

use crate::error::AuthServiceError;

/// Password hashing plus one-way hashing of PINs and security answers (Argon2id).
///
/// The `hash_*` methods are CPU-bound and blocking; request paths go through
/// [`CredentialVerifier::run_blocking`] or the async `verify_*` methods, which
/// run on tokio's blocking pool. Verification fails closed: an unparsable
/// stored hash is a mismatch, never a pass.
#[derive(Clone)]
pub struct CredentialVerifier {
    params: Params,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialVerifier {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Minimal-cost parameters for tests and local tooling.
    pub fn low_cost() -> Self {
        match Params::new(Params::MIN_M_COST.max(1024), 1, 1, None) {
            Ok(params) => Self { params },
            Err(_) => Self::default(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn hash(&self, secret: &str) -> Result<String, AuthServiceError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| anyhow::anyhow!("encode salt: {e}"))?;
        let hash = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("hash secret: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored credential hash is malformed");
                return false;
            }
        };
        self.argon2()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }

    /// Run `f` on the blocking pool so Argon2 never stalls a runtime worker.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T, AuthServiceError>
    where
        F: FnOnce(&CredentialVerifier) -> T + Send + 'static,
        T: Send + 'static,
    {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || f(&verifier))
            .await
            .map_err(|e| anyhow::anyhow!("credential task: {e}").into())
    }

    async fn verify_off_thread(&self, secret: String, stored: &str) -> bool {
        let stored = stored.to_owned();
        match self.run_blocking(move |v| v.verify(&secret, &stored)).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "credential verification did not complete");
                false
            }
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthServiceError> {
        self.hash(password)
    }

    pub async fn verify_password(&self, password: &str, stored: &str) -> bool {
        self.verify_off_thread(password.to_owned(), stored).await
    }

    pub fn hash_pin(&self, pin: &str) -> Result<String, AuthServiceError> {
        self.hash(pin.trim())
    }

    pub async fn verify_pin(&self, pin: &str, stored: &str) -> bool {
        self.verify_off_thread(pin.trim().to_owned(), stored).await
    }

    pub fn hash_security_answer(&self, answer: &str) -> Result<String, AuthServiceError> {
        self.hash(&normalize_answer(answer))
    }

    pub async fn verify_security_answer(&self, answer: &str, stored: &str) -> bool {
        self.verify_off_thread(normalize_answer(answer), stored).await
    }
}

/// Answers compare case- and whitespace-insensitively.
fn normalize_answer(answer: &str) -> String {
    answer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
