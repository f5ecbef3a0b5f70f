//! bcrypt hashing, run off the async executor.

use bcrypt::BcryptError;
use tokio::task;

use crate::error::AuthError;

/// bcrypt only reads this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashes and verifies passwords with bcrypt at a fixed cost.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Returns a salted bcrypt hash of `password`.
    ///
    /// Passwords longer than [`MAX_PASSWORD_BYTES`] are refused rather than
    /// silently truncated.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::Hashing("password exceeds 72 bytes"));
        }
        let cost = self.cost;
        let password = password.to_owned();
        task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| AuthError::Hashing("hashing task failed"))?
            .map_err(|e| AuthError::Hashing(hash_failure(&e)))
    }

    /// Checks `password` against a stored hash.
    ///
    /// `Ok(false)` means a well-formed hash that does not match. A hash bcrypt
    /// cannot parse is an error.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        // No stored hash can come from an input `hash` refuses.
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        let password = password.to_owned();
        let hash = hash.to_owned();
        task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|_| AuthError::Hashing("hashing task failed"))?
            .map_err(|_| AuthError::Hashing("stored hash is malformed"))
    }
}

// bcrypt error messages can echo the hash being parsed; only fixed reasons
// leave this module.
fn hash_failure(err: &BcryptError) -> &'static str {
    match err {
        BcryptError::CostNotAllowed(_) | BcryptError::InvalidCost(_) => "bcrypt cost not allowed",
        _ => "bcrypt hashing failed",
    }
}
