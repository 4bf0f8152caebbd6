//! Salted, intentionally slow PIN digests.
//!
//! PINs are 4-6 digits, so the digest work factor is the only thing standing
//! between a leaked row and a trivial brute force. Hashing uses scrypt with a
//! fixed cost and emits a self-describing PHC string (salt and parameters
//! embedded), so verification never needs out-of-band state.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use scrypt::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use scrypt::{Params, Scrypt};

/// Parameter type accepted by [`PinHasher::with_params`].
pub use scrypt::Params as ScryptParams;

/// Fixed scrypt cost: N = 2^15, r = 8, p = 1.
///
/// Hundreds of milliseconds per attempt on commodity hardware. Changing the
/// cost does not invalidate existing digests; old parameters ride along in
/// the PHC string.
const COST_LOG2: u8 = 15;
const BLOCK_SIZE: u32 = 8;
const PARALLELISM: u32 = 1;

/// Minimum and maximum PIN length, in ASCII digits.
pub const PIN_MIN_DIGITS: usize = 4;
pub const PIN_MAX_DIGITS: usize = 6;

/// Errors from PIN hashing and policy checks.
#[derive(Error, Debug)]
pub enum PinError {
    /// The PIN does not satisfy the 4-6 digit policy.
    #[error("PIN must be {PIN_MIN_DIGITS} to {PIN_MAX_DIGITS} ASCII digits")]
    InvalidFormat,

    /// The stored digest is not a parseable PHC string.
    #[error("malformed PIN digest")]
    MalformedDigest,

    /// Key derivation itself failed.
    #[error("PIN hashing failed: {0}")]
    Hash(String),
}

/// Check a candidate PIN against the 4-6 digit policy.
pub fn validate_pin(pin: &SecretString) -> Result<(), PinError> {
    let pin = pin.expose_secret();
    let ok = (PIN_MIN_DIGITS..=PIN_MAX_DIGITS).contains(&pin.len())
        && pin.bytes().all(|b| b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(PinError::InvalidFormat)
    }
}

/// Produces and verifies salted PIN digests.
///
/// Both operations are CPU-bound and slow by design; callers on an async
/// runtime should wrap them in `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct PinHasher {
    params: Params,
}

impl PinHasher {
    /// Hasher with the production work factor.
    pub fn new() -> Self {
        Self {
            params: Params::new(COST_LOG2, BLOCK_SIZE, PARALLELISM, Params::RECOMMENDED_LEN)
                .expect("default scrypt parameters are valid"),
        }
    }

    /// Hasher with caller-chosen parameters.
    ///
    /// Intended for tests, where the production cost would dominate the run
    /// time. Digests remain verifiable by any hasher since the parameters
    /// are embedded in the output.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    /// Hash a plaintext PIN into a self-describing PHC string with a fresh
    /// random salt.
    pub fn hash(&self, pin: &SecretString) -> Result<String, PinError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = Scrypt
            .hash_password_customized(
                pin.expose_secret().as_bytes(),
                None,
                None,
                self.params,
                &salt,
            )
            .map_err(|e| PinError::Hash(e.to_string()))?;
        Ok(digest.to_string())
    }

    /// Verify a plaintext PIN against a stored digest.
    ///
    /// Recomputes with the salt and parameters embedded in the digest and
    /// compares in constant time. A digest that fails to parse as a PHC
    /// string is reported as [`PinError::MalformedDigest`]; a parseable
    /// digest that simply does not match yields `Ok(false)`.
    pub fn verify(&self, pin: &SecretString, digest: &str) -> Result<bool, PinError> {
        let parsed = PasswordHash::new(digest).map_err(|_| PinError::MalformedDigest)?;
        match Scrypt.verify_password(pin.expose_secret().as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

impl Default for PinHasher {
    fn default() -> Self {
        Self::new()
    }
}
