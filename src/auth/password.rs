//! Password hashing and verification for logingate.
//!
//! New hashes are always produced with Argon2id. Verification also accepts
//! the salted SHA-256 format used by older login plugins, so stored
//! credentials can be upgraded on the next successful login instead of
//! forcing every player to register again.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand::Rng;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::HashingConfig;

/// Prefix shared by every Argon2 PHC string.
const ARGON2_PREFIX: &str = "$argon2";

/// Prefix of the legacy salted SHA-256 format.
const LEGACY_SHA_PREFIX: &str = "$SHA$";

/// Password-related errors.
///
/// A wrong password is not an error: `verify` returns `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// The stored value matches no supported hash scheme.
    #[error("unrecognized password hash format")]
    UnrecognizedHashFormat,

    /// The hashing primitive failed or the stored hash is malformed.
    #[error("password hash backend error: {0}")]
    HashBackend(String),
}

/// A pluggable password hashing strategy.
///
/// Implementations hold no per-call state and may be shared freely
/// between threads.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into an opaque string.
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;

    /// Verify a plaintext password against a previously stored hash.
    ///
    /// Returns `Ok(false)` on mismatch and
    /// [`PasswordError::UnrecognizedHashFormat`] if the stored value has
    /// a shape this hasher does not understand.
    fn verify(&self, stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError>;

    /// Whether the stored value has the shape produced by this hasher.
    fn recognizes(&self, stored_hash: &str) -> bool;

    /// Whether a stored hash was produced by an older scheme and should be
    /// replaced after the next successful verification.
    fn needs_rehash(&self, _stored_hash: &str) -> bool {
        false
    }
}

/// Argon2id hasher, the current default scheme.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Create a hasher with explicit cost parameters.
    ///
    /// * `m_cost` - memory cost in KiB
    /// * `t_cost` - number of iterations
    /// * `p_cost` - degree of parallelism
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| PasswordError::HashBackend(format!("invalid Argon2 params: {e}")))?;
        Ok(Self { params })
    }

    /// Create a hasher from the `[hashing]` configuration section.
    pub fn from_config(config: &HashingConfig) -> Result<Self, PasswordError> {
        Self::with_params(config.memory_cost_kib, config.time_cost, config.parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashBackend(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify(&self, stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
        if !self.recognizes(stored_hash) {
            return Err(PasswordError::UnrecognizedHashFormat);
        }

        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| PasswordError::HashBackend(format!("malformed Argon2 hash: {e}")))?;

        // Parameters come from the stored hash, not from self.params
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::HashBackend(e.to_string())),
        }
    }

    fn recognizes(&self, stored_hash: &str) -> bool {
        stored_hash.starts_with(ARGON2_PREFIX)
    }
}

/// Legacy salted SHA-256 scheme: `$SHA$<salt>$<hex digest>`.
///
/// The digest is `sha256(hex(sha256(password)) || salt)`, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySha256Hasher;

impl LegacySha256Hasher {
    fn digest(plaintext: &str, salt: &str) -> String {
        let inner = hex::encode(Sha256::digest(plaintext.as_bytes()));
        let mut outer = Sha256::new();
        outer.update(inner.as_bytes());
        outer.update(salt.as_bytes());
        hex::encode(outer.finalize())
    }
}

impl PasswordHasher for LegacySha256Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt_bytes: [u8; 8] = rand::rng().random();
        let salt = hex::encode(salt_bytes);
        let digest = Self::digest(plaintext, &salt);
        Ok(format!("{LEGACY_SHA_PREFIX}{salt}${digest}"))
    }

    fn verify(&self, stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
        let body = stored_hash
            .strip_prefix(LEGACY_SHA_PREFIX)
            .ok_or(PasswordError::UnrecognizedHashFormat)?;

        let (salt, expected) = body
            .split_once('$')
            .ok_or_else(|| PasswordError::HashBackend("legacy hash has no digest".to_string()))?;

        if salt.is_empty() || !matches!(hex::decode(expected), Ok(d) if d.len() == 32) {
            return Err(PasswordError::HashBackend(
                "malformed legacy SHA-256 hash".to_string(),
            ));
        }

        let actual = Self::digest(plaintext, salt);
        Ok(constant_time_eq(
            actual.as_bytes(),
            expected.to_ascii_lowercase().as_bytes(),
        ))
    }

    fn recognizes(&self, stored_hash: &str) -> bool {
        stored_hash.starts_with(LEGACY_SHA_PREFIX)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Hasher that writes the current scheme and reads every known scheme.
#[derive(Debug, Clone)]
pub struct SchemeHasher {
    current: Argon2Hasher,
    legacy: LegacySha256Hasher,
}

impl SchemeHasher {
    /// Create a scheme hasher that produces hashes with `current`.
    pub fn new(current: Argon2Hasher) -> Self {
        Self {
            current,
            legacy: LegacySha256Hasher,
        }
    }

    /// Create a scheme hasher from the `[hashing]` configuration section.
    pub fn from_config(config: &HashingConfig) -> Result<Self, PasswordError> {
        Ok(Self::new(Argon2Hasher::from_config(config)?))
    }
}

impl PasswordHasher for SchemeHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        self.current.hash(plaintext)
    }

    fn verify(&self, stored_hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
        if self.current.recognizes(stored_hash) {
            self.current.verify(stored_hash, plaintext)
        } else if self.legacy.recognizes(stored_hash) {
            self.legacy.verify(stored_hash, plaintext)
        } else {
            Err(PasswordError::UnrecognizedHashFormat)
        }
    }

    fn recognizes(&self, stored_hash: &str) -> bool {
        self.current.recognizes(stored_hash) || self.legacy.recognizes(stored_hash)
    }

    fn needs_rehash(&self, stored_hash: &str) -> bool {
        !self.current.recognizes(stored_hash)
    }
}

#[cfg(test)]
pub(crate) fn fast_hasher() -> SchemeHasher {
    // Minimal costs keep the test suite fast
    SchemeHasher::new(Argon2Hasher::with_params(256, 1, 1).unwrap())
}
