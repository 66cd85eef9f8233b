//! Password digests and credential comparison for the credential store.
//!
//! Provides:
//! - The legacy unsalted SHA-256 hex digest stored by existing `users` tables
//! - Argon2id PHC hashing for deployments that opt into it
//! - Format detection so both kinds of stored hash verify side by side
//! - Constant-time comparison helpers, also used for the admin bearer token

use std::fmt;
use std::str::FromStr;

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Argon2,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Password-related errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
    #[error("unknown password scheme: {0}")]
    UnknownScheme(String),
}

// ============================================================================
// Schemes
// ============================================================================

/// How new password hashes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordScheme {
    /// Lowercase hex SHA-256 of the raw password bytes. Unsalted and fast,
    /// kept so stores written by earlier deployments keep working.
    #[default]
    Sha256,
    /// Salted Argon2id, stored as a PHC string.
    Argon2id,
}

impl PasswordScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for PasswordScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PasswordScheme {
    type Err = PasswordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "argon2id" => Ok(Self::Argon2id),
            other => Err(PasswordError::UnknownScheme(other.to_string())),
        }
    }
}

/// The shape of a value found in `users.password_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredHashFormat {
    Sha256Hex,
    Argon2Phc,
    Unknown,
}

impl StoredHashFormat {
    pub fn detect(stored: &str) -> Self {
        if is_sha256_hex(stored) {
            Self::Sha256Hex
        } else if stored.starts_with("$argon2") {
            Self::Argon2Phc
        } else {
            Self::Unknown
        }
    }
}

// ============================================================================
// Argon2 Hasher
// ============================================================================

#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    m_cost: u32,
    /// Time cost / iterations (default: 2)
    t_cost: u32,
    /// Parallelism factor (default: 1)
    p_cost: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        // OWASP recommended minimum parameters for Argon2id
        Self {
            m_cost: 19456,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure memory cost in KiB.
    pub fn with_memory_cost(mut self, kib: u32) -> Self {
        self.m_cost = kib;
        self
    }

    /// Configure time cost (iterations).
    pub fn with_time_cost(mut self, iterations: u32) -> Self {
        self.t_cost = iterations;
        self
    }

    fn argon2(&self) -> Result<Argon2<'_>, PasswordError> {
        let params = argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, None)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    /// Hash a password, returning the PHC-format hash string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored PHC-format hash. The parameters
    /// embedded in the PHC string win over this hasher's settings.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        match self.argon2() {
            Ok(argon2) => argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

// ============================================================================
// Credential Hasher
// ============================================================================

/// Produces and checks the values stored in `users.password_hash`.
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    scheme: PasswordScheme,
    argon2: Argon2Hasher,
}

impl CredentialHasher {
    pub fn new(scheme: PasswordScheme) -> Self {
        Self {
            scheme,
            argon2: Argon2Hasher::new(),
        }
    }

    /// Override the Argon2 cost parameters used for new hashes.
    pub fn with_argon2(mut self, argon2: Argon2Hasher) -> Self {
        self.argon2 = argon2;
        self
    }

    pub fn scheme(&self) -> PasswordScheme {
        self.scheme
    }

    /// Hash a plaintext password with the configured scheme.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        match self.scheme {
            PasswordScheme::Sha256 => Ok(sha256_hex(password)),
            PasswordScheme::Argon2id => self.argon2.hash(password),
        }
    }

    /// Check `password` against a stored hash of either supported format.
    ///
    /// Returns `false` for mismatches and for stored values in an unknown
    /// format, so callers cannot tell the two apart.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        match StoredHashFormat::detect(stored_hash) {
            StoredHashFormat::Sha256Hex => {
                let computed = sha256_hex(password);
                // Stored digests written by other tools may be uppercase.
                constant_time_eq(
                    computed.as_bytes(),
                    stored_hash.to_ascii_lowercase().as_bytes(),
                )
            }
            StoredHashFormat::Argon2Phc => self.argon2.verify(password, stored_hash),
            StoredHashFormat::Unknown => {
                tracing::warn!("stored password hash has an unrecognised format");
                false
            }
        }
    }
}

// ============================================================================
// Digest and comparison helpers
// ============================================================================

/// Expected length of a SHA-256 hex-encoded hash.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Check if a string looks like a SHA-256 hex digest (64 hex chars).
#[inline]
pub fn is_sha256_hex(input: &str) -> bool {
    input.len() == SHA256_HEX_LENGTH && input.chars().all(|c| c.is_ascii_hexdigit())
}

/// Compute SHA-256 of the password bytes and return it as lowercase hex.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, rest) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| rest.trim())
}

/// Check an `Authorization` header value against the expected bearer token.
pub fn bearer_matches(header_value: Option<&str>, expected: &str) -> bool {
    match header_value.and_then(strip_bearer) {
        Some(token) => constant_time_eq(token.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
