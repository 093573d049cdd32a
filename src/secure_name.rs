//! Secure-name generator.
//!
//! `secure_name(path) = base64url(trim(argon2id(salt_name || path, fixed_salt)))`.
//! Grounded on `original_source/security.py::generateSecureName`, which
//! hardcoded its salt; per §9 Open Question 2 this crate requires both
//! salts to come from configuration and errors out rather than falling
//! back to a built-in constant.

use crate::error::{Result, SyncError};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Output length of the secure name's raw hash, in bytes, before
/// base64url encoding (§4.C).
const OUTPUT_LEN: usize = 16;

/// The two salts the secure-name generator and the crypto key derivation
/// both need. Both must come from configuration (§4.C, §4.L, §9 Open
/// Question 2) — there is no hardcoded fallback.
#[derive(Clone)]
pub struct Salts {
    /// Prefixed onto the path before hashing (`salt_name` in §4.C).
    pub salt_name: String,
    /// The Argon2id salt parameter itself (`fixed_salt` in §4.C). Must
    /// be at least 8 bytes.
    pub fixed_salt: Vec<u8>,
}

impl Salts {
    pub fn new(salt_name: impl Into<String>, fixed_salt: impl Into<Vec<u8>>) -> Result<Self> {
        let fixed_salt = fixed_salt.into();
        if fixed_salt.len() < 8 {
            return Err(SyncError::config(
                "fixed_salt (ARGON_SALT) must be at least 8 bytes",
            ));
        }
        Ok(Self {
            salt_name: salt_name.into(),
            fixed_salt,
        })
    }
}

/// Derive the deterministic, URL-safe opaque remote name for a relative
/// path. The fixed salt is a deliberate design choice: the mapping is
/// reversible by whoever holds the salt, because the secure index (not
/// the remote name) is this system's privacy boundary (§4.C).
pub fn secure_name(path: &str, salts: &Salts) -> Result<String> {
    let params = Params::new(
        (512 * 1024) / 1024, // memory_cost in KiB: 512 KiB
        1,                   // time_cost
        2,                   // parallelism
        Some(OUTPUT_LEN),
    )
    .map_err(|e| SyncError::crypto(format!("invalid argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut input = String::with_capacity(salts.salt_name.len() + path.len());
    input.push_str(&salts.salt_name);
    input.push_str(path);

    let mut out = [0u8; OUTPUT_LEN];
    argon2
        .hash_password_into(input.as_bytes(), &salts.fixed_salt, &mut out)
        .map_err(|e| SyncError::crypto(format!("secure name derivation failed: {e}")))?;

    Ok(URL_SAFE_NO_PAD.encode(out))
}
