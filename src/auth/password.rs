/// Password Hashing and Verification
///
/// Stored hashes are self-describing strings whose last two `:`-separated
/// fields are always `salt:derived_key` (hex):
///
/// - `argon2id:{m_cost}:{t_cost}:{p_cost}:{salt}:{key}` for every hash
///   derived by this module. The cost parameters travel with the hash, so the
///   constants below can be raised without breaking stored rows.
/// - `{salt}:{key}` for rows written before the switch to Argon2id
///   (PBKDF2-HMAC-SHA256, 1000 iterations, 64-byte key). These still verify
///   and report `needs_rehash`.
///
/// In both schemes the hex salt string itself is the KDF salt input.

use argon2::{Algorithm, Argon2, Params, Version};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, ValidationError};

const SCHEME_ARGON2ID: &str = "argon2id";

/// Argon2id memory cost in KiB
pub const ARGON2_MEMORY_KIB: u32 = 19_456;
/// Argon2id passes over memory
pub const ARGON2_ITERATIONS: u32 = 2;
pub const ARGON2_PARALLELISM: u32 = 1;

const SALT_BYTES: usize = 16;
const KEY_BYTES: usize = 32;

// Upper bounds on parameters read back from storage
const MAX_MEMORY_KIB: u32 = 1 << 20;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

const DECOY_PASSWORD: &str = "no-account-has-this-password";
const DECOY_SALT: &str = "5ca1ab1edecafbad5ca1ab1edecafbad";

const LEGACY_ITERATIONS: u32 = 1_000;
const LEGACY_KEY_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CostParams {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

const CURRENT_PARAMS: CostParams = CostParams {
    memory_kib: ARGON2_MEMORY_KIB,
    iterations: ARGON2_ITERATIONS,
    parallelism: ARGON2_PARALLELISM,
};

lazy_static! {
    // Current-parameter hash that belongs to no account
    static ref DECOY_HASH: String =
        derive_password_hash(DECOY_PASSWORD, Some(DECOY_SALT)).unwrap_or_default();
}

enum StoredHash<'a> {
    Legacy { salt: &'a str, key: Vec<u8> },
    Argon2id { params: CostParams, salt: &'a str, key: Vec<u8> },
}

/// Derive a storable hash for `password`
///
/// Generates a random salt unless one is supplied. A supplied salt must be a
/// hex string of at least 16 characters.
///
/// # Errors
/// Returns a validation error for an unusable salt, or an internal error if
/// the KDF rejects its inputs.
pub fn derive_password_hash(password: &str, salt: Option<&str>) -> Result<String, AppError> {
    let salt = match salt {
        Some(salt) => {
            validate_salt(salt)?;
            salt.to_string()
        }
        None => generate_salt(),
    };

    let key = argon2_key(password.as_bytes(), salt.as_bytes(), CURRENT_PARAMS)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(format!(
        "{}:{}:{}:{}:{}:{}",
        SCHEME_ARGON2ID,
        CURRENT_PARAMS.memory_kib,
        CURRENT_PARAMS.iterations,
        CURRENT_PARAMS.parallelism,
        salt,
        hex::encode(key)
    ))
}

/// Check `password` against a stored hash
///
/// Malformed or unrecognised hashes verify as `false`.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let (derived, expected) = match parse_stored_hash(stored) {
        Some(StoredHash::Legacy { salt, key }) => {
            (pbkdf2_key(password.as_bytes(), salt.as_bytes()), key)
        }
        Some(StoredHash::Argon2id { params, salt, key }) => {
            match argon2_key(password.as_bytes(), salt.as_bytes(), params) {
                Ok(derived) => (derived, key),
                Err(e) => {
                    tracing::debug!(error = %e, "Stored password hash has unusable parameters");
                    return false;
                }
            }
        }
        None => {
            tracing::debug!("Stored password hash is malformed");
            return false;
        }
    };

    derived.as_slice().ct_eq(expected.as_slice()).into()
}

/// Spend the same KDF work as `verify_password` when there is no stored
/// hash to check, so an unknown email and a wrong password cost the same.
/// Always `false`.
pub fn verify_without_account(password: &str) -> bool {
    let _ = verify_password(password, &DECOY_HASH);
    false
}

/// True when a stored hash was derived with anything other than the current
/// scheme and cost parameters
pub fn needs_rehash(stored: &str) -> bool {
    match parse_stored_hash(stored) {
        Some(StoredHash::Legacy { .. }) => true,
        Some(StoredHash::Argon2id { params, .. }) => params != CURRENT_PARAMS,
        None => false,
    }
}

fn generate_salt() -> String {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

fn validate_salt(salt: &str) -> Result<(), ValidationError> {
    if salt.len() < SALT_BYTES {
        return Err(ValidationError::TooShort("salt".to_string(), SALT_BYTES));
    }
    if !salt.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat("salt".to_string()));
    }
    Ok(())
}

fn parse_stored_hash(stored: &str) -> Option<StoredHash<'_>> {
    let fields: Vec<&str> = stored.split(':').collect();

    match *fields.as_slice() {
        [salt, key] => {
            let key = decode_field(salt, key)?;
            Some(StoredHash::Legacy { salt, key })
        }
        [SCHEME_ARGON2ID, memory, iterations, parallelism, salt, key] => {
            let params = CostParams {
                memory_kib: memory.parse().ok()?,
                iterations: iterations.parse().ok()?,
                parallelism: parallelism.parse().ok()?,
            };
            if params.memory_kib > MAX_MEMORY_KIB
                || params.iterations > MAX_ITERATIONS
                || params.parallelism > MAX_PARALLELISM
            {
                return None;
            }
            let key = decode_field(salt, key)?;
            Some(StoredHash::Argon2id { params, salt, key })
        }
        _ => None,
    }
}

fn decode_field(salt: &str, key: &str) -> Option<Vec<u8>> {
    if salt.is_empty() {
        return None;
    }
    let key = hex::decode(key).ok()?;
    if key.is_empty() {
        return None;
    }
    Some(key)
}

fn argon2_key(password: &[u8], salt: &[u8], params: CostParams) -> Result<Vec<u8>, argon2::Error> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_BYTES),
    )?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = vec![0u8; KEY_BYTES];
    argon2.hash_password_into(password, salt, &mut key)?;
    Ok(key)
}

fn pbkdf2_key(password: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut key = vec![0u8; LEGACY_KEY_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, LEGACY_ITERATIONS, &mut key);
    key
}
