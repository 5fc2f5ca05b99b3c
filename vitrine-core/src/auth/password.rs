/// Password hashing using Argon2id
///
/// # Security
///
/// - **Algorithm**: Argon2id (hybrid of Argon2i and Argon2d)
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash, PHC string format with a random 16-byte salt
///
/// A wrong password is a normal `Ok(false)` outcome, never an error —
/// callers distinguish bad credentials (expected, user-facing) from broken
/// stored data (operational, alertable).
///
/// # Example
///
/// ```
/// use vitrine_core::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("plaisir-d4-offrir")?;
///
/// assert!(verify_password("plaisir-d4-offrir", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// The hashing primitive could not allocate a salt or complete
    #[error("failed to hash password: {0}")]
    HashError(String),

    /// A stored hash is malformed or corrupt — never raised for a merely
    /// wrong password
    #[error("invalid password hash: {0}")]
    InvalidHash(String),
}

/// Hashes a plaintext password with Argon2id.
///
/// Returns a PHC string (`$argon2id$v=19$m=65536,t=3,p=4$...`) embedding the
/// parameters and salt; the result is never empty.
///
/// # Errors
///
/// Returns [`PasswordError::HashError`] if the primitive fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536) // 64 MB
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("invalid parameters: {e}")))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("hash generation failed: {e}")))?;

    Ok(password_hash.to_string())
}

/// Verifies a plaintext password against a stored PHC hash.
///
/// The comparison inside Argon2 does not early-exit, so timing does not
/// leak where the mismatch occurred.
///
/// # Errors
///
/// Returns [`PasswordError::InvalidHash`] only when the stored hash cannot
/// be parsed or verification itself breaks; a wrong password is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("failed to parse hash: {e}")))?;

    // Parameters are embedded in the hash itself.
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::InvalidHash(format!(
            "verification failed: {e}"
        ))),
    }
}

/// Validates a new plaintext password against the minimum-length policy.
///
/// Every code path that accepts a new password — sign-up, reset, profile
/// change, admin create/update — runs this before hashing.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {min_length} characters long"
        ));
    }

    Ok(())
}
