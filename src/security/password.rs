use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {e}")),
    }
}

pub fn check_password_policy(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if password.trim().is_empty() {
        return Err("Password must not be blank".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("studio-pass-2024").expect("Failed to hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("studio-pass-2024", &hash).expect("Verify failed"));
        assert!(!verify_password("wrong-pass", &hash).expect("Verify failed"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same-password").expect("Failed to hash");
        let second = hash_password("same-password").expect("Failed to hash");
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("        ").is_err());
        assert!(check_password_policy("long-enough").is_ok());
    }
}
