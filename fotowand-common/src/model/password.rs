use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, PasswordHash, SaltString, rand_core::OsRng},
};
use serde::{
    Deserialize, Deserializer,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 6;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordHashingError(password_hash::Error);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Password must be at least {PASSWORD_MIN_LEN} characters")]
pub struct InvalidPasswordError;

/// A signup password that met the minimum length. Never logged or serialized.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidPasswordError> {
        if password.chars().count() >= PASSWORD_MIN_LEN {
            Ok(Password(password))
        } else {
            Err(InvalidPasswordError)
        }
    }

    /// Hashes with a fresh random salt into a PHC string for storage.
    pub fn hash(&self) -> Result<String, PasswordHashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(PasswordHashingError)?;

        Ok(hash.to_string())
    }
}

/// Checks a login attempt against a stored PHC string. A malformed stored
/// hash is an error; a mismatching password is `Ok(false)`.
pub fn verify_password(candidate: &str, stored: &str) -> Result<bool, PasswordHashingError> {
    let parsed = PasswordHash::new(stored).map_err(PasswordHashingError)?;

    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordHashingError(err)),
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str("[redacted]"), &"Password"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_minimum_length() {
        assert!(Password::new("12345".to_owned()).is_err());
        assert!(Password::new("123456".to_owned()).is_ok());
    }

    #[test]
    fn hash_then_verify() {
        let password = Password::new("hunter22".to_owned()).unwrap();
        let stored = password.hash().unwrap();

        assert!(verify_password("hunter22", &stored).unwrap());
        assert!(!verify_password("hunter23", &stored).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(verify_password("hunter22", "not-a-phc-string").is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let password = Password::new("hunter22".to_owned()).unwrap();
        assert!(!format!("{password:?}").contains("hunter22"));
    }
}
