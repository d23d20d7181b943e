/// Secure storage for the access token
///
/// Uses OS-backed secure storage:
/// - macOS: Keychain
/// - Linux: kernel keyutils
/// - Windows: Credential Manager
use keyring::Entry;
use std::fmt;

use crate::constants::KEYRING_SERVICE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureKey {
    AccessToken,
}

impl SecureKey {
    fn key_name(&self) -> &'static str {
        match self {
            SecureKey::AccessToken => "access_token",
        }
    }
}

impl fmt::Display for SecureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecureStorageError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(SecureKey),
}

pub struct SecureStorage;

impl SecureStorage {
    pub fn set(key: SecureKey, value: &str) -> Result<(), SecureStorageError> {
        let entry = Entry::new(KEYRING_SERVICE, key.key_name())?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn get(key: SecureKey) -> Result<String, SecureStorageError> {
        let entry = Entry::new(KEYRING_SERVICE, key.key_name())?;
        match entry.get_password() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(SecureStorageError::KeyNotFound(key)),
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }

    /// Deleting a missing entry is not an error.
    pub fn delete(key: SecureKey) -> Result<(), SecureStorageError> {
        let entry = Entry::new(KEYRING_SERVICE, key.key_name())?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }
}
