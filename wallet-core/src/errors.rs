use serde::{Deserialize, Serialize};
use std::fmt;

/// Message shown for every failed decryption, whatever the underlying cause.
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "Invalid password or corrupted vault data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    // Vault errors
    AuthenticationFailed,
    VaultUnavailable,
    MissingCredential(String),

    // Cryptographic errors
    CryptoError(String),
    InvalidMnemonic(String),

    // Storage errors
    StorageError(String),

    // Validation errors
    ValidationError(String),
    InvalidAddress(String),

    // Application errors
    AlreadyExists(String),
    NotFound(String),
    PermissionDenied(String),
    Timeout(String),
}

impl WalletError {
    /// Text safe to hand to the extension UI.
    ///
    /// Programming errors collapse into a generic message; everything else
    /// keeps its display form.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::MissingCredential(_) | WalletError::CryptoError(_) => {
                "Internal wallet error".to_string()
            }
            WalletError::StorageError(_) => {
                "Wallet storage is temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::StorageError(_) | WalletError::Timeout(_))
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::AuthenticationFailed => write!(f, "{}", AUTHENTICATION_FAILED_MESSAGE),
            WalletError::VaultUnavailable => write!(f, "No wallet has been set up yet"),
            WalletError::MissingCredential(msg) => write!(f, "Missing credential: {}", msg),

            WalletError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            WalletError::InvalidMnemonic(msg) => write!(f, "Invalid mnemonic: {}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),

            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),

            WalletError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),
            WalletError::PermissionDenied(msg) => write!(f, "{}", msg),
            WalletError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                WalletError::StorageError(format!("permission denied: {}", error))
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::ValidationError(format!("JSON error: {}", error))
    }
}
