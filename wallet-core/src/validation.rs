use std::collections::HashSet;

use crate::crypto;
use crate::errors::{WalletError, WalletResult};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 256;
pub const MAX_SESSION_TIMEOUT_MINUTES: u32 = 24 * 60;

/// Input validation for values arriving from the extension UI.
pub struct InputValidator {
    common_passwords: HashSet<&'static str>,
}

impl InputValidator {
    pub fn new() -> Self {
        let common_passwords = [
            "password",
            "password1",
            "password123",
            "12345678",
            "123456789",
            "qwertyuiop",
            "iloveyou",
            "sunshine",
            "welcome123",
            "11111111",
        ]
        .into_iter()
        .collect();

        Self { common_passwords }
    }

    /// Length bounds plus a small deny-list. Strength beyond that is left to
    /// the Argon2id work factor.
    pub fn validate_password(&self, password: &str) -> WalletResult<()> {
        let length = password.chars().count();
        if length < MIN_PASSWORD_LEN {
            return Err(WalletError::ValidationError(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if length > MAX_PASSWORD_LEN {
            return Err(WalletError::ValidationError(
                "Password too long".to_string(),
            ));
        }

        if self.is_common_password(password) {
            return Err(WalletError::ValidationError(
                "Password is too common, please choose a stronger password".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_address(&self, address: &str) -> WalletResult<()> {
        if address.is_empty() {
            return Err(WalletError::ValidationError(
                "Address cannot be empty".to_string(),
            ));
        }

        if address.len() > 100 {
            return Err(WalletError::ValidationError("Address too long".to_string()));
        }

        crypto::validate_address(address)
    }

    pub fn validate_session_timeout(&self, minutes: u32) -> WalletResult<()> {
        if minutes == 0 || minutes > MAX_SESSION_TIMEOUT_MINUTES {
            return Err(WalletError::ValidationError(format!(
                "Session timeout must be between 1 and {MAX_SESSION_TIMEOUT_MINUTES} minutes"
            )));
        }
        Ok(())
    }

    pub fn validate_entropy_bits(&self, bits: usize) -> WalletResult<()> {
        match bits {
            128 | 160 | 192 | 224 | 256 => Ok(()),
            other => Err(WalletError::ValidationError(format!(
                "Unsupported entropy size {other}"
            ))),
        }
    }

    fn is_common_password(&self, password: &str) -> bool {
        self.common_passwords
            .contains(password.to_lowercase().as_str())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_bounds() {
        let validator = InputValidator::default();
        assert!(validator.validate_password("short").is_err());
        assert!(validator.validate_password("p1-vault").is_ok());
        assert!(validator.validate_password(&"x".repeat(257)).is_err());
    }

    #[test]
    fn common_passwords_are_rejected_case_insensitively() {
        let validator = InputValidator::default();
        assert!(validator.validate_password("Password123").is_err());
        assert!(validator.validate_password("correct horse battery").is_ok());
    }

    #[test]
    fn timeout_bounds() {
        let validator = InputValidator::default();
        assert!(validator.validate_session_timeout(0).is_err());
        assert!(validator.validate_session_timeout(30).is_ok());
        assert!(validator.validate_session_timeout(MAX_SESSION_TIMEOUT_MINUTES + 1).is_err());
    }

    #[test]
    fn entropy_sizes() {
        let validator = InputValidator::default();
        assert!(validator.validate_entropy_bits(256).is_ok());
        assert!(validator.validate_entropy_bits(512).is_err());
    }

    #[test]
    fn empty_address_is_rejected() {
        let validator = InputValidator::default();
        assert!(matches!(
            validator.validate_address(""),
            Err(WalletError::ValidationError(_))
        ));
        assert!(matches!(
            validator.validate_address("creata1xyz"),
            Err(WalletError::InvalidAddress(_))
        ));
    }
}
