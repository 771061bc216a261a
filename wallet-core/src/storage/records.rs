use std::sync::Arc;

use blake3::Hasher as Blake3;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::backend::KeyValueStore;
use super::cipher::{KdfParameters, VaultCipher};
use super::keys;
use crate::errors::{WalletError, WalletResult};

/// Argon2id parameters a vault was sealed with, stored next to it in plain
/// text with a blake3 checksum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinnedKdf {
    pub params: KdfParameters,
    pub checksum: String,
}

impl PinnedKdf {
    pub fn new(params: KdfParameters) -> WalletResult<Self> {
        Ok(Self {
            checksum: kdf_checksum(&params)?,
            params,
        })
    }

    pub fn verify(&self) -> WalletResult<()> {
        if kdf_checksum(&self.params)? != self.checksum {
            return Err(WalletError::ValidationError(
                "Vault KDF parameters failed integrity verification".to_string(),
            ));
        }
        Ok(())
    }
}

fn kdf_checksum(params: &KdfParameters) -> WalletResult<String> {
    let mut hasher = Blake3::new();
    hasher.update(&serde_json::to_vec(params)?);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Named records on top of a [`KeyValueStore`], optionally password-sealed.
///
/// Secure records are stored as base64 encrypted blobs of their JSON form;
/// plain records are stored as JSON text. The configured cipher only seals
/// new vaults; once `creata_kdf` exists its parameters win.
#[derive(Debug, Clone)]
pub struct SecureRecordStore {
    backend: Arc<dyn KeyValueStore>,
    cipher: VaultCipher,
}

impl SecureRecordStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, cipher: VaultCipher) -> Self {
        Self { backend, cipher }
    }

    /// Cipher from configuration, used for vaults created from now on.
    pub fn cipher(&self) -> &VaultCipher {
        &self.cipher
    }

    /// Cipher matching the stored vault, falling back to configuration when
    /// no parameters have been pinned yet.
    pub fn vault_cipher(&self) -> WalletResult<VaultCipher> {
        match self.get_plain::<PinnedKdf>(keys::KDF)? {
            Some(pinned) => {
                pinned.verify()?;
                Ok(VaultCipher::new(pinned.params))
            }
            None => Ok(self.cipher),
        }
    }

    pub fn put<T>(
        &self,
        key: &str,
        value: &T,
        secure: bool,
        password: Option<&SecretString>,
    ) -> WalletResult<()>
    where
        T: Serialize + ?Sized,
    {
        let stored = if secure {
            let password = require_password(key, "put", password)?;
            self.seal(&self.vault_cipher()?, value, password)?
        } else {
            encode_plain(value)?
        };
        self.backend.set(key, &stored)
    }

    /// Read a record; an absent key is `Ok(None)`.
    pub fn get<T>(
        &self,
        key: &str,
        secure: bool,
        password: Option<&SecretString>,
    ) -> WalletResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        if secure {
            // Checked before touching storage so the misuse is caught even
            // when the record does not exist yet.
            require_password(key, "get", password)?;
        }

        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };

        let value = match password.filter(|_| secure) {
            Some(password) => {
                let plaintext = self.vault_cipher()?.open_from_str(&raw, password)?;
                serde_json::from_slice(&plaintext)?
            }
            None => serde_json::from_str(&raw)?,
        };
        Ok(Some(value))
    }

    pub fn put_plain<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> WalletResult<()> {
        self.put(key, value, false, None)
    }

    pub fn get_plain<T: DeserializeOwned>(&self, key: &str) -> WalletResult<Option<T>> {
        self.get(key, false, None)
    }

    pub fn put_secure<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        password: &SecretString,
    ) -> WalletResult<()> {
        self.put(key, value, true, Some(password))
    }

    pub fn get_secure<T: DeserializeOwned>(
        &self,
        key: &str,
        password: &SecretString,
    ) -> WalletResult<Option<T>> {
        self.get(key, true, Some(password))
    }

    /// Encrypt a value into its stored form without writing it.
    pub fn seal<T: Serialize + ?Sized>(
        &self,
        cipher: &VaultCipher,
        value: &T,
        password: &SecretString,
    ) -> WalletResult<String> {
        let json = Zeroizing::new(serde_json::to_vec(value)?);
        cipher.seal_to_string(&json, password)
    }

    /// Write several already-encoded records as one unit.
    ///
    /// Single-key writes are atomic in every backend; on a failure part way
    /// through, the keys written so far get their previous contents back.
    pub fn write_batch(&self, entries: &[(&str, String)]) -> WalletResult<()> {
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            previous.push(self.backend.get(key)?);
        }

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(err) = self.backend.set(key, value) {
                tracing::warn!(key, error = %err, "batch write failed, restoring earlier records");
                for ((key, _), old) in entries.iter().zip(&previous).take(written) {
                    let restored = match old {
                        Some(raw) => self.backend.set(key, raw),
                        None => self.backend.remove(key),
                    };
                    if let Err(restore_err) = restored {
                        tracing::error!(key, error = %restore_err, "could not restore record");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Presence check that never decrypts.
    pub fn contains(&self, key: &str) -> WalletResult<bool> {
        Ok(self.backend.get(key)?.is_some())
    }

    pub fn remove(&self, key: &str) -> WalletResult<()> {
        self.backend.remove(key)
    }

    pub fn clear(&self) -> WalletResult<()> {
        self.backend.clear()
    }
}

/// JSON text form of a plain record.
pub fn encode_plain<T: Serialize + ?Sized>(value: &T) -> WalletResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn require_password<'a>(
    key: &str,
    op: &str,
    password: Option<&'a SecretString>,
) -> WalletResult<&'a SecretString> {
    password.ok_or_else(|| {
        tracing::error!(key, op, "secure record operation attempted without a password");
        WalletError::MissingCredential(format!("secure {op} of '{key}' requires a password"))
    })
}
