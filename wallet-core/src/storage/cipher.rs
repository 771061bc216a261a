use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{WalletError, WalletResult};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

/// Smallest Argon2id memory cost accepted from configuration (19 MiB).
pub const MIN_M_COST_KIB: u32 = 19 * 1024;
/// Smallest Argon2id pass count accepted from configuration.
pub const MIN_T_COST: u32 = 2;

/// Argon2id work factor used to turn a password into a vault key.
///
/// The encrypted blob format does not record these values, so every record
/// in one vault must be read back with the parameters it was written with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParameters {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParameters {
    fn default() -> Self {
        Self {
            m_cost_kib: 64 * 1024, // 64 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParameters {
    /// Reject work factors below the Argon2id floor.
    pub fn validate(&self) -> WalletResult<()> {
        if self.m_cost_kib < MIN_M_COST_KIB {
            return Err(WalletError::ValidationError(format!(
                "KDF memory cost must be at least {} KiB",
                MIN_M_COST_KIB
            )));
        }
        if self.t_cost < MIN_T_COST {
            return Err(WalletError::ValidationError(format!(
                "KDF pass count must be at least {}",
                MIN_T_COST
            )));
        }
        if self.p_cost == 0 {
            return Err(WalletError::ValidationError(
                "KDF parallelism must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Salt, nonce and sealed payload of one encrypted record.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; NONCE_LEN],
    /// AES-256-GCM output, authentication tag included.
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Encode as base64(salt ‖ iv ‖ ciphertext).
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(SALT_LEN + NONCE_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.salt);
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.ciphertext);
        BASE64.encode(raw)
    }

    /// Parse a stored blob string.
    ///
    /// A blob that cannot be parsed is reported exactly like one that fails
    /// authentication.
    pub fn from_base64(encoded: &str) -> WalletResult<Self> {
        let raw = BASE64.decode(encoded.trim()).map_err(|e| {
            tracing::debug!(error = %e, "stored blob is not valid base64");
            WalletError::AuthenticationFailed
        })?;

        if raw.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            tracing::debug!(len = raw.len(), "stored blob shorter than header and tag");
            return Err(WalletError::AuthenticationFailed);
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&raw[..SALT_LEN]);
        let mut iv = [0u8; NONCE_LEN];
        iv.copy_from_slice(&raw[SALT_LEN..SALT_LEN + NONCE_LEN]);

        Ok(Self {
            salt,
            iv,
            ciphertext: raw[SALT_LEN + NONCE_LEN..].to_vec(),
        })
    }
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("salt", &hex::encode(self.salt))
            .field("iv", &hex::encode(self.iv))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Password-based authenticated encryption of opaque payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultCipher {
    params: KdfParameters,
}

impl VaultCipher {
    pub fn new(params: KdfParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParameters {
        &self.params
    }

    /// Derive a fresh key and seal `plaintext` under a fresh salt and nonce.
    pub fn encrypt(&self, plaintext: &[u8], password: &SecretString) -> WalletResult<EncryptedBlob> {
        let mut rng = OsRng;
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);

        let mut iv = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut iv);

        let key = derive_key(password, &salt, &self.params)?;
        let nonce = Nonce::assume_unique_for_key(iv);
        let buffer = Zeroizing::new(plaintext.to_vec());
        let ciphertext = encrypt_aes_gcm(&key, nonce, &buffer)?;

        Ok(EncryptedBlob {
            salt,
            iv,
            ciphertext,
        })
    }

    /// Re-derive the key from the blob's salt and open the payload.
    pub fn decrypt(
        &self,
        blob: &EncryptedBlob,
        password: &SecretString,
    ) -> WalletResult<Zeroizing<Vec<u8>>> {
        let key = derive_key(password, &blob.salt, &self.params)?;
        let nonce = Nonce::assume_unique_for_key(blob.iv);
        decrypt_aes_gcm(&key, nonce, &blob.ciphertext)
    }

    /// Encrypt and encode in one step.
    pub fn seal_to_string(&self, plaintext: &[u8], password: &SecretString) -> WalletResult<String> {
        Ok(self.encrypt(plaintext, password)?.to_base64())
    }

    /// Decode and decrypt in one step.
    pub fn open_from_str(
        &self,
        encoded: &str,
        password: &SecretString,
    ) -> WalletResult<Zeroizing<Vec<u8>>> {
        let blob = EncryptedBlob::from_base64(encoded)?;
        self.decrypt(&blob, password)
    }
}

fn derive_key(
    password: &SecretString,
    salt: &[u8; SALT_LEN],
    params: &KdfParameters,
) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
    let argon_params = Params::new(params.m_cost_kib, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| WalletError::CryptoError(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new_with_secret(&[], Algorithm::Argon2id, Version::V0x13, argon_params)
        .map_err(|e| WalletError::CryptoError(format!("Failed to init Argon2: {e}")))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, key.as_mut())
        .map_err(|e| WalletError::CryptoError(format!("KDF failed: {e}")))?;
    Ok(key)
}

fn encrypt_aes_gcm(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    buffer: &Zeroizing<Vec<u8>>,
) -> WalletResult<Vec<u8>> {
    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, key.as_ref())
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    let key = LessSafeKey::new(unbound_key);

    let mut in_out: Vec<u8> = buffer.iter().copied().collect();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::CryptoError("Encryption failure".to_string()))?;
    Ok(in_out)
}

fn decrypt_aes_gcm(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    ciphertext: &[u8],
) -> WalletResult<Zeroizing<Vec<u8>>> {
    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, key.as_ref())
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    let key = LessSafeKey::new(unbound_key);

    if ciphertext.len() < aead::AES_256_GCM.tag_len() {
        tracing::debug!("ciphertext shorter than authentication tag");
        return Err(WalletError::AuthenticationFailed);
    }

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            tracing::debug!("authentication tag did not verify");
            WalletError::AuthenticationFailed
        })?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}
