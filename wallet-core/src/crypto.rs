//! Mnemonic handling and account key derivation.
//!
//! Accounts are Ed25519 keys derived from the BIP39 seed with SLIP-0010
//! (hardened-only) along `m/44'/118'/0'/0'/{index}'`. Addresses are bech32
//! with the `creata` prefix over the first 20 bytes of SHA-256(public key).
use bech32::{Bech32, Hrp};
use bip39::{Language, Mnemonic};
use ed25519_dalek::{Signature, Signer, SigningKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{WalletError, WalletResult};

type HmacSha512 = Hmac<Sha512>;

pub const SUPPORTED_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];
pub const DEFAULT_ENTROPY_BITS: usize = 256;
pub const ADDRESS_HRP: &str = "creata";
pub const ACCOUNT_PATH_PREFIX: &str = "m/44'/118'/0'/0'";
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

const HARDENED_OFFSET: u32 = 0x8000_0000;
const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";
const ACCOUNT_PATH: [u32; 4] = [44, 118, 0, 0];
const ADDRESS_BYTES: usize = 20;

/// Lowercase, trim and collapse runs of whitespace to single spaces.
pub fn normalize_mnemonic(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate a fresh English BIP39 phrase from OS entropy.
pub fn generate_mnemonic(entropy_bits: usize) -> WalletResult<Zeroizing<String>> {
    if !(128..=256).contains(&entropy_bits) || entropy_bits % 32 != 0 {
        return Err(WalletError::ValidationError(format!(
            "Unsupported entropy size {entropy_bits}: must be 128, 160, 192, 224 or 256 bits"
        )));
    }

    let mut entropy = Zeroizing::new(vec![0u8; entropy_bits / 8]);
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| WalletError::CryptoError(format!("Failed to generate entropy: {}", e)))?;

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::CryptoError(format!("Failed to create mnemonic: {}", e)))?;

    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Check a normalized phrase: supported word count, known words, checksum.
pub fn validate_mnemonic(phrase: &str) -> WalletResult<Mnemonic> {
    let word_count = phrase.split_whitespace().count();
    if !SUPPORTED_WORD_COUNTS.contains(&word_count) {
        return Err(WalletError::InvalidMnemonic(format!(
            "expected 12, 15, 18, 21 or 24 words, got {word_count}"
        )));
    }

    Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Ed25519 signing key for one derived account.
pub struct AccountKeyPair {
    index: u32,
    signing_key: SigningKey,
}

impl AccountKeyPair {
    /// Derive the account at `index` from a validated phrase.
    pub fn derive(mnemonic: &Mnemonic, index: u32) -> WalletResult<Self> {
        if index >= HARDENED_OFFSET {
            return Err(WalletError::ValidationError(format!(
                "Account index {index} out of range"
            )));
        }

        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let (mut key, mut chain_code) = master_key_from_seed(&seed[..])?;

        for child in ACCOUNT_PATH.iter().copied().chain(std::iter::once(index)) {
            let (child_key, child_chain) = derive_hardened_child(&key, &chain_code, child)?;
            key.zeroize();
            chain_code.zeroize();
            key = child_key;
            chain_code = child_chain;
        }

        let signing_key = SigningKey::from_bytes(&key);
        key.zeroize();
        chain_code.zeroize();

        Ok(Self { index, signing_key })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn derivation_path(&self) -> String {
        format!("{ACCOUNT_PATH_PREFIX}/{}'", self.index)
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    pub fn address(&self) -> WalletResult<String> {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Handed to the external transaction builder once the wallet is unlocked.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl std::fmt::Debug for AccountKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeyPair")
            .field("index", &self.index)
            .field("public_key", &self.public_key_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

pub fn address_from_public_key(public_key: &[u8]) -> WalletResult<String> {
    let digest = Sha256::digest(public_key);
    let hrp = Hrp::parse(ADDRESS_HRP)
        .map_err(|e| WalletError::CryptoError(format!("Invalid address prefix: {e}")))?;
    bech32::encode::<Bech32>(hrp, &digest[..ADDRESS_BYTES])
        .map_err(|e| WalletError::CryptoError(format!("Address encoding failed: {e}")))
}

/// Accept only `creata1…` bech32 addresses carrying a 20-byte payload.
pub fn validate_address(address: &str) -> WalletResult<()> {
    let (hrp, data) = bech32::decode(address)
        .map_err(|e| WalletError::InvalidAddress(format!("{address}: {e}")))?;

    let expected = Hrp::parse(ADDRESS_HRP)
        .map_err(|e| WalletError::CryptoError(format!("Invalid address prefix: {e}")))?;
    if hrp != expected {
        return Err(WalletError::InvalidAddress(format!(
            "{address}: expected '{ADDRESS_HRP}' prefix"
        )));
    }
    if data.len() != ADDRESS_BYTES {
        return Err(WalletError::InvalidAddress(format!(
            "{address}: expected {ADDRESS_BYTES}-byte payload, got {}",
            data.len()
        )));
    }
    Ok(())
}

fn master_key_from_seed(seed: &[u8]) -> WalletResult<([u8; 32], [u8; 32])> {
    let mut i = hmac_sha512(MASTER_HMAC_KEY, seed)?;

    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&i[..32]);
    chain_code.copy_from_slice(&i[32..]);
    i.zeroize();

    Ok((key, chain_code))
}

fn derive_hardened_child(
    parent_key: &[u8; 32],
    parent_chain_code: &[u8; 32],
    index: u32,
) -> WalletResult<([u8; 32], [u8; 32])> {
    // 0x00 ‖ parent key ‖ ser32(index | 2^31)
    let mut data = [0u8; 37];
    data[1..33].copy_from_slice(parent_key);
    data[33..37].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

    let mut i = hmac_sha512(parent_chain_code, &data)?;
    data.zeroize();

    let mut child_key = [0u8; 32];
    let mut child_chain = [0u8; 32];
    child_key.copy_from_slice(&i[..32]);
    child_chain.copy_from_slice(&i[32..]);
    i.zeroize();

    Ok((child_key, child_chain))
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> WalletResult<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::CryptoError(format!("HMAC error: {}", e)))?;
    Mac::update(&mut mac, data);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; 64];
    output.copy_from_slice(&result);
    Ok(output)
}
