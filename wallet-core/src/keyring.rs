use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{
    generate_mnemonic, normalize_mnemonic, validate_address, validate_mnemonic, AccountKeyPair,
    SIGNATURE_ALGORITHM,
};
use crate::errors::{WalletError, WalletResult};
use crate::storage::{encode_plain, keys, PinnedKdf, SecureRecordStore, VaultCipher};

const WALLET_FORMAT_VERSION: u16 = 1;

/// Public, non-secret view of one derived account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub algo: String,
    pub pubkey_hex: String,
    /// Last component of the hardened derivation path.
    #[serde(default)]
    pub index: u32,
}

impl AccountInfo {
    fn from_keypair(keypair: &AccountKeyPair) -> WalletResult<Self> {
        Ok(Self {
            address: keypair.address()?,
            algo: SIGNATURE_ALGORITHM.to_string(),
            pubkey_hex: keypair.public_key_hex(),
            index: keypair.index(),
        })
    }
}

/// Recovery phrase plus the accounts derived from it.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletSecret {
    mnemonic: String,
    #[zeroize(skip)]
    accounts: Vec<AccountInfo>,
    #[zeroize(skip)]
    created_at: DateTime<Utc>,
}

impl WalletSecret {
    /// Build from a normalized phrase and derive the first account.
    fn from_phrase(phrase: &str) -> WalletResult<Self> {
        let mnemonic = validate_mnemonic(phrase)?;
        let first = AccountKeyPair::derive(&mnemonic, 0)?;
        Ok(Self {
            mnemonic: phrase.to_string(),
            accounts: vec![AccountInfo::from_keypair(&first)?],
            created_at: Utc::now(),
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn word_count(&self) -> usize {
        self.mnemonic.split_whitespace().count()
    }

    pub fn accounts(&self) -> &[AccountInfo] {
        &self.accounts
    }

    pub fn first_account(&self) -> WalletResult<&AccountInfo> {
        self.accounts
            .first()
            .ok_or_else(|| WalletError::NotFound("Wallet has no accounts".to_string()))
    }

    pub fn account(&self, address: &str) -> Option<&AccountInfo> {
        self.accounts.iter().find(|account| account.address == address)
    }

    /// Signing key for one of this wallet's accounts.
    pub fn keypair_for(&self, address: &str) -> WalletResult<AccountKeyPair> {
        let account = self
            .account(address)
            .ok_or_else(|| WalletError::NotFound(format!("Account {address}")))?;
        let mnemonic = validate_mnemonic(&self.mnemonic)?;
        AccountKeyPair::derive(&mnemonic, account.index)
    }

    /// Derive and append the account after the highest existing index.
    fn derive_next_account(&mut self) -> WalletResult<AccountInfo> {
        let next_index = self
            .accounts
            .iter()
            .map(|account| account.index)
            .max()
            .map_or(0, |index| index + 1);
        let mnemonic = validate_mnemonic(&self.mnemonic)?;
        let account = AccountInfo::from_keypair(&AccountKeyPair::derive(&mnemonic, next_index)?)?;
        self.accounts.push(account.clone());
        Ok(account)
    }
}

impl std::fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSecret")
            .field("mnemonic", &"<redacted>")
            .field("accounts", &self.accounts)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct WalletEnvelope {
    version: u16,
    secret: WalletSecret,
}

/// Owns wallet creation, persistence and account selection.
#[derive(Debug, Clone)]
pub struct KeyringManager {
    records: SecureRecordStore,
}

impl KeyringManager {
    pub fn new(records: SecureRecordStore) -> Self {
        Self { records }
    }

    /// Fresh wallet; 256 bits of entropy gives a 24-word phrase.
    pub fn generate(entropy_bits: usize) -> WalletResult<WalletSecret> {
        let phrase = generate_mnemonic(entropy_bits)?;
        WalletSecret::from_phrase(&phrase)
    }

    pub fn import_from_mnemonic(phrase: &str) -> WalletResult<WalletSecret> {
        let normalized = Zeroizing::new(normalize_mnemonic(phrase));
        WalletSecret::from_phrase(&normalized)
    }

    /// Persist the wallet, its public account list, and a pointer to the
    /// first account, all sealed under `password` with the configured KDF.
    pub fn store(&self, secret: &WalletSecret, password: &SecretString) -> WalletResult<()> {
        let first = secret.first_account()?.address.clone();
        self.reseal_all(*self.records.cipher(), secret, secret.accounts(), &first, password)?;
        tracing::info!(accounts = secret.accounts().len(), "wallet stored");
        Ok(())
    }

    pub fn load(&self, password: &SecretString) -> WalletResult<WalletSecret> {
        let envelope: WalletEnvelope = self
            .records
            .get_secure(keys::WALLET, password)?
            .ok_or(WalletError::VaultUnavailable)?;

        if envelope.version != WALLET_FORMAT_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported wallet format version: {}",
                envelope.version
            )));
        }
        Ok(envelope.secret)
    }

    pub fn get_accounts(&self, password: &SecretString) -> WalletResult<Vec<AccountInfo>> {
        self.records
            .get_secure(keys::ACCOUNTS, password)?
            .ok_or(WalletError::VaultUnavailable)
    }

    /// Address of the selected account, or the first account when no
    /// selection has been stored.
    pub fn get_current_account(&self, password: &SecretString) -> WalletResult<String> {
        if let Some(address) = self
            .records
            .get_secure::<String>(keys::CURRENT_ACCOUNT, password)?
        {
            return Ok(address);
        }

        self.get_accounts(password)?
            .into_iter()
            .next()
            .map(|account| account.address)
            .ok_or_else(|| WalletError::NotFound("Wallet has no accounts".to_string()))
    }

    pub fn set_current_account(&self, address: &str, password: &SecretString) -> WalletResult<()> {
        validate_address(address)?;
        let accounts = self.get_accounts(password)?;
        if !accounts.iter().any(|account| account.address == address) {
            return Err(WalletError::NotFound(format!("Account {address}")));
        }
        self.records
            .put_secure(keys::CURRENT_ACCOUNT, address, password)
    }

    /// Derive the next account and persist it alongside the existing ones.
    pub fn add_account(&self, password: &SecretString) -> WalletResult<AccountInfo> {
        let mut secret = self.load(password)?;
        let account = secret.derive_next_account()?;

        let cipher = self.records.vault_cipher()?;
        let entries = [
            (keys::WALLET, self.seal_wallet(&cipher, &secret, password)?),
            (
                keys::ACCOUNTS,
                self.records.seal(&cipher, secret.accounts(), password)?,
            ),
        ];
        self.records.write_batch(&entries)?;
        tracing::info!(index = account.index, "derived additional account");
        Ok(account)
    }

    /// Re-seal every wallet record under a new password. Either all records
    /// move to the new password or none do. The configured KDF parameters
    /// are pinned in the same write.
    pub fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<()> {
        let secret = self.load(current_password)?;
        let accounts = self.get_accounts(current_password)?;
        let current = self.get_current_account(current_password)?;

        self.reseal_all(*self.records.cipher(), &secret, &accounts, &current, new_password)?;
        tracing::info!("vault password changed");
        Ok(())
    }

    pub fn reveal_mnemonic(&self, password: &SecretString) -> WalletResult<Zeroizing<String>> {
        let secret = self.load(password)?;
        Ok(Zeroizing::new(secret.mnemonic().to_string()))
    }

    /// Delete every wallet record. Irreversible without the recovery phrase.
    pub fn remove(&self) -> WalletResult<()> {
        self.records.remove(keys::WALLET)?;
        self.records.remove(keys::ACCOUNTS)?;
        self.records.remove(keys::CURRENT_ACCOUNT)?;
        self.records.remove(keys::KDF)?;
        tracing::info!("wallet records removed");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        match self.records.contains(keys::WALLET) {
            Ok(present) => present,
            Err(err) => {
                tracing::warn!(error = %err, "wallet presence check failed");
                false
            }
        }
    }

    fn seal_wallet(
        &self,
        cipher: &VaultCipher,
        secret: &WalletSecret,
        password: &SecretString,
    ) -> WalletResult<String> {
        let envelope = WalletEnvelope {
            version: WALLET_FORMAT_VERSION,
            secret: secret.clone(),
        };
        self.records.seal(cipher, &envelope, password)
    }

    /// Seal every record first, then write them with the KDF pin in one batch.
    fn reseal_all(
        &self,
        cipher: VaultCipher,
        secret: &WalletSecret,
        accounts: &[AccountInfo],
        current: &str,
        password: &SecretString,
    ) -> WalletResult<()> {
        let entries = [
            (keys::KDF, encode_plain(&PinnedKdf::new(*cipher.params())?)?),
            (keys::WALLET, self.seal_wallet(&cipher, secret, password)?),
            (keys::ACCOUNTS, self.records.seal(&cipher, accounts, password)?),
            (keys::CURRENT_ACCOUNT, self.records.seal(&cipher, current, password)?),
        ];
        self.records.write_batch(&entries)
    }
}
