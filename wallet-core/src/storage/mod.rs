pub mod backend;
pub mod cipher;
pub mod paths;
pub mod records;

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use cipher::{EncryptedBlob, KdfParameters, VaultCipher};
pub use paths::WalletPaths;
pub use records::{encode_plain, PinnedKdf, SecureRecordStore};

/// Record keys owned by the vault.
pub mod keys {
    pub const WALLET: &str = "creata_wallet";
    pub const ACCOUNTS: &str = "creata_accounts";
    pub const CURRENT_ACCOUNT: &str = "creata_current_account";
    pub const ACTIVE_NETWORK: &str = "creata_active_network";
    pub const SESSION_TIMEOUT: &str = "creata_session_timeout";
    /// Argon2id parameters the wallet records were sealed with.
    pub const KDF: &str = "creata_kdf";
}
