//! Encrypted key vault and session core of the Creata browser-extension wallet.

pub mod api;
pub mod app_state;
pub mod config_store;
pub mod crypto;
pub mod errors;
pub mod host;
pub mod keyring;
pub mod service;
pub mod session;
pub mod storage;
pub mod validation;

// Re-export common types
pub use api::{Envelope, Origin, Request, Response};
pub use app_state::WalletContext;
pub use config_store::{ConfigStore, Network, NetworkConfig, SessionConfig, WalletConfig};
pub use errors::{WalletError, WalletResult};
pub use keyring::{AccountInfo, KeyringManager, WalletSecret};
pub use service::BackgroundService;
pub use session::{LockReason, SessionEvent, SessionManager, SessionSnapshot};
pub use storage::{
    EncryptedBlob, FileStore, KdfParameters, KeyValueStore, MemoryStore, SecureRecordStore,
    VaultCipher, WalletPaths,
};
pub use validation::InputValidator;
