use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::errors::{WalletError, WalletResult};

/// Environment variable that overrides the wallet data directory.
pub const WALLET_HOME_ENV: &str = "CREATA_WALLET_HOME";

/// Filesystem layout of the background process.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data.
    root_dir: PathBuf,
    /// Key-value file holding every vault record.
    store_file: PathBuf,
    /// Path to persisted wallet configuration.
    config_file: PathBuf,
}

impl WalletPaths {
    pub const STORE_FILENAME: &'static str = "vault-store.json";
    pub const CONFIG_FILENAME: &'static str = "wallet.config";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            store_file: root_dir.join(Self::STORE_FILENAME),
            config_file: root_dir.join(Self::CONFIG_FILENAME),
            root_dir,
        })
    }

    /// Resolve the root from `CREATA_WALLET_HOME`, falling back to the
    /// platform data directory.
    pub fn from_env() -> WalletResult<Self> {
        if let Ok(home) = std::env::var(WALLET_HOME_ENV) {
            if !home.trim().is_empty() {
                return Self::new(home.trim());
            }
        }

        let dirs = ProjectDirs::from("network", "Creata", "creata-wallet").ok_or_else(|| {
            WalletError::StorageError("Unable to determine a home directory".to_string())
        })?;
        Self::new(dirs.data_dir())
    }

    /// Ensure the root directory exists.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        Ok(())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn store_file(&self) -> &Path {
        &self.store_file
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}
