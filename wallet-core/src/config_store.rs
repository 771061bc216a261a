use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::storage::{KdfParameters, WalletPaths};

const CONFIG_VERSION: u16 = 1;

/// Chain the wallet talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(WalletError::ValidationError(format!(
                "Unknown network '{other}': expected mainnet or testnet"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: String,
    pub rest_endpoint: String,
    pub rpc_endpoint: String,
}

/// Endpoints handed to the chain client; the vault itself never dials them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkTable {
    pub mainnet: NetworkConfig,
    pub testnet: NetworkConfig,
}

impl NetworkTable {
    pub fn get(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        }
    }
}

impl Default for NetworkTable {
    fn default() -> Self {
        Self {
            mainnet: NetworkConfig {
                chain_id: "creata-1".to_string(),
                rest_endpoint: "https://rest.creata.network".to_string(),
                rpc_endpoint: "https://rpc.creata.network".to_string(),
            },
            testnet: NetworkConfig {
                chain_id: "creata-testnet-1".to_string(),
                rest_endpoint: "https://rest.testnet.creata.network".to_string(),
                rpc_endpoint: "https://rpc.testnet.creata.network".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub auto_lock_minutes: u32,
    pub check_interval_secs: u64,
    pub reset_prompt_after_failures: u32,
    pub page_request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 30,
            check_interval_secs: 60,
            reset_prompt_after_failures: 3,
            page_request_timeout_secs: 45,
        }
    }
}

impl SessionConfig {
    pub fn auto_lock(&self) -> Duration {
        duration_from_minutes(self.auto_lock_minutes)
    }

    /// Auto-lock check period, never longer than a minute.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.clamp(1, 60))
    }

    /// How long an untrusted page may wait on the vault, 30-60 s.
    pub fn page_request_timeout(&self) -> Duration {
        Duration::from_secs(self.page_request_timeout_secs.clamp(30, 60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub networks: NetworkTable,
    pub default_network: Network,
    pub session: SessionConfig,
    pub kdf: KdfParameters,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            networks: NetworkTable::default(),
            default_network: Network::Mainnet,
            session: SessionConfig::default(),
            kdf: KdfParameters::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub fn validate(&self) -> WalletResult<()> {
        self.kdf.validate()?;
        if self.session.auto_lock_minutes == 0 {
            return Err(WalletError::ValidationError(
                "Auto-lock must be at least one minute".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
    modified_at_unix: i64,
}

/// Handles persistence of wallet configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        let checksum = checksum(&envelope.payload)?;
        if checksum != envelope.checksum {
            return Err(WalletError::ValidationError(
                "Config integrity verification failed".to_string(),
            ));
        }

        envelope.payload.validate()?;
        Ok(envelope.payload)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}

pub fn duration_from_minutes(minutes: u32) -> Duration {
    let clamped = minutes.max(1) as u64;
    Duration::from_secs(clamped.saturating_mul(60))
}
