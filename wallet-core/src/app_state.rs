use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config_store::{duration_from_minutes, ConfigStore, Network, WalletConfig};
use crate::errors::WalletResult;
use crate::service::BackgroundService;
use crate::session::SessionManager;
use crate::storage::{keys, FileStore, KeyValueStore, SecureRecordStore, VaultCipher, WalletPaths};
use crate::validation::InputValidator;

/// Environment variable naming the deployment profile stored in the config.
pub const WALLET_ENV_VAR: &str = "CREATA_WALLET_ENV";

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(32);

/// Everything the background process owns, wired together.
pub struct WalletContext {
    paths: Option<WalletPaths>,
    config: WalletConfig,
    service: BackgroundService,
}

impl WalletContext {
    /// File-backed context rooted at `root_dir`.
    pub fn initialize(root_dir: PathBuf) -> WalletResult<Self> {
        let environment =
            std::env::var(WALLET_ENV_VAR).unwrap_or_else(|_| "development".to_string());
        let paths = WalletPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let config_store = ConfigStore::from_paths(&paths);
        let config = config_store.load_or_default(environment)?;
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(paths.store_file()));

        let mut context = Self::with_backend(backend, config)?;
        context.paths = Some(paths);
        Ok(context)
    }

    /// Context over any backend; nothing touches the filesystem.
    pub fn with_backend(backend: Arc<dyn KeyValueStore>, config: WalletConfig) -> WalletResult<Self> {
        config.validate()?;
        let records = SecureRecordStore::new(backend, VaultCipher::new(config.kdf));

        let network = restore_network(&records, config.default_network);
        let timeout = restore_session_timeout(&records, config.session.auto_lock());
        let session = SessionManager::with_backoff(
            timeout,
            network,
            config.session.reset_prompt_after_failures,
            BACKOFF_BASE,
            BACKOFF_CAP,
        );
        let service =
            BackgroundService::new(records, session, config.session.page_request_timeout());

        tracing::info!(
            environment = %config.environment,
            %network,
            timeout_secs = timeout.as_secs(),
            "wallet context ready"
        );
        Ok(Self {
            paths: None,
            config,
            service,
        })
    }

    pub fn service(&self) -> &BackgroundService {
        &self.service
    }

    pub fn session(&self) -> &SessionManager {
        self.service.session()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn paths(&self) -> Option<&WalletPaths> {
        self.paths.as_ref()
    }

    /// Start the periodic inactivity check. Must run inside a tokio runtime.
    pub fn start_auto_lock(&self) -> JoinHandle<()> {
        self.session()
            .spawn_auto_lock(self.config.session.check_interval())
    }
}

fn restore_network(records: &SecureRecordStore, fallback: Network) -> Network {
    match records.get_plain::<Network>(keys::ACTIVE_NETWORK) {
        Ok(Some(network)) => network,
        Ok(None) => fallback,
        Err(err) => {
            tracing::warn!(error = %err, "stored network preference unreadable");
            fallback
        }
    }
}

fn restore_session_timeout(records: &SecureRecordStore, fallback: Duration) -> Duration {
    match records.get_plain::<u32>(keys::SESSION_TIMEOUT) {
        Ok(Some(minutes)) => match InputValidator::default().validate_session_timeout(minutes) {
            Ok(()) => duration_from_minutes(minutes),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring stored session timeout");
                fallback
            }
        },
        Ok(None) => fallback,
        Err(err) => {
            tracing::warn!(error = %err, "stored session timeout unreadable");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cipher::tests::test_cipher;
    use crate::storage::MemoryStore;

    fn cheap_config() -> WalletConfig {
        let mut config = WalletConfig::new("test");
        config.session.auto_lock_minutes = 15;
        config
    }

    #[test]
    fn defaults_come_from_config() {
        let context =
            WalletContext::with_backend(Arc::new(MemoryStore::new()), cheap_config()).unwrap();
        assert!(context.session().is_locked());
        assert_eq!(context.session().network(), Network::Mainnet);
        assert_eq!(
            context.session().inactivity_timeout(),
            Duration::from_secs(15 * 60)
        );
        assert!(context.paths().is_none());
    }

    #[test]
    fn stored_preferences_override_config() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let records = SecureRecordStore::new(backend.clone(), test_cipher());
        records.put_plain(keys::ACTIVE_NETWORK, &Network::Testnet).unwrap();
        records.put_plain(keys::SESSION_TIMEOUT, &5u32).unwrap();

        let context = WalletContext::with_backend(backend, cheap_config()).unwrap();
        assert_eq!(context.session().network(), Network::Testnet);
        assert_eq!(
            context.session().inactivity_timeout(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn out_of_range_stored_timeout_is_ignored() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        backend.set(keys::SESSION_TIMEOUT, "0").unwrap();
        backend.set(keys::ACTIVE_NETWORK, "\"devnet\"").unwrap();

        let context = WalletContext::with_backend(backend, cheap_config()).unwrap();
        assert_eq!(
            context.session().inactivity_timeout(),
            Duration::from_secs(15 * 60)
        );
        assert_eq!(context.session().network(), Network::Mainnet);
    }

    #[test]
    fn initialize_creates_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("wallet");
        let context = WalletContext::initialize(root.clone()).unwrap();

        let paths = context.paths().unwrap();
        assert_eq!(paths.root_dir(), root.as_path());
        assert!(paths.config_file().exists());
        assert!(context.session().is_locked());
    }
}
