use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::api::{Origin, RevealedPhrase, Request, Response};
use crate::config_store::{duration_from_minutes, Network};
use crate::crypto::DEFAULT_ENTROPY_BITS;
use crate::errors::{WalletError, WalletResult};
use crate::keyring::KeyringManager;
use crate::session::{LockReason, SessionManager};
use crate::storage::{keys, SecureRecordStore};
use crate::validation::InputValidator;

const LOCKED_MESSAGE: &str = "Wallet is locked";

/// Message handler of the background process.
///
/// Cheap to clone; every clone shares the same session and record store.
#[derive(Clone)]
pub struct BackgroundService {
    keyring: KeyringManager,
    records: SecureRecordStore,
    session: SessionManager,
    validator: Arc<InputValidator>,
    page_timeout: Duration,
    /// Serialises requests that read or replace the stored vault, so an
    /// unlock cannot finish over a vault a concurrent reset has deleted.
    vault_guard: Arc<Mutex<()>>,
}

impl BackgroundService {
    pub fn new(records: SecureRecordStore, session: SessionManager, page_timeout: Duration) -> Self {
        Self {
            keyring: KeyringManager::new(records.clone()),
            records,
            session,
            validator: Arc::new(InputValidator::default()),
            page_timeout,
            vault_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn keyring(&self) -> &KeyringManager {
        &self.keyring
    }

    pub async fn handle(&self, origin: Origin, request: Request) -> Response {
        // An overdue lock happens before this request counts as activity.
        self.session.check_timeout();
        if origin == Origin::Extension && request.counts_as_activity() {
            self.session.record_activity();
        }

        let kind = request.kind();
        tracing::debug!(?origin, kind, "handling request");

        match origin {
            Origin::Extension => self.dispatch(request).await,
            Origin::Page => {
                if !request.allowed_from_page() {
                    tracing::warn!(kind, "privileged request refused for page origin");
                    return Response::denied(format!("{kind} is not available to web pages"));
                }

                match tokio::time::timeout(self.page_timeout, self.dispatch(request)).await {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::warn!(kind, timeout = ?self.page_timeout, "page request timed out");
                        Response::denied(
                            WalletError::Timeout(format!("{kind} did not complete in time"))
                                .user_message(),
                        )
                    }
                }
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        let result = match request {
            Request::GetState => Ok(Response::State {
                success: true,
                state: self.session.snapshot(),
            }),
            Request::UnlockWallet { password } => self.unlock(SecretString::from(password)).await,
            Request::LockWallet => {
                self.session.lock(LockReason::UserRequested);
                Ok(Response::ok())
            }
            Request::SwitchNetwork { network } => self.switch_network(&network).await,
            Request::RequestAccounts => return self.request_accounts(),
            Request::CreateWallet {
                password,
                entropy_bits,
            } => {
                self.create_wallet(password, entropy_bits.unwrap_or(DEFAULT_ENTROPY_BITS))
                    .await
            }
            Request::ImportWallet { mnemonic, password } => {
                self.import_wallet(Zeroizing::new(mnemonic), password).await
            }
            Request::GetAccounts => self.get_accounts(),
            Request::SelectAccount { address, password } => {
                self.select_account(address, SecretString::from(password))
                    .await
            }
            Request::AddAccount { password } => {
                self.add_account(SecretString::from(password)).await
            }
            Request::ChangePassword {
                current_password,
                new_password,
            } => self.change_password(current_password, new_password).await,
            Request::RevealMnemonic { password } => {
                self.reveal_mnemonic(SecretString::from(password)).await
            }
            Request::SetSessionTimeout { minutes } => self.set_session_timeout(minutes).await,
            Request::ResetWallet { confirm } => self.reset_wallet(confirm).await,
        };

        result.unwrap_or_else(|err| {
            tracing::debug!(error = %err, "request failed");
            match err {
                // Only reachable through `prove_password`, which counted it.
                WalletError::AuthenticationFailed => Response::Failure {
                    success: false,
                    error: err.user_message(),
                    offer_reset: Some(self.session.offers_reset()),
                },
                err => Response::failure(&err),
            }
        })
    }

    /// Run a keyring operation that proves the password, under the unlock
    /// back-off. A wrong password counts as a failed attempt; a right one
    /// clears the count.
    async fn prove_password<F, T>(&self, operation: F) -> WalletResult<T>
    where
        F: FnOnce(&KeyringManager) -> WalletResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.session.ensure_unlock_allowed()?;

        let keyring = self.keyring.clone();
        match run_blocking(move || operation(&keyring)).await {
            Ok(value) => {
                self.session.reset_failed_attempts();
                Ok(value)
            }
            Err(WalletError::AuthenticationFailed) => {
                self.session.register_failed_attempt();
                Err(WalletError::AuthenticationFailed)
            }
            Err(err) => Err(err),
        }
    }

    async fn unlock(&self, password: SecretString) -> WalletResult<Response> {
        let _vault = self.vault_guard.lock().await;
        let (secret, current) = self
            .prove_password(move |keyring| {
                let secret = keyring.load(&password)?;
                let current = keyring.get_current_account(&password)?;
                Ok((secret, current))
            })
            .await?;
        self.session.unlock(secret, current)?;
        Ok(Response::ok())
    }

    async fn switch_network(&self, network: &str) -> WalletResult<Response> {
        let network: Network = network.parse()?;
        let records = self.records.clone();
        run_blocking(move || records.put_plain(keys::ACTIVE_NETWORK, &network)).await?;
        self.session.set_network(network);
        Ok(Response::ok())
    }

    fn request_accounts(&self) -> Response {
        match self.session.accounts() {
            Ok(accounts) => Response::Accounts {
                accounts: accounts.into_iter().map(|account| account.address).collect(),
            },
            Err(_) => Response::denied(LOCKED_MESSAGE),
        }
    }

    async fn create_wallet(&self, password: String, entropy_bits: usize) -> WalletResult<Response> {
        self.validator.validate_password(&password)?;
        self.validator.validate_entropy_bits(entropy_bits)?;
        let password = SecretString::from(password);

        let _vault = self.vault_guard.lock().await;
        let keyring = self.keyring.clone();
        let secret = run_blocking(move || {
            if keyring.exists() {
                return Err(WalletError::AlreadyExists("Wallet".to_string()));
            }
            let secret = KeyringManager::generate(entropy_bits)?;
            keyring.store(&secret, &password)?;
            Ok(secret)
        })
        .await?;

        let address = secret.first_account()?.address.clone();
        let mnemonic = RevealedPhrase::new(Zeroizing::new(secret.mnemonic().to_string()));
        self.session.unlock(secret, address.clone())?;
        tracing::info!("new wallet created");

        Ok(Response::Created {
            success: true,
            address,
            mnemonic,
        })
    }

    async fn import_wallet(
        &self,
        mnemonic: Zeroizing<String>,
        password: String,
    ) -> WalletResult<Response> {
        self.validator.validate_password(&password)?;
        let password = SecretString::from(password);

        let _vault = self.vault_guard.lock().await;
        let keyring = self.keyring.clone();
        let secret = run_blocking(move || {
            if keyring.exists() {
                return Err(WalletError::AlreadyExists("Wallet".to_string()));
            }
            let secret = KeyringManager::import_from_mnemonic(&mnemonic)?;
            keyring.store(&secret, &password)?;
            Ok(secret)
        })
        .await?;

        let address = secret.first_account()?.address.clone();
        self.session.unlock(secret, address.clone())?;
        tracing::info!("wallet imported from recovery phrase");

        Ok(Response::Imported {
            success: true,
            address,
        })
    }

    fn get_accounts(&self) -> WalletResult<Response> {
        let (accounts, current_address) = self
            .session
            .with_unlocked(|secret, current| Ok((secret.accounts().to_vec(), current.to_string())))?;
        Ok(Response::AccountList {
            success: true,
            accounts,
            current_address,
        })
    }

    async fn select_account(
        &self,
        address: String,
        password: SecretString,
    ) -> WalletResult<Response> {
        self.validator.validate_address(&address)?;
        self.ensure_unlocked()?;

        let _vault = self.vault_guard.lock().await;
        let selected = address.clone();
        self.prove_password(move |keyring| keyring.set_current_account(&selected, &password))
            .await?;
        self.session.select_account(&address)?;
        Ok(Response::ok())
    }

    async fn add_account(&self, password: SecretString) -> WalletResult<Response> {
        self.ensure_unlocked()?;

        let _vault = self.vault_guard.lock().await;
        let (account, secret) = self
            .prove_password(move |keyring| {
                let account = keyring.add_account(&password)?;
                let secret = keyring.load(&password)?;
                Ok((account, secret))
            })
            .await?;

        self.session.refresh_secret(secret)?;
        Ok(Response::AccountAdded {
            success: true,
            account,
        })
    }

    async fn change_password(
        &self,
        current_password: String,
        new_password: String,
    ) -> WalletResult<Response> {
        self.ensure_unlocked()?;
        self.validator.validate_password(&new_password)?;
        if current_password == new_password {
            return Err(WalletError::ValidationError(
                "New password must differ from the current one".to_string(),
            ));
        }
        let current = SecretString::from(current_password);
        let new = SecretString::from(new_password);

        let _vault = self.vault_guard.lock().await;
        self.prove_password(move |keyring| keyring.change_password(&current, &new))
            .await?;
        Ok(Response::ok())
    }

    async fn reveal_mnemonic(&self, password: SecretString) -> WalletResult<Response> {
        self.ensure_unlocked()?;

        let phrase = self
            .prove_password(move |keyring| keyring.reveal_mnemonic(&password))
            .await?;
        tracing::info!("recovery phrase revealed");
        Ok(Response::Mnemonic {
            success: true,
            mnemonic: RevealedPhrase::new(phrase),
        })
    }

    async fn set_session_timeout(&self, minutes: u32) -> WalletResult<Response> {
        self.validator.validate_session_timeout(minutes)?;
        let records = self.records.clone();
        run_blocking(move || records.put_plain(keys::SESSION_TIMEOUT, &minutes)).await?;
        self.session
            .set_inactivity_timeout(duration_from_minutes(minutes));
        tracing::info!(minutes, "session timeout updated");
        Ok(Response::ok())
    }

    async fn reset_wallet(&self, confirm: bool) -> WalletResult<Response> {
        if !confirm {
            return Err(WalletError::ValidationError(
                "Wallet reset must be confirmed".to_string(),
            ));
        }

        let _vault = self.vault_guard.lock().await;
        let keyring = self.keyring.clone();
        run_blocking(move || keyring.remove()).await?;
        self.session.lock(LockReason::VaultReset);
        self.session.reset_failed_attempts();
        tracing::warn!("wallet reset; recovery requires the mnemonic");
        Ok(Response::ok())
    }

    fn ensure_unlocked(&self) -> WalletResult<()> {
        if self.session.is_locked() {
            return Err(WalletError::PermissionDenied(LOCKED_MESSAGE.to_string()));
        }
        Ok(())
    }
}

/// Run KDF and storage work off the async worker threads.
async fn run_blocking<F, T>(operation: F) -> WalletResult<T>
where
    F: FnOnce() -> WalletResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| WalletError::StorageError(format!("Background task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DEFAULT_SESSION_TIMEOUT;
    use crate::storage::cipher::tests::test_cipher;
    use crate::storage::MemoryStore;
    use serde_json::json;

    const PASSWORD: &str = "p1-correct-horse";

    fn service() -> BackgroundService {
        service_with_backoff(Duration::ZERO)
    }

    fn service_with_backoff(base: Duration) -> BackgroundService {
        let records = SecureRecordStore::new(Arc::new(MemoryStore::new()), test_cipher());
        let session = SessionManager::with_backoff(
            DEFAULT_SESSION_TIMEOUT,
            Network::Mainnet,
            3,
            base,
            base,
        );
        BackgroundService::new(records, session, Duration::from_secs(45))
    }

    fn change_request(current: &str) -> Request {
        Request::ChangePassword {
            current_password: current.to_string(),
            new_password: "p2-battery-staple".to_string(),
        }
    }

    async fn create(service: &BackgroundService) -> String {
        let response = service
            .handle(
                Origin::Extension,
                Request::CreateWallet {
                    password: PASSWORD.to_string(),
                    entropy_bits: Some(128),
                },
            )
            .await;
        match response {
            Response::Created {
                address, mnemonic, ..
            } => {
                assert_eq!(mnemonic.expose().split(' ').count(), 12);
                address
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    fn unlock_request(password: &str) -> Request {
        Request::UnlockWallet {
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn create_unlocks_and_lock_relocks() {
        let service = service();
        let address = create(&service).await;
        assert!(!service.session().is_locked());

        let response = service.handle(Origin::Page, Request::RequestAccounts).await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "accounts": [address] })
        );

        let response = service.handle(Origin::Extension, Request::LockWallet).await;
        assert!(response.is_success());

        let response = service.handle(Origin::Page, Request::RequestAccounts).await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "error": "Wallet is locked" })
        );
    }

    #[tokio::test]
    async fn unlock_with_wrong_password_offers_reset_after_threshold() {
        let service = service();
        create(&service).await;
        service.handle(Origin::Extension, Request::LockWallet).await;

        let mut last = None;
        for _ in 0..3 {
            last = Some(
                service
                    .handle(Origin::Extension, unlock_request("wrong-password"))
                    .await,
            );
        }
        let value = serde_json::to_value(last.unwrap()).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("Invalid password or corrupted vault data"));
        assert_eq!(value["offerReset"], json!(true));

        let response = service.handle(Origin::Extension, unlock_request(PASSWORD)).await;
        assert!(response.is_success());
        assert!(!service.session().is_locked());
    }

    #[tokio::test]
    async fn unlock_without_wallet_reports_missing_vault() {
        let service = service();
        let response = service.handle(Origin::Extension, unlock_request(PASSWORD)).await;
        assert_eq!(response.error_message(), Some("No wallet has been set up yet"));
        assert_eq!(service.session().failed_attempts(), 0);
    }

    #[tokio::test]
    async fn page_cannot_issue_privileged_requests() {
        let service = service();
        create(&service).await;

        let response = service
            .handle(
                Origin::Page,
                Request::RevealMnemonic {
                    password: PASSWORD.to_string(),
                },
            )
            .await;
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("mnemonic").is_none());
        assert!(value["error"].as_str().unwrap().contains("REVEAL_MNEMONIC"));

        let response = service.handle(Origin::Page, Request::LockWallet).await;
        assert!(!response.is_success());
        assert!(!service.session().is_locked());
    }

    #[tokio::test]
    async fn switch_network_validates_and_persists() {
        let service = service();
        let mut events = service.session().subscribe();

        let response = service
            .handle(
                Origin::Extension,
                Request::SwitchNetwork {
                    network: "devnet".to_string(),
                },
            )
            .await;
        assert!(!response.is_success());
        assert_eq!(service.session().network(), Network::Mainnet);

        let response = service
            .handle(
                Origin::Extension,
                Request::SwitchNetwork {
                    network: "testnet".to_string(),
                },
            )
            .await;
        assert!(response.is_success());
        assert_eq!(service.session().network(), Network::Testnet);
        assert_eq!(
            service.records.get_plain::<Network>(keys::ACTIVE_NETWORK).unwrap(),
            Some(Network::Testnet)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            crate::session::SessionEvent::NetworkChanged(Network::Testnet)
        );
    }

    #[tokio::test]
    async fn get_state_reports_snapshot() {
        let service = service();
        let response = service.handle(Origin::Page, Request::GetState).await;
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["state"]["isUnlocked"], json!(false));
        assert_eq!(value["state"]["network"], json!("mainnet"));
    }

    #[tokio::test]
    async fn add_and_select_accounts() {
        let service = service();
        let first = create(&service).await;

        let response = service
            .handle(
                Origin::Extension,
                Request::AddAccount {
                    password: PASSWORD.to_string(),
                },
            )
            .await;
        let second = match response {
            Response::AccountAdded { account, .. } => {
                assert_eq!(account.index, 1);
                account.address
            }
            other => panic!("unexpected response {other:?}"),
        };
        assert_ne!(first, second);

        let response = service
            .handle(
                Origin::Extension,
                Request::SelectAccount {
                    address: second.clone(),
                    password: PASSWORD.to_string(),
                },
            )
            .await;
        assert!(response.is_success());

        match service.handle(Origin::Extension, Request::GetAccounts).await {
            Response::AccountList {
                accounts,
                current_address,
                ..
            } => {
                assert_eq!(accounts.len(), 2);
                assert_eq!(current_address, second);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_create_is_rejected() {
        let service = service();
        create(&service).await;
        let response = service
            .handle(
                Origin::Extension,
                Request::CreateWallet {
                    password: PASSWORD.to_string(),
                    entropy_bits: None,
                },
            )
            .await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn weak_password_is_rejected_before_any_work() {
        let service = service();
        let response = service
            .handle(
                Origin::Extension,
                Request::CreateWallet {
                    password: "short".to_string(),
                    entropy_bits: None,
                },
            )
            .await;
        assert!(!response.is_success());
        assert!(!service.keyring().exists());
    }

    #[tokio::test]
    async fn change_password_then_unlock_with_new_one() {
        let service = service();
        create(&service).await;

        let response = service
            .handle(
                Origin::Extension,
                Request::ChangePassword {
                    current_password: PASSWORD.to_string(),
                    new_password: "p2-battery-staple".to_string(),
                },
            )
            .await;
        assert!(response.is_success());
        service.handle(Origin::Extension, Request::LockWallet).await;

        let response = service.handle(Origin::Extension, unlock_request(PASSWORD)).await;
        assert!(!response.is_success());
        let response = service
            .handle(Origin::Extension, unlock_request("p2-battery-staple"))
            .await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn reveal_requires_unlocked_session() {
        let service = service();
        create(&service).await;

        let reveal = || Request::RevealMnemonic {
            password: PASSWORD.to_string(),
        };
        let response = service.handle(Origin::Extension, reveal()).await;
        assert!(matches!(response, Response::Mnemonic { .. }));

        service.handle(Origin::Extension, Request::LockWallet).await;
        let response = service.handle(Origin::Extension, reveal()).await;
        assert_eq!(response.error_message(), Some("Wallet is locked"));
    }

    #[tokio::test]
    async fn session_timeout_is_validated_and_applied() {
        let service = service();
        let response = service
            .handle(Origin::Extension, Request::SetSessionTimeout { minutes: 0 })
            .await;
        assert!(!response.is_success());

        let response = service
            .handle(Origin::Extension, Request::SetSessionTimeout { minutes: 5 })
            .await;
        assert!(response.is_success());
        assert_eq!(
            service.session().inactivity_timeout(),
            Duration::from_secs(300)
        );
        assert_eq!(
            service.records.get_plain::<u32>(keys::SESSION_TIMEOUT).unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn reset_requires_confirmation_and_locks() {
        let service = service();
        create(&service).await;

        let response = service
            .handle(Origin::Extension, Request::ResetWallet { confirm: false })
            .await;
        assert!(!response.is_success());
        assert!(service.keyring().exists());

        let response = service
            .handle(Origin::Extension, Request::ResetWallet { confirm: true })
            .await;
        assert!(response.is_success());
        assert!(service.session().is_locked());
        assert!(!service.keyring().exists());
    }

    #[tokio::test]
    async fn import_restores_known_address() {
        let service = service();
        let response = service
            .handle(
                Origin::Extension,
                Request::ImportWallet {
                    mnemonic: "  Abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon ABOUT ".to_string(),
                    password: PASSWORD.to_string(),
                },
            )
            .await;
        let address = match response {
            Response::Imported { address, .. } => address,
            other => panic!("unexpected response {other:?}"),
        };
        assert!(address.starts_with("creata1"));

        let response = service
            .handle(
                Origin::Extension,
                Request::ImportWallet {
                    mnemonic: "abandon abandon abandon".to_string(),
                    password: PASSWORD.to_string(),
                },
            )
            .await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn wrong_change_password_guesses_count_as_failures() {
        let service = service();
        create(&service).await;

        let mut last = None;
        for _ in 0..3 {
            last = Some(
                service
                    .handle(Origin::Extension, change_request("wrong-password"))
                    .await,
            );
        }
        assert_eq!(service.session().failed_attempts(), 3);
        let value = serde_json::to_value(last.unwrap()).unwrap();
        assert_eq!(value["error"], json!("Invalid password or corrupted vault data"));
        assert_eq!(value["offerReset"], json!(true));

        let response = service.handle(Origin::Extension, change_request(PASSWORD)).await;
        assert!(response.is_success());
        assert_eq!(service.session().failed_attempts(), 0);
    }

    #[tokio::test]
    async fn backoff_blocks_every_password_request() {
        let service = service_with_backoff(Duration::from_secs(60));
        create(&service).await;

        let reveal = |password: &str| Request::RevealMnemonic {
            password: password.to_string(),
        };
        let response = service.handle(Origin::Extension, reveal("wrong-password")).await;
        assert!(!response.is_success());
        assert_eq!(service.session().failed_attempts(), 1);

        let response = service.handle(Origin::Extension, reveal(PASSWORD)).await;
        assert!(!matches!(response, Response::Mnemonic { .. }));
        assert!(response
            .error_message()
            .unwrap()
            .contains("temporarily disabled"));

        let response = service.handle(Origin::Extension, change_request(PASSWORD)).await;
        assert!(!response.is_success());
        assert!(service.keyring().load(&SecretString::from(PASSWORD.to_string())).is_ok());
    }

    #[tokio::test]
    async fn password_requests_need_an_unlocked_session() {
        let service = service();
        let address = create(&service).await;
        service.handle(Origin::Extension, Request::LockWallet).await;

        let select = Request::SelectAccount {
            address,
            password: PASSWORD.to_string(),
        };
        for request in [select, change_request(PASSWORD)] {
            let response = service.handle(Origin::Extension, request).await;
            assert_eq!(response.error_message(), Some("Wallet is locked"));
        }
        assert_eq!(service.session().failed_attempts(), 0);
        assert!(service.keyring().load(&SecretString::from(PASSWORD.to_string())).is_ok());
    }

    #[tokio::test]
    async fn page_polling_does_not_extend_the_session() {
        let service = service();
        create(&service).await;

        let earlier = chrono::Utc::now() - chrono::Duration::minutes(10);
        service.session().record_activity_at(earlier);

        service.handle(Origin::Page, Request::GetState).await;
        service.handle(Origin::Page, Request::RequestAccounts).await;
        service.handle(Origin::Extension, Request::GetState).await;
        assert_eq!(service.session().snapshot().last_activity_at, earlier);

        service.handle(Origin::Extension, Request::GetAccounts).await;
        assert!(service.session().snapshot().last_activity_at > earlier);
    }

    #[tokio::test]
    async fn unlock_racing_reset_leaves_the_session_locked() {
        let service = service();
        create(&service).await;
        service.handle(Origin::Extension, Request::LockWallet).await;

        let (unlocked, reset) = tokio::join!(
            service.handle(Origin::Extension, unlock_request(PASSWORD)),
            service.handle(Origin::Extension, Request::ResetWallet { confirm: true }),
        );

        assert!(reset.is_success());
        assert!(!service.keyring().exists());
        assert!(service.session().is_locked());
        if !unlocked.is_success() {
            assert_eq!(unlocked.error_message(), Some("No wallet has been set up yet"));
        }
    }
}
