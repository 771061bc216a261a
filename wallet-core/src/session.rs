use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config_store::Network;
use crate::errors::{WalletError, WalletResult};
use crate::keyring::{AccountInfo, WalletSecret};

/// Default inactivity window before an unlocked wallet locks itself.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Upper bound on the auto-lock check period.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Consecutive failed unlocks after which the UI offers a wallet reset.
pub const DEFAULT_RESET_PROMPT_AFTER: u32 = 3;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    UserRequested,
    InactivityTimeout,
    VaultReset,
}

/// Broadcast to every subscriber on a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Unlocked,
    Locked(LockReason),
    NetworkChanged(Network),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_unlocked: bool,
    pub network: Network,
    pub last_activity_at: DateTime<Utc>,
}

/// Outcome of a rejected unlock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnlock {
    pub consecutive_failures: u32,
    /// The UI should surface the reset-wallet affordance.
    pub offer_reset: bool,
    pub retry_after: Duration,
}

#[derive(Debug)]
struct UnlockedSession {
    secret: WalletSecret,
    current_address: String,
}

#[derive(Debug)]
struct SessionState {
    unlocked: Option<UnlockedSession>,
    network: Network,
    inactivity_timeout: Duration,
    last_activity_at: DateTime<Utc>,
    failed_attempts: u32,
    next_allowed_attempt: Option<Instant>,
    backoff_exponent: u32,
}

impl SessionState {
    fn new(inactivity_timeout: Duration, network: Network) -> Self {
        Self {
            unlocked: None,
            network,
            inactivity_timeout,
            last_activity_at: Utc::now(),
            failed_attempts: 0,
            next_allowed_attempt: None,
            backoff_exponent: 0,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // Clock going backwards counts as no time elapsed.
        let elapsed = (now - self.last_activity_at).to_std().unwrap_or(Duration::ZERO);
        elapsed > self.inactivity_timeout
    }
}

/// Locked/unlocked state of the background process.
///
/// Starts locked. Decrypted wallet material lives here only while unlocked
/// and is dropped (and zeroized) on every transition to locked.
#[derive(Debug, Clone)]
pub struct SessionManager {
    state: Arc<RwLock<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    reset_prompt_after: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_backoff_exponent: u32,
}

impl SessionManager {
    pub fn new(inactivity_timeout: Duration, network: Network) -> Self {
        Self::with_backoff(
            inactivity_timeout,
            network,
            DEFAULT_RESET_PROMPT_AFTER,
            Duration::from_secs(1),
            Duration::from_secs(32),
        )
    }

    pub fn with_backoff(
        inactivity_timeout: Duration,
        network: Network,
        reset_prompt_after: u32,
        backoff_base: Duration,
        backoff_cap: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(SessionState::new(inactivity_timeout, network))),
            events,
            reset_prompt_after: reset_prompt_after.max(1),
            backoff_base,
            backoff_cap,
            max_backoff_exponent: 8,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT, Network::default())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_locked(&self) -> bool {
        self.state.read().unlocked.is_none()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            is_unlocked: state.unlocked.is_some(),
            network: state.network,
            last_activity_at: state.last_activity_at,
        }
    }

    pub fn network(&self) -> Network {
        self.state.read().network
    }

    pub fn set_network(&self, network: Network) {
        let changed = {
            let mut state = self.state.write();
            let changed = state.network != network;
            state.network = network;
            changed
        };
        if changed {
            tracing::info!(%network, "active network switched");
            self.emit(SessionEvent::NetworkChanged(network));
        }
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.state.read().inactivity_timeout
    }

    pub fn set_inactivity_timeout(&self, timeout: Duration) {
        self.state.write().inactivity_timeout = timeout;
    }

    /// Enter the unlocked state with material the caller already decrypted.
    ///
    /// No password check happens here; a successful vault load is the proof.
    pub fn unlock(&self, secret: WalletSecret, current_address: String) -> WalletResult<()> {
        if secret.account(&current_address).is_none() {
            return Err(WalletError::NotFound(format!("Account {current_address}")));
        }

        {
            let mut state = self.state.write();
            state.unlocked = Some(UnlockedSession {
                secret,
                current_address,
            });
            state.last_activity_at = Utc::now();
            state.failed_attempts = 0;
            state.next_allowed_attempt = None;
            state.backoff_exponent = 0;
        }
        tracing::info!("wallet session unlocked");
        self.emit(SessionEvent::Unlocked);
        Ok(())
    }

    /// Drop unlocked material. Returns whether the state changed.
    pub fn lock(&self, reason: LockReason) -> bool {
        let was_unlocked = {
            let mut state = self.state.write();
            state.unlocked.take().is_some()
        };
        if was_unlocked {
            tracing::info!(?reason, "wallet session locked");
            self.emit(SessionEvent::Locked(reason));
        }
        was_unlocked
    }

    pub fn record_activity(&self) {
        self.record_activity_at(Utc::now());
    }

    pub fn record_activity_at(&self, at: DateTime<Utc>) {
        self.state.write().last_activity_at = at;
    }

    /// Lock if the inactivity window has elapsed. Returns whether it locked.
    pub fn check_timeout(&self) -> bool {
        self.check_timeout_at(Utc::now())
    }

    pub fn check_timeout_at(&self, now: DateTime<Utc>) -> bool {
        let expired = {
            let state = self.state.read();
            state.unlocked.is_some() && state.is_expired_at(now)
        };
        expired && self.lock(LockReason::InactivityTimeout)
    }

    /// Run [`Self::check_timeout`] periodically on the tokio runtime.
    pub fn spawn_auto_lock(&self, interval: Duration) -> JoinHandle<()> {
        let period = interval.clamp(Duration::from_millis(10), MAX_CHECK_INTERVAL);
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                session.check_timeout();
            }
        })
    }

    /// Fail fast while the back-off from earlier failures is still running.
    pub fn ensure_unlock_allowed(&self) -> WalletResult<()> {
        let state = self.state.read();
        if let Some(until) = state.next_allowed_attempt {
            let now = Instant::now();
            if now < until {
                let remaining = until.saturating_duration_since(now);
                return Err(WalletError::PermissionDenied(format!(
                    "Unlock temporarily disabled. Retry in {}.{:03} seconds",
                    remaining.as_secs(),
                    remaining.subsec_millis()
                )));
            }
        }
        Ok(())
    }

    /// Count a wrong password and arm the exponential back-off.
    pub fn register_failed_attempt(&self) -> FailedUnlock {
        let mut state = self.state.write();
        state.failed_attempts = state.failed_attempts.saturating_add(1);
        state.backoff_exponent = (state.backoff_exponent + 1).min(self.max_backoff_exponent);

        let multiplier = 1_u32 << state.backoff_exponent.saturating_sub(1);
        let delay = self
            .backoff_base
            .checked_mul(multiplier)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap);
        state.next_allowed_attempt = Some(Instant::now() + delay);

        tracing::warn!(
            consecutive_failures = state.failed_attempts,
            "wallet unlock rejected"
        );
        FailedUnlock {
            consecutive_failures: state.failed_attempts,
            offer_reset: state.failed_attempts >= self.reset_prompt_after,
            retry_after: delay,
        }
    }

    pub fn failed_attempts(&self) -> u32 {
        self.state.read().failed_attempts
    }

    /// Whether enough consecutive failures piled up to suggest a reset.
    pub fn offers_reset(&self) -> bool {
        self.state.read().failed_attempts >= self.reset_prompt_after
    }

    /// Clear failure bookkeeping, e.g. after the wallet has been reset.
    pub fn reset_failed_attempts(&self) {
        let mut state = self.state.write();
        state.failed_attempts = 0;
        state.next_allowed_attempt = None;
        state.backoff_exponent = 0;
    }

    /// Access unlocked material while refreshing the activity timestamp.
    pub fn with_unlocked<F, T>(&self, operation: F) -> WalletResult<T>
    where
        F: FnOnce(&WalletSecret, &str) -> WalletResult<T>,
    {
        self.access(true, operation)
    }

    /// Like [`Self::with_unlocked`] but leaves `last_activity_at` alone.
    pub fn peek_unlocked<F, T>(&self, operation: F) -> WalletResult<T>
    where
        F: FnOnce(&WalletSecret, &str) -> WalletResult<T>,
    {
        self.access(false, operation)
    }

    fn access<F, T>(&self, touch: bool, operation: F) -> WalletResult<T>
    where
        F: FnOnce(&WalletSecret, &str) -> WalletResult<T>,
    {
        let now = Utc::now();
        let mut state = self.state.write();
        if state.unlocked.is_none() {
            return Err(WalletError::PermissionDenied("Wallet is locked".to_string()));
        }

        if state.is_expired_at(now) {
            drop(state);
            self.lock(LockReason::InactivityTimeout);
            return Err(WalletError::PermissionDenied(
                "Wallet session expired".to_string(),
            ));
        }

        if touch {
            state.last_activity_at = now;
        }
        let session = state
            .unlocked
            .as_ref()
            .ok_or_else(|| WalletError::PermissionDenied("Wallet is locked".to_string()))?;
        operation(&session.secret, &session.current_address)
    }

    /// Account list for untrusted callers; does not count as activity.
    pub fn accounts(&self) -> WalletResult<Vec<AccountInfo>> {
        self.peek_unlocked(|secret, _| Ok(secret.accounts().to_vec()))
    }

    pub fn current_address(&self) -> WalletResult<String> {
        self.with_unlocked(|_, current| Ok(current.to_string()))
    }

    /// Point the unlocked session at another of its accounts.
    pub fn select_account(&self, address: &str) -> WalletResult<()> {
        let mut state = self.state.write();
        let session = state
            .unlocked
            .as_mut()
            .ok_or_else(|| WalletError::PermissionDenied("Wallet is locked".to_string()))?;
        if session.secret.account(address).is_none() {
            return Err(WalletError::NotFound(format!("Account {address}")));
        }
        session.current_address = address.to_string();
        Ok(())
    }

    /// Swap in re-loaded wallet material (after deriving another account).
    pub fn refresh_secret(&self, secret: WalletSecret) -> WalletResult<()> {
        let mut state = self.state.write();
        let session = state
            .unlocked
            .as_mut()
            .ok_or_else(|| WalletError::PermissionDenied("Wallet is locked".to_string()))?;
        session.secret = secret;
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::KeyringManager;

    const ABANDON_12: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn wallet() -> (WalletSecret, String) {
        let secret = KeyringManager::import_from_mnemonic(ABANDON_12).unwrap();
        let address = secret.accounts()[0].address.clone();
        (secret, address)
    }

    fn unlocked_manager(timeout: Duration) -> SessionManager {
        let manager = SessionManager::new(timeout, Network::Mainnet);
        let (secret, address) = wallet();
        manager.unlock(secret, address).unwrap();
        manager
    }

    #[test]
    fn starts_locked() {
        let manager = SessionManager::with_defaults();
        assert!(manager.is_locked());
        assert!(!manager.snapshot().is_unlocked);
        assert!(matches!(
            manager.accounts(),
            Err(WalletError::PermissionDenied(_))
        ));
    }

    #[test]
    fn unlock_and_lock_cycle() {
        let manager = unlocked_manager(DEFAULT_SESSION_TIMEOUT);
        assert!(!manager.is_locked());
        assert_eq!(manager.accounts().unwrap().len(), 1);

        assert!(manager.lock(LockReason::UserRequested));
        assert!(manager.is_locked());
        assert!(!manager.lock(LockReason::UserRequested));
    }

    #[test]
    fn unlock_rejects_foreign_current_address() {
        let manager = SessionManager::with_defaults();
        let (secret, _) = wallet();
        let err = manager
            .unlock(secret, "creata1someoneelse".to_string())
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
        assert!(manager.is_locked());
    }

    #[test]
    fn timeout_just_past_threshold_locks() {
        let timeout = Duration::from_secs(30 * 60);
        let manager = unlocked_manager(timeout);
        let now = Utc::now();
        let threshold = chrono::Duration::from_std(timeout).unwrap();

        manager.record_activity_at(now - threshold - chrono::Duration::milliseconds(1));
        assert!(manager.check_timeout_at(now));
        assert!(manager.is_locked());
    }

    #[test]
    fn fresh_activity_stays_unlocked() {
        let manager = unlocked_manager(Duration::from_secs(30 * 60));
        let now = Utc::now();

        manager.record_activity_at(now);
        assert!(!manager.check_timeout_at(now));
        assert!(!manager.is_locked());

        let threshold = chrono::Duration::minutes(30);
        manager.record_activity_at(now - threshold);
        assert!(!manager.check_timeout_at(now));
    }

    #[test]
    fn expired_session_refuses_access() {
        let manager = unlocked_manager(Duration::from_millis(10));
        manager.record_activity_at(Utc::now() - chrono::Duration::seconds(1));
        let result = manager.with_unlocked(|_, _| Ok(()));
        assert!(matches!(result, Err(WalletError::PermissionDenied(_))));
        assert!(manager.is_locked());
    }

    #[test]
    fn access_refreshes_activity() {
        let manager = unlocked_manager(DEFAULT_SESSION_TIMEOUT);
        let stale = Utc::now() - chrono::Duration::minutes(10);
        manager.record_activity_at(stale);

        manager.current_address().unwrap();
        assert!(manager.snapshot().last_activity_at > stale);
    }

    #[test]
    fn events_follow_transitions() {
        let manager = SessionManager::with_defaults();
        let mut events = manager.subscribe();

        let (secret, address) = wallet();
        manager.unlock(secret, address).unwrap();
        manager.set_network(Network::Testnet);
        manager.set_network(Network::Testnet);
        manager.lock(LockReason::VaultReset);

        assert_eq!(events.try_recv().unwrap(), SessionEvent::Unlocked);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::NetworkChanged(Network::Testnet)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Locked(LockReason::VaultReset)
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn failed_attempts_arm_backoff_and_offer_reset() {
        let manager = SessionManager::with_backoff(
            DEFAULT_SESSION_TIMEOUT,
            Network::Mainnet,
            3,
            Duration::from_millis(10),
            Duration::from_millis(40),
        );

        let first = manager.register_failed_attempt();
        assert_eq!(first.consecutive_failures, 1);
        assert!(!first.offer_reset);
        assert_eq!(first.retry_after, Duration::from_millis(10));
        assert!(matches!(
            manager.ensure_unlock_allowed(),
            Err(WalletError::PermissionDenied(msg)) if msg.contains("Retry")
        ));

        std::thread::sleep(Duration::from_millis(15));
        assert!(manager.ensure_unlock_allowed().is_ok());

        assert_eq!(manager.register_failed_attempt().retry_after, Duration::from_millis(20));
        let third = manager.register_failed_attempt();
        assert!(third.offer_reset);
        assert_eq!(third.retry_after, Duration::from_millis(40));
        assert_eq!(manager.register_failed_attempt().retry_after, Duration::from_millis(40));

        let (secret, address) = wallet();
        manager.unlock(secret, address).unwrap();
        assert_eq!(manager.failed_attempts(), 0);
        assert!(manager.ensure_unlock_allowed().is_ok());
    }

    #[test]
    fn account_listing_does_not_refresh_activity() {
        let manager = unlocked_manager(DEFAULT_SESSION_TIMEOUT);
        let stale = Utc::now() - chrono::Duration::minutes(10);
        manager.record_activity_at(stale);

        assert_eq!(manager.accounts().unwrap().len(), 1);
        assert_eq!(manager.snapshot().last_activity_at, stale);
    }

    #[test]
    fn reset_is_offered_from_the_threshold() {
        let manager = SessionManager::with_backoff(
            DEFAULT_SESSION_TIMEOUT,
            Network::Mainnet,
            2,
            Duration::ZERO,
            Duration::ZERO,
        );
        manager.register_failed_attempt();
        assert!(!manager.offers_reset());
        manager.register_failed_attempt();
        assert!(manager.offers_reset());
        manager.reset_failed_attempts();
        assert!(!manager.offers_reset());
    }

    #[test]
    fn select_account_requires_known_address() {
        let manager = unlocked_manager(DEFAULT_SESSION_TIMEOUT);
        let address = manager.current_address().unwrap();
        assert!(manager.select_account(&address).is_ok());
        assert!(matches!(
            manager.select_account("creata1unknown"),
            Err(WalletError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn auto_lock_task_locks_idle_session() {
        let manager = unlocked_manager(Duration::from_secs(30 * 60));
        let mut events = manager.subscribe();
        manager.record_activity_at(Utc::now() - chrono::Duration::minutes(31));

        let handle = manager.spawn_auto_lock(Duration::from_secs(60));
        let event = events.recv().await.unwrap();
        handle.abort();

        assert_eq!(event, SessionEvent::Locked(LockReason::InactivityTimeout));
        assert!(manager.is_locked());
    }
}
