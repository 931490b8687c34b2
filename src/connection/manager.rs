//! The shared connection manager.
//!
//! One instance per process, built by the composition root and handed out as
//! `Arc<ConnectionManager>`. All access to the live connection goes through it.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rand::Rng;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{CacheConfig, ReconnectConfig, StoreBackend};
use crate::connection::state::{ConnectionEvent, ConnectionState, StateTrigger};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::store::{MemoryStore, RedisConnector, StoreConnection, StoreConnector, StoreError};

/// The verified connection the manager publishes.
///
/// `ArcSwapOption` needs a sized pointee, so the trait object lives behind
/// this owner and consumers reach it through `Deref`.
pub struct LiveConnection {
    inner: Box<dyn StoreConnection>,
}

impl Deref for LiveConnection {
    type Target = dyn StoreConnection;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

/// Cloned reference to the live connection.
pub type ConnectionHandle = Arc<LiveConnection>;

const SELF_TEST_PREFIX: &str = "kvgate:self-test:";
const SELF_TEST_TTL: Duration = Duration::from_secs(10);
const EVENT_CAPACITY: usize = 64;

/// Error returned by [`ConnectionManager::initialize`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum InitializationError {
    #[error("could not connect to {endpoint}: {source}")]
    Connect { endpoint: String, source: StoreError },

    #[error("self-test failed: {0}")]
    SelfTest(#[source] StoreError),

    #[error("self-test read back {actual:?}, expected {expected:?}")]
    SelfTestMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("connection manager has been shut down")]
    ShutDown,
}

/// Timing knobs taken from the cache config.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
    pub reconnect: ReconnectConfig,
}

impl From<&CacheConfig> for ManagerSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            keep_alive: config.keep_alive(),
            reconnect: config.reconnect.clone(),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

pub struct ConnectionManager {
    pub(super) connector: Arc<dyn StoreConnector>,
    pub(super) settings: ManagerSettings,
    pub(super) state: watch::Sender<ConnectionState>,
    pub(super) events: broadcast::Sender<ConnectionEvent>,
    pub(super) connection: ArcSwapOption<LiveConnection>,
    /// Guards the "is connecting" section; held across a single connect attempt.
    pub(super) init_lock: tokio::sync::Mutex<()>,
    pub(super) lost: Notify,
    pub(super) shutdown: Shutdown,
    shutdown_started: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    connect_attempts: AtomicU64,
    /// Error of the most recent connect attempt, shared with callers that
    /// queued behind it.
    last_failure: Mutex<Option<InitializationError>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn StoreConnector>, settings: ManagerSettings) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            connector,
            settings,
            state,
            events,
            connection: ArcSwapOption::empty(),
            init_lock: tokio::sync::Mutex::new(()),
            lost: Notify::new(),
            shutdown: Shutdown::new(),
            shutdown_started: AtomicBool::new(false),
            supervisor: Mutex::new(None),
            connect_attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        })
    }

    /// Build a manager for the configured backend.
    pub fn from_config(config: &CacheConfig) -> Result<Arc<Self>, StoreError> {
        let connector: Arc<dyn StoreConnector> = match config.backend {
            StoreBackend::Redis => Arc::new(RedisConnector::from_config(config)?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(connector, ManagerSettings::from(config)))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to lifecycle and error events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Number of completed connect attempts, initial and reconnects alike.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    /// Deadline for a single command on the shared connection.
    pub fn command_timeout(&self) -> Duration {
        self.settings.connect_timeout
    }

    /// The live connection, only while `Ready`.
    pub fn connection(&self) -> Option<ConnectionHandle> {
        if !self.state().is_ready() {
            return None;
        }
        self.connection.load_full()
    }

    /// Open the connection and verify it with a write+read self-test.
    ///
    /// Idempotent and safe to call concurrently: one caller performs the
    /// attempt while the others wait for it and share its outcome. On failure
    /// the error is returned here and the background supervisor keeps
    /// retrying with backoff.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), InitializationError> {
        if self.state().is_ready() {
            return Ok(());
        }

        let seen = self.connect_attempts();
        let _guard = self.init_lock.lock().await;
        let from = self.state();
        match from {
            ConnectionState::Ready => return Ok(()),
            ConnectionState::Ended => return Err(InitializationError::ShutDown),
            _ => {}
        }
        // An attempt finished while we queued; its failure is ours too.
        if self.connect_attempts() != seen {
            if let Some(e) = self.last_failure() {
                return Err(e);
            }
        }

        self.ensure_supervisor();
        if from != ConnectionState::Reconnecting {
            self.apply(StateTrigger::ConnectRequested);
        }

        tracing::info!(endpoint = %self.connector.endpoint(), "Connecting to cache store");
        match self.establish().await {
            Ok(conn) => {
                self.install(conn);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Cache initialization failed");
                self.emit_error(e.to_string());
                if self.apply(StateTrigger::ConnectFailed) {
                    self.lost.notify_one();
                }
                Err(e)
            }
        }
    }

    /// Liveness probe. `false` unless `Ready` and the store answers in time.
    pub async fn health_check(&self) -> bool {
        let Some(conn) = self.connection() else {
            return false;
        };
        match with_deadline(self.settings.connect_timeout, conn.ping()).await {
            Ok(()) => true,
            Err(e) => {
                self.report_failure(&e);
                false
            }
        }
    }

    /// Tell the manager a command on the shared connection failed.
    ///
    /// Connection-level failures move `Ready → Reconnecting` and wake the
    /// supervisor; command-level errors are only logged.
    pub fn report_failure(&self, error: &StoreError) {
        self.emit_error(error.to_string());
        match error {
            StoreError::Command(_) => {
                tracing::warn!(error = %error, "Cache command failed");
            }
            StoreError::Connect(_) | StoreError::Timeout(_) | StoreError::Closed => {
                let lost = self.apply_with(StateTrigger::ConnectionLost, || {
                    self.connection.store(None);
                });
                if lost {
                    tracing::warn!(error = %error, "Cache connection lost, reconnecting");
                    self.lost.notify_one();
                }
            }
        }
    }

    /// Close the connection gracefully and stop background work.
    ///
    /// Runs exactly once; concurrent or repeated calls wait for the first one
    /// to reach `Ended`. Safe to call on a manager that was never initialized.
    pub async fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|s| *s == ConnectionState::Ended).await;
            return;
        }

        tracing::info!("Shutting down cache connection");
        self.shutdown.trigger();

        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(mut handle) = handle {
            let grace = self.settings.connect_timeout + Duration::from_secs(1);
            if time::timeout(grace, &mut handle).await.is_err() {
                tracing::warn!("Cache supervisor did not stop in time, aborting it");
                handle.abort();
            }
        }

        // Wait out any in-flight initialize so it cannot install a connection
        // after the manager has ended.
        let _guard = self.init_lock.lock().await;
        if let Some(conn) = self.connection.swap(None) {
            match with_deadline(self.settings.connect_timeout, conn.close()).await {
                Ok(()) => tracing::info!("Cache connection closed"),
                Err(e) => tracing::warn!(error = %e, "Cache connection did not close cleanly"),
            }
        }
        // Concurrent callers return once this lands, after the close above.
        self.apply(StateTrigger::ShutdownRequested);
    }

    fn ensure_supervisor(self: &Arc<Self>) {
        let mut slot = self
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() && !self.shutdown.is_triggered() {
            let signal = self.shutdown.subscribe();
            *slot = Some(tokio::spawn(Arc::clone(self).supervise(signal)));
        }
    }

    /// Connect and self-test, recording the outcome for queued callers.
    ///
    /// Callers must hold `init_lock`.
    pub(super) async fn establish(&self) -> Result<Box<dyn StoreConnection>, InitializationError> {
        let result = self.attempt().await;
        let failure = result.as_ref().err().cloned();
        *self
            .last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = failure;
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn last_failure(&self) -> Option<InitializationError> {
        self.last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Connect and self-test, each bounded by the connect timeout.
    async fn attempt(&self) -> Result<Box<dyn StoreConnection>, InitializationError> {
        let deadline = self.settings.connect_timeout;

        let conn = with_deadline(deadline, self.connector.connect())
            .await
            .map_err(|source| InitializationError::Connect {
                endpoint: self.connector.endpoint(),
                source,
            })?;

        if let Err(e) = self_test(conn.as_ref(), deadline).await {
            let _ = with_deadline(deadline, conn.close()).await;
            return Err(e);
        }
        Ok(conn)
    }

    /// Publish a verified connection and go `Ready`.
    pub(super) fn install(&self, conn: Box<dyn StoreConnection>) -> bool {
        let conn = Arc::new(LiveConnection { inner: conn });
        self.apply_with(StateTrigger::Established, || {
            self.connection.store(Some(conn));
        })
    }

    pub(super) fn apply(&self, trigger: StateTrigger) -> bool {
        self.apply_with(trigger, || {})
    }

    /// Apply a transition; `on_change` runs under the state lock when it is taken.
    pub(super) fn apply_with<F: FnOnce()>(&self, trigger: StateTrigger, on_change: F) -> bool {
        let mut change = None;
        let mut on_change = Some(on_change);
        self.state.send_if_modified(|state| match state.on(trigger) {
            Some(next) if next != *state => {
                change = Some((*state, next));
                *state = next;
                if let Some(f) = on_change.take() {
                    f();
                }
                true
            }
            _ => false,
        });

        match change {
            Some((from, to)) => {
                tracing::info!(from = %from, to = %to, "Cache connection state changed");
                metrics::record_transition(to);
                let _ = self.events.send(ConnectionEvent::Transition { from, to });
                true
            }
            None => false,
        }
    }

    pub(super) fn emit_error(&self, message: String) {
        let _ = self.events.send(ConnectionEvent::Error { message });
    }
}

/// Write a short-lived sentinel and read it back.
async fn self_test(conn: &dyn StoreConnection, deadline: Duration) -> Result<(), InitializationError> {
    let nonce: u64 = rand::thread_rng().gen();
    let key = format!("{SELF_TEST_PREFIX}{nonce:016x}");
    let expected = format!("{nonce:x}");

    with_deadline(deadline, conn.set_with_ttl(&key, &expected, SELF_TEST_TTL))
        .await
        .map_err(InitializationError::SelfTest)?;
    let actual = with_deadline(deadline, conn.get(&key))
        .await
        .map_err(InitializationError::SelfTest)?;

    if actual.as_deref() != Some(expected.as_str()) {
        return Err(InitializationError::SelfTestMismatch { expected, actual });
    }
    Ok(())
}
