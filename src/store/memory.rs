//! Process-local store backed by `DashMap`.
//!
//! Serves as the `memory` backend for single-instance deployments and as the
//! store double in tests. Expiry uses `tokio::time::Instant`, so tests running
//! on a paused clock can advance past a window without sleeping.
//!
//! Failure injection knobs (`refuse_connections`, `set_connect_delay`,
//! `sever`, `fail_self_test`, `stall_counters`) let tests force the manager
//! and the limiter through every failure path.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::store::{StoreConnection, StoreConnector, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Remaining lifetime in whole seconds, Redis `TTL` style.
    fn ttl_secs(&self, now: Instant) -> i64 {
        match self.expires_at {
            None => -1,
            Some(at) => {
                let remaining = at.saturating_duration_since(now);
                ((remaining.as_millis() + 500) / 1000) as i64
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: DashMap<String, Entry>,
    connect_attempts: AtomicUsize,
    refuse_connections: AtomicBool,
    fail_self_test: AtomicBool,
    stall_counters: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    /// Bumped by `sever`; connections from an older generation are dead.
    generation: AtomicU64,
}

/// In-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `connect` calls made so far.
    pub fn connect_attempts(&self) -> usize {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Make every subsequent `connect` stall for `delay` before answering.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.inner.connect_delay.lock() {
            *guard = delay;
        }
    }

    /// Corrupt reads so the write+read self-test fails.
    pub fn fail_self_test(&self, fail: bool) {
        self.inner.fail_self_test.store(fail, Ordering::SeqCst);
    }

    /// Make counter commands (`incr_and_ttl`, `expire`) hang forever, like a
    /// half-open socket.
    pub fn stall_counters(&self, stall: bool) {
        self.inner.stall_counters.store(stall, Ordering::SeqCst);
    }

    /// Drop every open connection; data survives.
    pub fn sever(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Remaining TTL of a live key, if it has one.
    pub fn key_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn connect_delay(&self) -> Option<Duration> {
        self.inner.connect_delay.lock().ok().and_then(|guard| *guard)
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.connect_delay() {
            tokio::time::sleep(delay).await;
        }
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(StoreError::Connect("connection refused".into()));
        }

        Ok(Box::new(MemoryConnection {
            inner: self.inner.clone(),
            generation: self.inner.generation.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        }))
    }

    fn endpoint(&self) -> String {
        "memory://local".to_string()
    }
}

pub struct MemoryConnection {
    inner: Arc<Inner>,
    generation: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    async fn maybe_stall(&self) {
        if self.inner.stall_counters.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst)
            || self.generation != self.inner.generation.load(Ordering::SeqCst)
        {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_open()
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check_open()?;
        self.inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_open()?;
        let now = Instant::now();
        self.inner.entries.remove_if(key, |_, e| e.is_expired(now));
        let value = self.inner.entries.get(key).map(|e| e.value.clone());
        if self.inner.fail_self_test.load(Ordering::SeqCst) {
            return Ok(value.map(|_| "corrupted".to_string()));
        }
        Ok(value)
    }

    async fn incr_and_ttl(&self, key: &str) -> Result<(i64, i64), StoreError> {
        self.check_open()?;
        self.maybe_stall().await;
        let now = Instant::now();

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = Entry {
                value: "0".to_string(),
                expires_at: None,
            };
        }

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::Command("value is not an integer".into()))?;
        let count = current + 1;
        entry.value = count.to_string();

        Ok((count, entry.ttl_secs(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check_open()?;
        self.maybe_stall().await;
        let now = Instant::now();
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = Some(now + ttl);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
