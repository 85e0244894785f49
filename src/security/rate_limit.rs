//! Per-client admission control.
//!
//! A [`ClientRegistry`] owns one [`TokenBucket`] per client key behind a single
//! mutex. Admission and eviction both take that mutex for the whole logical
//! step, so a key is never evicted halfway through an admission and an evicted
//! key always comes back as a fresh, full bucket.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{Environment, RateLimitConfig};
use crate::observability::metrics;

/// A token bucket: bursts up to `capacity`, refills at `refill_per_sec`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A new bucket starts full.
    pub fn new(capacity: u32, refill_per_sec: f64, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        let refill_per_sec = if refill_per_sec.is_finite() && refill_per_sec > 0.0 {
            refill_per_sec
        } else {
            0.0
        };
        Self {
            capacity,
            refill_per_sec,
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        // Never move backwards if callers race on `now`.
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = clamp_tokens(self.tokens + elapsed * self.refill_per_sec, self.capacity);
        self.last_refill = now;
    }

    /// Refill for the time elapsed, then spend one token if available.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens = clamp_tokens(self.tokens - 1.0, self.capacity);
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Keep `0 <= tokens <= capacity` no matter what the arithmetic produced.
fn clamp_tokens(tokens: f64, capacity: f64) -> f64 {
    if tokens.is_nan() {
        0.0
    } else {
        tokens.clamp(0.0, capacity)
    }
}

/// Limits shared by every bucket in a registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    pub capacity: u32,
    pub refill_per_sec: f64,
    pub sweep_interval: Duration,
    pub idle_timeout: Duration,
}

impl From<&RateLimitConfig> for LimiterSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.burst_size,
            refill_per_sec: config.requests_per_second,
            sweep_interval: config.sweep_interval(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    limiter: TokenBucket,
    last_seen: Instant,
}

/// Concurrent map of client key → token bucket, with idle eviction.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientEntry>>,
    settings: LimiterSettings,
    enabled: bool,
}

impl ClientRegistry {
    /// An active registry.
    pub fn new(settings: LimiterSettings) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            settings,
            enabled: true,
        }
    }

    /// An inert registry: admits everything, tracks nothing, never sweeps.
    pub fn disabled(settings: LimiterSettings) -> Self {
        Self {
            enabled: false,
            ..Self::new(settings)
        }
    }

    /// Rate limiting is off when disabled in config or in a dev environment.
    pub fn from_config(config: &RateLimitConfig, environment: Environment) -> Self {
        let settings = LimiterSettings::from(config);
        if config.enabled && !environment.is_dev() {
            Self::new(settings)
        } else {
            Self::disabled(settings)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    /// Admit or deny one request from `key`. Never fails.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// [`ClientRegistry::admit`] against an explicit clock reading.
    ///
    /// Denied attempts refresh `last_seen` as well, so a client that keeps
    /// hammering cannot get itself evicted and handed a fresh bucket.
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let settings = self.settings;
        let mut clients = self.lock();
        let entry = clients.entry(key.to_owned()).or_insert_with(|| ClientEntry {
            limiter: TokenBucket::new(settings.capacity, settings.refill_per_sec, now),
            last_seen: now,
        });

        let allowed = entry.limiter.try_acquire(now);
        if now > entry.last_seen {
            entry.last_seen = now;
        }
        let tracked = clients.len();
        drop(clients);

        metrics::record_client_count(tracked);
        allowed
    }

    /// Remove every entry idle for longer than `timeout`. Returns how many went.
    pub fn evict(&self, now: Instant, timeout: Duration) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= timeout);
        let evicted = before - clients.len();
        let tracked = clients.len();
        drop(clients);

        metrics::record_client_count(tracked);
        evicted
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current token count for `key`, if tracked.
    pub fn tokens_for(&self, key: &str) -> Option<f64> {
        self.lock().get(key).map(|entry| entry.limiter.tokens())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientEntry>> {
        // Every mutation leaves the map consistent, so a poisoned lock is still usable.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the eviction sweep. Returns `None` for an inert registry.
    ///
    /// The task exits when `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        shutdown: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let registry = Arc::clone(self);
        Some(tokio::spawn(registry.run_sweeper(shutdown)))
    }

    async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        // tokio::time::interval panics on a zero period.
        let interval = self.settings.sweep_interval.max(Duration::from_millis(1));
        tracing::info!(
            interval_secs = interval.as_secs(),
            idle_timeout_secs = self.settings.idle_timeout.as_secs(),
            "Client sweep starting"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once(),
                _ = shutdown.recv() => {
                    tracing::info!("Client sweep received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep_once(&self) {
        let timeout = self.settings.idle_timeout;
        match panic::catch_unwind(AssertUnwindSafe(|| self.evict(Instant::now(), timeout))) {
            Ok(evicted) => {
                metrics::record_evictions(evicted);
                tracing::debug!(evicted, remaining = self.len(), "Client sweep finished");
            }
            Err(payload) => {
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    "Client sweep panicked; retrying next interval"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
