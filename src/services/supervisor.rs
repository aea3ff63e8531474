//! Connection Supervisor
//!
//! Tracks the push channel's connection state, reports every transition to
//! the state layer and paces reconnects with capped exponential backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::constants::{
    RETRY_INITIAL_DELAY_MS, RETRY_JITTER, RETRY_MAX_DELAY_MS, RETRY_MULTIPLIER,
};
use crate::services::events::ServiceEvent;

/// Reconnect pacing
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the delay randomized in both directions (0.0 - 1.0)
    pub jitter: f64,
    /// 0 retries forever
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            multiplier: RETRY_MULTIPLIER,
            jitter: RETRY_JITTER,
            max_attempts: 0,
        }
    }
}

impl RetryConfig {
    /// Un-jittered delay before the given attempt (1-based), capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as f64) as u64)
    }

    /// Backoff spread by `sample` in [0, 1): 0.5 is the midpoint
    pub fn jittered(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.backoff(attempt).as_millis() as f64;
        let spread = base * self.jitter * (sample * 2.0 - 1.0);
        Duration::from_millis((base + spread).max(0.0) as u64)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt > self.max_attempts
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Sleeping before the next attempt
    Backoff = 3,
}

impl From<u8> for ConnectionState {
    fn from(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Backoff,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Connection lifecycle bookkeeping for one service
pub struct Supervisor {
    service: Arc<str>,
    config: RetryConfig,
    tx: UnboundedSender<ServiceEvent>,
    state: AtomicU8,
    attempt: AtomicU32,
}

impl Supervisor {
    pub fn new(
        service: impl Into<Arc<str>>,
        config: RetryConfig,
        tx: UnboundedSender<ServiceEvent>,
    ) -> Self {
        Self {
            service: service.into(),
            config,
            tx,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            attempt: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load(Ordering::SeqCst).into()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    fn transition(&self, state: ConnectionState, detail: impl Into<Arc<str>>) {
        self.state.store(state as u8, Ordering::SeqCst);
        // The receiver is gone only during shutdown
        let _ = self.tx.send(ServiceEvent::ConnectionState {
            service: self.service.clone(),
            connected: state == ConnectionState::Connected,
            detail: detail.into(),
        });
    }

    pub fn on_connecting(&self, endpoint: &str) {
        tracing::debug!(service = %self.service, endpoint, "connecting");
        self.transition(ConnectionState::Connecting, format!("Connecting to {endpoint}"));
    }

    /// Successful (re)connect; the backoff starts over
    pub fn on_connected(&self) {
        self.attempt.store(0, Ordering::SeqCst);
        tracing::info!(service = %self.service, "connected");
        self.transition(ConnectionState::Connected, "Connected");
    }

    pub fn on_disconnected(&self, reason: &str) {
        tracing::warn!(service = %self.service, reason, "disconnected");
        self.transition(ConnectionState::Disconnected, reason);
    }

    /// Count an attempt and return how long to wait, or `None` when out of attempts
    pub fn next_retry_delay(&self) -> Option<Duration> {
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;

        if self.config.exhausted(attempt) {
            tracing::warn!(service = %self.service, attempt, "giving up");
            self.transition(
                ConnectionState::Disconnected,
                format!("Gave up after {} attempts", self.config.max_attempts),
            );
            return None;
        }

        let delay = self.config.jittered(attempt, jitter_sample());
        let detail = match self.config.max_attempts {
            0 => format!("Reconnecting in {:.1}s (attempt {attempt})", delay.as_secs_f64()),
            max => format!(
                "Reconnecting in {:.1}s (attempt {attempt}/{max})",
                delay.as_secs_f64()
            ),
        };
        tracing::info!(service = %self.service, delay_ms = delay.as_millis() as u64, attempt, "backing off");
        self.transition(ConnectionState::Backoff, detail);

        Some(delay)
    }
}

/// Uniform-ish sample in [0, 1) from a random v4 UUID
fn jitter_sample() -> f64 {
    let bits = uuid::Uuid::new_v4().as_u128() as u16;
    f64::from(bits) / 65_536.0
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("service", &self.service)
            .field("state", &self.state())
            .field("attempt", &self.attempt_count())
            .finish()
    }
}
