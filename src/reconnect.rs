//! Reconnection policy shared by both TCP clients.
//!
//! The policy is a pure state machine: it never sleeps or touches a socket. Transports
//! ask it what to do after each failure and tell it when a frame arrived.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration_ms;

/// Reconnect settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// Fixed pause before each reconnect attempt.
    #[serde(rename = "delay_ms", with = "duration_ms")]
    pub delay: Duration,
    /// 0 retries forever.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { enabled: true, delay: Duration::from_secs(2), max_attempts: 5 }
    }
}

impl ReconnectConfig {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }
}

/// What a transport should do after losing its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Sleep `after`, then make reconnect attempt number `attempt` (1-based).
    Retry { after: Duration, attempt: u32 },
    /// Stop and report the connection as lost.
    GiveUp { attempts: u32 },
}

/// Counts consecutive failed reconnects against a [`ReconnectConfig`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt_count: 0 }
    }

    /// Record a failure and decide whether to try again.
    pub fn on_failure(&mut self) -> ReconnectDecision {
        if !self.config.enabled || self.is_exhausted() {
            return ReconnectDecision::GiveUp { attempts: self.attempt_count };
        }

        self.attempt_count += 1;
        ReconnectDecision::Retry { after: self.config.delay, attempt: self.attempt_count }
    }

    /// A frame arrived, the connection is healthy again.
    pub fn on_success(&mut self) {
        self.attempt_count = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn is_exhausted(&self) -> bool {
        self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
