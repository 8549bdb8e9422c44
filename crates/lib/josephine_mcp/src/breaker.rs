//! Per-tool circuit breaker for write failures.
//!
//! A tool trips after `threshold` recorded errors inside the rolling window
//! and stays open (preview-only) for the cooldown. Expiry is detected lazily
//! in [`BreakerRegistry::check`]; nothing else closes an expired breaker, so
//! state must be read through `check` and never directly. A recorded success
//! closes the breaker immediately.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use josephine_core::config::BreakerConfig;

use crate::registry::ToolName;

/// Breaker state for one tool.
#[derive(Debug, Default)]
struct BreakerEntry {
    error_timestamps: VecDeque<Instant>,
    opened_at: Option<Instant>,
}

impl BreakerEntry {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.error_timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.error_timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn reset(&mut self) {
        self.error_timestamps.clear();
        self.opened_at = None;
    }
}

/// Breaker state for every tool, one registry per server process.
///
/// Entries are created on first use. Each operation holds the entry's map
/// shard lock for its whole read-modify-write, so concurrent calls for the
/// same tool are serialized.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    entries: DashMap<ToolName, BreakerEntry>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Admission check. Returns the whole seconds until the tool may be
    /// retried while open, `None` when closed.
    pub fn check(&self, tool: ToolName) -> Option<u64> {
        self.check_at(tool, Instant::now())
    }

    /// Record a write failure. Returns `true` only on the call that trips the
    /// breaker.
    pub fn record_error(&self, tool: ToolName) -> bool {
        self.record_error_at(tool, Instant::now())
    }

    /// Record a successful write; closes the breaker and clears its history.
    pub fn record_success(&self, tool: ToolName) {
        let mut entry = self.entries.entry(tool).or_default();
        if entry.opened_at.is_some() {
            info!(tool = %tool, "circuit breaker closed by successful write");
        }
        entry.reset();
    }

    pub(crate) fn check_at(&self, tool: ToolName, now: Instant) -> Option<u64> {
        let mut entry = self.entries.entry(tool).or_default();
        let opened_at = entry.opened_at?;

        let elapsed = now.saturating_duration_since(opened_at);
        if elapsed >= self.config.cooldown() {
            entry.reset();
            info!(tool = %tool, "circuit breaker closed after cooldown");
            return None;
        }

        let remaining = self.config.cooldown() - elapsed;
        let secs = remaining.as_nanos().div_ceil(1_000_000_000);
        Some(u64::try_from(secs).unwrap_or(u64::MAX))
    }

    pub(crate) fn record_error_at(&self, tool: ToolName, now: Instant) -> bool {
        let mut entry = self.entries.entry(tool).or_default();
        if entry.opened_at.is_some() {
            return false;
        }

        entry.error_timestamps.push_back(now);
        entry.prune(now, self.config.window());

        let errors = entry.error_timestamps.len();
        if errors >= self.config.threshold() as usize {
            entry.opened_at = Some(now);
            warn!(
                tool = %tool,
                errors,
                window_ms = self.config.window().as_millis() as u64,
                cooldown_ms = self.config.cooldown().as_millis() as u64,
                "circuit breaker opened"
            );
            return true;
        }
        false
    }
}
