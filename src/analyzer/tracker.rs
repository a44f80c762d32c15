//! Retry policy and usage tracking for analysis.
//!
//! This module provides:
//! - `RetryPolicy` - exponential backoff with full jitter
//! - `UsageCounter` - shared, append-only atomic counters
//! - `UsageSummary` - point-in-time snapshot for reporting
//!
//! # Retry Strategy
//!
//! - `1 + max_retries` attempts per model
//! - Exponential backoff: base * 2^attempt, capped at `max_delay`
//! - The actual sleep is drawn uniformly from `[0, computed]` (full jitter)
//! - An endpoint-provided retry-after takes precedence, still capped

use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries per model after the first attempt (default: 3)
    pub max_retries: u32,
    /// Base delay in milliseconds (default: 5000)
    pub base_delay_ms: u64,
    /// Backoff multiplier (default: 2.0)
    pub backoff_multiplier: f64,
    /// Maximum delay in milliseconds (default: 60000)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 5000,
            backoff_multiplier: 2.0,
            max_delay_ms: 60000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            backoff_multiplier: 2.0,
            max_delay_ms,
        }
    }

    /// Attempts allowed against a single model.
    pub fn attempts_per_model(&self) -> u32 {
        self.max_retries + 1
    }

    /// Upper bound of the backoff for a given attempt (0-indexed).
    ///
    /// delay = base * (multiplier ^ attempt), capped at max_delay_ms.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Full-jitter delay: uniform in `[0, delay_for_attempt(attempt)]`.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.delay_for_attempt(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=ceiling))
    }

    /// Wait before the next attempt.
    ///
    /// A server-provided `retry_after` wins over the jittered backoff.
    pub fn wait_duration(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        match retry_after {
            Some(server) => server.min(max),
            None => self.jittered_delay(attempt, &mut rand::thread_rng()),
        }
    }
}

/// Which model of the pair an attempt went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    Primary,
    Fallback,
}

/// Append-only usage counters shared across all pipelines.
#[derive(Debug)]
pub struct UsageCounter {
    requests: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    estimated_requests: AtomicU64,
    primary_attempts: AtomicU64,
    fallback_attempts: AtomicU64,
    fallback_switches: AtomicU64,
    rate_limit_hits: AtomicU64,
    unavailable_tasks: AtomicU64,
    start_time: Instant,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            estimated_requests: AtomicU64::new(0),
            primary_attempts: AtomicU64::new(0),
            fallback_attempts: AtomicU64::new(0),
            fallback_switches: AtomicU64::new(0),
            rate_limit_hits: AtomicU64::new(0),
            unavailable_tasks: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record token usage of one completed request.
    ///
    /// `estimated` marks usage computed locally because the endpoint
    /// reported none.
    pub fn record_usage(&self, input_tokens: u64, output_tokens: u64, estimated: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
        if estimated {
            self.estimated_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_attempt(&self, role: ModelRole) {
        let counter = match role {
            ModelRole::Primary => &self.primary_attempts,
            ModelRole::Fallback => &self.fallback_attempts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_switch(&self) {
        self.fallback_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.unavailable_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempts(&self, role: ModelRole) -> u64 {
        match role {
            ModelRole::Primary => self.primary_attempts.load(Ordering::Relaxed),
            ModelRole::Fallback => self.fallback_attempts.load(Ordering::Relaxed),
        }
    }

    pub fn fallback_switches(&self) -> u64 {
        self.fallback_switches.load(Ordering::Relaxed)
    }

    /// Get total elapsed time since tracking started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Snapshot the counters.
    pub fn summary(&self) -> UsageSummary {
        let requests = self.requests.load(Ordering::Relaxed);
        let primary_attempts = self.primary_attempts.load(Ordering::Relaxed);
        let fallback_attempts = self.fallback_attempts.load(Ordering::Relaxed);
        let total_attempts = primary_attempts + fallback_attempts;

        UsageSummary {
            requests,
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            estimated_requests: self.estimated_requests.load(Ordering::Relaxed),
            primary_attempts,
            fallback_attempts,
            fallback_switches: self.fallback_switches.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            unavailable_tasks: self.unavailable_tasks.load(Ordering::Relaxed),
            retries: total_attempts.saturating_sub(requests + self.unavailable_tasks.load(Ordering::Relaxed)),
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }
}

impl Default for UsageCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary report of endpoint usage.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    /// Requests that returned a reply
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Requests whose usage was estimated locally
    pub estimated_requests: u64,
    pub primary_attempts: u64,
    pub fallback_attempts: u64,
    pub fallback_switches: u64,
    pub rate_limit_hits: u64,
    pub unavailable_tasks: u64,
    /// Approximate attempts beyond the first per task
    pub retries: u64,
    pub elapsed_secs: f64,
}

impl UsageSummary {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Format summary for display.
    pub fn format_summary(&self) -> String {
        let mut output = String::new();

        output.push_str("\nAnalysis Summary:\n");
        output.push_str(&format!("   Requests: {}\n", self.requests));
        output.push_str(&format!(
            "   Tokens: ~{} ({} in / {} out)\n",
            format_number(self.total_tokens()),
            format_number(self.input_tokens),
            format_number(self.output_tokens)
        ));
        output.push_str(&format!(
            "   Total duration: {}\n",
            format_duration(Duration::from_secs_f64(self.elapsed_secs.max(0.0)))
        ));

        if self.retries > 0 {
            output.push_str(&format!("   Retries: {}\n", self.retries));
        }
        if self.rate_limit_hits > 0 {
            output.push_str(&format!("   Rate limited: {}\n", self.rate_limit_hits));
        }
        if self.fallback_switches > 0 {
            output.push_str(&format!(
                "   Fallback model used: {} time(s)\n",
                self.fallback_switches
            ));
        }
        if self.unavailable_tasks > 0 {
            output.push_str(&format!(
                "   Unavailable tasks: {}\n",
                self.unavailable_tasks
            ));
        }

        output
    }
}

/// Format a number with comma separators.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a duration for display.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}m {}s", mins, remaining_secs)
    } else {
        format!("{}s", secs)
    }
}
