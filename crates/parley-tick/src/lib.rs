//! Fixed-interval tick scheduler for Parley's actors.
//!
//! Both actors own a [`TickScheduler`]: the chat broadcaster ticks every
//! few hundred milliseconds to run catch-up delivery, the session store
//! ticks roughly once a minute to sweep expired sessions.
//!
//! # Integration
//!
//! The scheduler sits inside an actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         info = scheduler.wait_for_tick() => {
//!             deliver_pending().await;
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_tick` is cancel-safe: if another branch wins the select, the
//! scheduler state is untouched and the same deadline is awaited again.
//!
//! # Late wakeups
//!
//! A tick that fires late is not replayed. The next deadline is one full
//! interval after the late wakeup, and [`TickInfo::ticks_skipped`] reports
//! how many whole intervals were lost.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Budget warning threshold (0.0 to 1.0) as a fraction of the interval.
    /// A tracing warning is emitted when tick work exceeds it.
    pub budget_warn_threshold: f64,
}

impl TickConfig {
    /// Shortest accepted interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Longest accepted interval. Deadlines are computed by adding the
    /// interval to the current instant, which must not overflow.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Create a config that ticks every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            budget_warn_threshold: 0.80,
        }
    }

    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]:
    /// - `interval` clamped to `MIN_INTERVAL..=MAX_INTERVAL` (a zero
    ///   interval would spin).
    /// - `budget_warn_threshold` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        let clamped = self.interval.clamp(Self::MIN_INTERVAL, Self::MAX_INTERVAL);
        if clamped != self.interval {
            warn!(
                requested_ms = self.interval.as_millis() as u64,
                clamped_ms = clamped.as_millis() as u64,
                "tick interval out of range, clamping"
            );
            self.interval = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// How many whole intervals were skipped because of a late wakeup.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler. One per actor.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire (Tokio instant for `sleep_until`).
    next_tick: TokioInstant,
    /// Wall-clock instant when the last tick's work started.
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
}

impl TickScheduler {
    /// Create a new scheduler from config.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            "tick scheduler created"
        );

        // `validated` bounds the interval, so this cannot overflow.
        let next_tick = TokioInstant::now() + config.interval;

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
        }
    }

    /// Create a scheduler that ticks every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Wait until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let interval = self.config.interval;
        time::sleep_until(self.next_tick).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(self.next_tick);
        let ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = now + interval;

        trace!(tick = self.tick_count, "tick fired");

        TickInfo {
            tick: self.tick_count,
            ticks_skipped,
        }
    }

    /// Record that the work for the current tick has finished.
    ///
    /// Enables budget warnings. Calling it without a preceding tick is a
    /// no-op.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let budget = self.config.interval;

        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching interval"
            );
        }
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The effective interval, after clamping.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
