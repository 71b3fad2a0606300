//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, attempts pass through and are counted
//! - Open: dependency assumed down, attempts fail fast
//! - Half-Open: a bounded number of probes test whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open:      total >= min_requests && failures/total >= threshold
//! Open → Half-Open:   first check at or after opened_at + open_cooldown
//! Half-Open → Open:   any probe fails
//! Half-Open → Closed: half_open_max_probes probes succeed
//! ```
//!
//! # Design Decisions
//! - Pure state machine: callers pass `now`, nothing here sleeps or does I/O
//! - One mutex per breaker; the downstream call never runs under it
//! - Every state change starts a new generation; outcomes carrying an older
//!   generation are discarded
//! - A closed-window rollover only clears the counts, so a call that finishes
//!   after its window ended still counts in the current one
//! - A window is not rolled over before it holds `min_requests` attempts;
//!   below that volume no ratio is evaluated, so nothing is stale yet

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::BreakerConfig;
use crate::resilience::classifier::Outcome;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn gauge_value(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker parameters resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerSettings {
    pub min_requests: u32,
    pub failure_ratio_threshold: f64,
    pub open_cooldown: Duration,
    pub half_open_max_probes: u32,
    /// `Duration::ZERO` disables the time-based window reset.
    pub window_interval: Duration,
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            min_requests: config.min_requests,
            failure_ratio_threshold: config.failure_ratio_threshold,
            open_cooldown: Duration::from_secs(config.open_cooldown_secs),
            half_open_max_probes: config.half_open_max_probes,
            window_interval: Duration::from_secs(config.window_interval_secs),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&BreakerConfig::default())
    }
}

/// Counts held by the outcome window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub total: u32,
    pub successes: u32,
    pub failures: u32,
}

impl WindowCounts {
    /// Failure ratio, 0.0 for an empty window.
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.failures) / f64::from(self.total)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OutcomeWindow {
    counts: WindowCounts,
    started_at: Instant,
}

impl OutcomeWindow {
    fn new(now: Instant) -> Self {
        Self {
            counts: WindowCounts::default(),
            started_at: now,
        }
    }

    fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    fn record(&mut self, outcome: &Outcome) {
        self.counts.total = self.counts.total.saturating_add(1);
        if outcome.is_failure() {
            self.counts.failures = self.counts.failures.saturating_add(1);
        } else {
            self.counts.successes = self.counts.successes.saturating_add(1);
        }
    }
}

/// A state change produced by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
}

impl Transition {
    /// Landed in open (a trip or a failed probe).
    pub fn opened(&self) -> bool {
        self.to == BreakerState::Open
    }

    /// Half-open probes succeeded and the breaker closed.
    pub fn recovered(&self) -> bool {
        self.from == BreakerState::HalfOpen && self.to == BreakerState::Closed
    }
}

/// Permission to attempt one downstream call.
///
/// Must be handed back to [`CircuitBreaker::record`] with the call's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Admission {
    generation: u64,
    probe: bool,
    transition: Option<Transition>,
}

impl Admission {
    /// True if this attempt is a half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Transition applied while admitting (open → half-open on cooldown expiry).
    pub fn transition(&self) -> Option<Transition> {
        self.transition
    }
}

/// Why an attempt was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Open and still cooling down.
    Open,
    /// Half-open and every probe slot is taken.
    ProbeBudgetExhausted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Open => f.write_str("breaker open"),
            Rejection::ProbeBudgetExhausted => f.write_str("half-open probe budget exhausted"),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub window: WindowCounts,
    pub generation: u64,
    pub probes_admitted: u32,
}

#[derive(Debug)]
struct BreakerCore {
    state: BreakerState,
    window: OutcomeWindow,
    generation: u64,
    opened_at: Instant,
    probes_admitted: u32,
    probe_successes: u32,
}

impl BreakerCore {
    fn new(now: Instant) -> Self {
        Self {
            state: BreakerState::Closed,
            window: OutcomeWindow::new(now),
            generation: 0,
            opened_at: now,
            probes_admitted: 0,
            probe_successes: 0,
        }
    }

    /// Apply transitions that are due only because time has passed.
    fn advance(&mut self, settings: &BreakerSettings, now: Instant) -> Option<Transition> {
        match self.state {
            BreakerState::Closed => {
                let interval = settings.window_interval;
                if !interval.is_zero()
                    && self.window.counts.total >= settings.min_requests
                    && now.saturating_duration_since(self.window.started_at) >= interval
                {
                    // Same generation: attempts admitted before the rollover
                    // still count in the fresh window.
                    self.window.reset(now);
                }
                None
            }
            BreakerState::Open => {
                if now.saturating_duration_since(self.opened_at) >= settings.open_cooldown {
                    Some(self.enter(BreakerState::HalfOpen, now))
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => None,
        }
    }

    fn enter(&mut self, to: BreakerState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.window.reset(now);
        self.probes_admitted = 0;
        self.probe_successes = 0;
        if to == BreakerState::Open {
            self.opened_at = now;
        }
        Transition { from, to }
    }

    fn should_trip(&self, settings: &BreakerSettings) -> bool {
        let counts = self.window.counts;
        counts.total > 0
            && counts.total >= settings.min_requests
            && counts.failure_ratio() >= settings.failure_ratio_threshold
    }
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    /// Create a closed breaker whose first window starts now.
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self::starting_at(name, settings, Instant::now())
    }

    /// Create a closed breaker whose first window starts at `now`.
    pub fn starting_at(name: impl Into<String>, settings: BreakerSettings, now: Instant) -> Self {
        Self {
            name: name.into(),
            settings,
            core: Mutex::new(BreakerCore::new(now)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Decide whether an attempt may run at `now`.
    pub fn try_acquire(&self, now: Instant) -> Result<Admission, Rejection> {
        let mut core = self.core.lock();
        let transition = core.advance(&self.settings, now);

        match core.state {
            BreakerState::Closed => Ok(Admission {
                generation: core.generation,
                probe: false,
                transition,
            }),
            BreakerState::Open => Err(Rejection::Open),
            BreakerState::HalfOpen => {
                if core.probes_admitted >= self.settings.half_open_max_probes {
                    return Err(Rejection::ProbeBudgetExhausted);
                }
                core.probes_admitted += 1;
                Ok(Admission {
                    generation: core.generation,
                    probe: true,
                    transition,
                })
            }
        }
    }

    /// Record the outcome of an admitted attempt.
    ///
    /// Returns the transition it caused, if any. Outcomes from an earlier
    /// generation are ignored.
    pub fn record(&self, admission: Admission, outcome: &Outcome, now: Instant) -> Option<Transition> {
        let mut core = self.core.lock();
        core.advance(&self.settings, now);

        if admission.generation != core.generation {
            return None;
        }

        match core.state {
            BreakerState::Closed => {
                core.window.record(outcome);
                if core.should_trip(&self.settings) {
                    Some(core.enter(BreakerState::Open, now))
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                if outcome.is_failure() {
                    return Some(core.enter(BreakerState::Open, now));
                }
                core.window.record(outcome);
                core.probe_successes += 1;
                if core.probe_successes >= self.settings.half_open_max_probes {
                    Some(core.enter(BreakerState::Closed, now))
                } else {
                    None
                }
            }
            BreakerState::Open => None,
        }
    }

    /// Current state at `now`, applying any due time-based transition.
    #[cfg(test)]
    pub fn state(&self, now: Instant) -> BreakerState {
        self.snapshot(now).0.state
    }

    /// View the breaker at `now`.
    ///
    /// A due open → half-open move is applied here too and returned, so the
    /// caller can report it like one produced by [`CircuitBreaker::try_acquire`].
    pub fn snapshot(&self, now: Instant) -> (BreakerSnapshot, Option<Transition>) {
        let mut core = self.core.lock();
        let transition = core.advance(&self.settings, now);
        let snapshot = BreakerSnapshot {
            state: core.state,
            window: core.window.counts,
            generation: core.generation,
            probes_admitted: core.probes_admitted,
        };
        (snapshot, transition)
    }
}
