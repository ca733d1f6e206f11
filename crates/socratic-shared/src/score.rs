//! Builder score: rewards typing, penalises bulk pastes.
//!
//! The score is kept in integer milli-points so that a refund cancels its
//! penalty exactly; `value()` exposes it as a float.

use crate::{PENALTY_PER_LINE, TYPING_DEBOUNCE_MS, TYPING_REWARD};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const MILLIS_PER_POINT: f64 = 1000.0;

fn to_millis(points: f64) -> i64 {
    (points * MILLIS_PER_POINT).round() as i64
}

/// Penalty applied for one paste.
///
/// Deliberately neither `Clone` nor `Copy`: `BuilderScore::refund` consumes
/// it, so the same penalty cannot be refunded twice.
#[derive(Debug, PartialEq, Eq)]
pub struct Penalty {
    millis: i64,
}

impl Penalty {
    /// Positive amount deducted, in points.
    pub fn amount(&self) -> f64 {
        self.millis as f64 / MILLIS_PER_POINT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRates {
    pub penalty_per_line: f64,
    pub typing_reward: f64,
}

impl Default for ScoreRates {
    fn default() -> Self {
        Self {
            penalty_per_line: PENALTY_PER_LINE,
            typing_reward: TYPING_REWARD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderScore {
    millis: i64,
    initial_millis: i64,
}

impl BuilderScore {
    pub fn new(initial: f64) -> Self {
        let millis = to_millis(initial);
        Self {
            millis,
            initial_millis: millis,
        }
    }

    pub fn value(&self) -> f64 {
        self.millis as f64 / MILLIS_PER_POINT
    }

    /// Deduct `line_count * per_line` and hand back the exact amount taken.
    pub fn apply_penalty(&mut self, line_count: usize, per_line: f64) -> Penalty {
        let lines = i64::try_from(line_count).unwrap_or(i64::MAX);
        let millis = to_millis(per_line).saturating_mul(lines);
        self.millis = self.millis.saturating_sub(millis);
        Penalty { millis }
    }

    /// Give back a stored penalty in full.
    pub fn refund(&mut self, penalty: Penalty) {
        self.millis = self.millis.saturating_add(penalty.millis);
    }

    pub fn reward(&mut self, points: f64) {
        self.millis = self.millis.saturating_add(to_millis(points));
    }

    pub fn reset(&mut self) {
        self.millis = self.initial_millis;
    }
}

impl Default for BuilderScore {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Debounces typing rewards: one reward per burst of growing content,
/// released once the content has stopped growing for the quiet period.
#[derive(Debug, Clone)]
pub struct TypingDebounce {
    quiet: Duration,
    previous_len: usize,
    pending_since: Option<Instant>,
}

impl TypingDebounce {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            previous_len: 0,
            pending_since: None,
        }
    }

    /// Start tracking from an existing document length without rewarding it.
    pub fn baseline(&mut self, len: usize) {
        self.previous_len = len;
        self.pending_since = None;
    }

    /// Record the document length after a change.
    pub fn observe(&mut self, len: usize, now: Instant) {
        if len > self.previous_len {
            self.pending_since = Some(now);
        }
        self.previous_len = len;
    }

    /// Drop a pending reward, e.g. when the growth was a bulk paste.
    pub fn cancel(&mut self) {
        self.pending_since = None;
    }

    /// True once per burst when the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.duration_since(since) >= self.quiet => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for TypingDebounce {
    fn default() -> Self {
        Self::new(Duration::from_millis(TYPING_DEBOUNCE_MS))
    }
}
