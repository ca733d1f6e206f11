//! Typing flow: keystroke streak and words per minute.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Inactivity that breaks a streak
pub const STREAK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Streak length above which the user is "in flow"
pub const FLOW_THRESHOLD: u32 = 15;

/// Streak at which intensity saturates
pub const MAX_STREAK: u32 = 150;

/// Window for the words-per-minute estimate
pub const WPM_WINDOW: Duration = Duration::from_secs(60);

/// Keystrokes per word
const CHARS_PER_WORD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowState {
    pub streak: u32,
    pub wpm: u32,
    /// 0.0 ..= 1.0
    pub intensity: f64,
    pub is_flowing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FlowTracker {
    streak: u32,
    last_keystroke: Option<Instant>,
    window: VecDeque<Instant>,
}

impl FlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_keystroke(&mut self, now: Instant) {
        self.expire(now);
        self.streak = self.streak.saturating_add(1);
        self.last_keystroke = Some(now);
        self.window.push_back(now);
    }

    pub fn state(&self, now: Instant) -> FlowState {
        let streak = match self.last_keystroke {
            Some(last) if now.duration_since(last) < STREAK_TIMEOUT => self.streak,
            _ => 0,
        };
        let recent = self
            .window
            .iter()
            .filter(|t| now.duration_since(**t) < WPM_WINDOW)
            .count();
        FlowState {
            streak,
            wpm: (recent as f64 / CHARS_PER_WORD as f64).round() as u32,
            intensity: (streak as f64 / MAX_STREAK as f64).min(1.0),
            is_flowing: streak > FLOW_THRESHOLD,
        }
    }

    fn expire(&mut self, now: Instant) {
        if let Some(last) = self.last_keystroke {
            if now.duration_since(last) >= STREAK_TIMEOUT {
                self.streak = 0;
            }
        }
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) >= WPM_WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}
