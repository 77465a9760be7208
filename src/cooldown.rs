use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default minimum gap between two spoken compliments.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Whether compliments share one timer or get one per emotion label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownMode {
    Shared,
    PerEmotion,
}

impl CooldownMode {
    pub fn from_per_emotion(per_emotion: bool) -> Self {
        if per_emotion {
            CooldownMode::PerEmotion
        } else {
            CooldownMode::Shared
        }
    }
}

/// Rate limiter for compliment emission.
#[derive(Debug, Clone)]
pub struct Cooldown {
    window: Duration,
    mode: CooldownMode,
    shared: Option<Instant>,
    per_label: HashMap<String, Instant>,
}

impl Cooldown {
    pub fn new(window: Duration, mode: CooldownMode) -> Self {
        Self {
            window,
            mode,
            shared: None,
            per_label: HashMap::new(),
        }
    }

    pub fn mode(&self) -> CooldownMode {
        self.mode
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true and records `now` when `label` may be complimented.
    pub fn try_acquire(&mut self, label: &str, now: Instant) -> bool {
        let last = match self.mode {
            CooldownMode::Shared => self.shared,
            CooldownMode::PerEmotion => self.per_label.get(label).copied(),
        };
        if !is_elapsed(last, now, self.window) {
            return false;
        }

        match self.mode {
            CooldownMode::Shared => self.shared = Some(now),
            CooldownMode::PerEmotion => {
                self.per_label.insert(label.to_string(), now);
            }
        }
        true
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, CooldownMode::PerEmotion)
    }
}

fn is_elapsed(last: Option<Instant>, now: Instant, window: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) > window,
    }
}
