//! Engine settings, time controls and the per-game clock.
//!
//! Settings are plain serde types so they can be loaded from the same JSON
//! configuration file that describes how to launch the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A named option value requested by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSetting {
    pub name: String,
    pub value: String,
}

impl CustomSetting {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Time control for one side.
///
/// `move_time_ms` (fixed time per move) takes precedence over the
/// tournament-style `time_per_tc_ms` / `moves_per_tc` / `increment_ms` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeControl {
    /// Moves per time control period; 0 means the whole game.
    pub moves_per_tc: u32,
    pub time_per_tc_ms: u64,
    pub increment_ms: u64,
    pub move_time_ms: u64,
    /// Grace added to the move budget before the peer is told to stop.
    pub expiry_margin_ms: u64,
}

impl TimeControl {
    pub fn is_valid(&self) -> bool {
        self.time_per_tc_ms > 0 || self.move_time_ms > 0
    }

    pub fn fixed_move_time(move_time_ms: u64) -> Self {
        Self {
            move_time_ms,
            ..Self::default()
        }
    }

    pub fn sudden_death(time_per_tc_ms: u64, increment_ms: u64) -> Self {
        Self {
            time_per_tc_ms,
            increment_ms,
            ..Self::default()
        }
    }
}

/// Settings applied to an engine once per session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Raw protocol lines sent as-is, before any option.
    pub init_strings: Vec<String>,
    pub custom_settings: Vec<CustomSetting>,
    pub time_control: Option<TimeControl>,
    /// Report evaluations from White's point of view instead of the engine's.
    pub white_eval_pov: bool,
}

/// Clock state handed to protocol drivers when encoding a play request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockSnapshot {
    /// `None` when no time control is configured (infinite time).
    pub time_left: Option<Duration>,
    pub increment: Duration,
    pub moves_to_go: Option<u32>,
    pub move_time: Option<Duration>,
}

/// Remaining time for the engine's side in the current game.
#[derive(Debug, Clone, Default)]
pub struct GameClock {
    time_control: Option<TimeControl>,
    time_left: Duration,
    moves_left: Option<u32>,
    started_at: Option<Instant>,
}

impl GameClock {
    pub fn new(time_control: Option<TimeControl>) -> Self {
        let mut clock = Self {
            time_control,
            ..Self::default()
        };
        clock.reset();
        clock
    }

    pub fn set_time_control(&mut self, time_control: TimeControl) {
        self.time_control = Some(time_control);
        self.reset();
    }

    pub fn time_control(&self) -> Option<&TimeControl> {
        self.time_control.as_ref()
    }

    /// Restore a full period for a new game.
    pub fn reset(&mut self) {
        self.started_at = None;
        match self.time_control {
            Some(tc) => {
                self.time_left = Duration::from_millis(tc.time_per_tc_ms);
                self.moves_left = (tc.moves_per_tc > 0).then_some(tc.moves_per_tc);
            }
            None => {
                self.time_left = Duration::ZERO;
                self.moves_left = None;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn time_left(&self) -> Duration {
        self.time_left
    }

    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    /// Stop the clock after a move and return the time it took.
    pub fn stop(&mut self, now: Instant) -> Duration {
        let Some(started) = self.started_at.take() else {
            return Duration::ZERO;
        };
        let elapsed = now.saturating_duration_since(started);

        let Some(tc) = self.time_control else {
            return elapsed;
        };
        if tc.move_time_ms > 0 || tc.time_per_tc_ms == 0 {
            return elapsed;
        }

        self.time_left =
            self.time_left.saturating_sub(elapsed) + Duration::from_millis(tc.increment_ms);
        if let Some(left) = self.moves_left {
            if left <= 1 {
                self.time_left += Duration::from_millis(tc.time_per_tc_ms);
                self.moves_left = Some(tc.moves_per_tc);
            } else {
                self.moves_left = Some(left - 1);
            }
        }
        elapsed
    }

    /// How long the engine may think before it is told to stop, if bounded.
    pub fn move_budget(&self) -> Option<Duration> {
        let tc = self.time_control?;
        let margin = Duration::from_millis(tc.expiry_margin_ms);
        if tc.move_time_ms > 0 {
            Some(Duration::from_millis(tc.move_time_ms) + margin)
        } else if tc.time_per_tc_ms > 0 {
            Some(self.time_left + margin)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        let Some(tc) = self.time_control else {
            return ClockSnapshot::default();
        };
        if tc.move_time_ms > 0 {
            return ClockSnapshot {
                move_time: Some(Duration::from_millis(tc.move_time_ms)),
                ..ClockSnapshot::default()
            };
        }
        ClockSnapshot {
            time_left: (tc.time_per_tc_ms > 0).then_some(self.time_left),
            increment: Duration::from_millis(tc.increment_ms),
            moves_to_go: self.moves_left,
            move_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_json_defaults() {
        let json = r#"{"custom_settings":[{"name":"Hash","value":"64"}]}"#;
        let settings: EngineSettings = serde_json::from_str(json).unwrap();
        assert!(settings.init_strings.is_empty());
        assert_eq!(settings.custom_settings, vec![CustomSetting::new("Hash", "64")]);
        assert_eq!(settings.time_control, None);
        assert!(!settings.white_eval_pov);
    }

    #[test]
    fn test_time_control_validity() {
        assert!(!TimeControl::default().is_valid());
        assert!(TimeControl::fixed_move_time(500).is_valid());
        assert!(TimeControl::sudden_death(60_000, 1_000).is_valid());
    }

    #[test]
    fn test_clock_charges_elapsed_and_adds_increment() {
        let mut clock = GameClock::new(Some(TimeControl::sudden_death(10_000, 500)));
        let t0 = Instant::now();
        clock.start(t0);
        let elapsed = clock.stop(t0 + Duration::from_millis(2_000));
        assert_eq!(elapsed, Duration::from_millis(2_000));
        assert_eq!(clock.time_left(), Duration::from_millis(8_500));
        assert!(!clock.is_running());
    }

    #[test]
    fn test_clock_refills_after_period() {
        let tc = TimeControl {
            moves_per_tc: 2,
            time_per_tc_ms: 1_000,
            ..TimeControl::default()
        };
        let mut clock = GameClock::new(Some(tc));
        let t0 = Instant::now();

        clock.start(t0);
        clock.stop(t0 + Duration::from_millis(100));
        assert_eq!(clock.snapshot().moves_to_go, Some(1));

        clock.start(t0);
        clock.stop(t0 + Duration::from_millis(100));
        assert_eq!(clock.time_left(), Duration::from_millis(1_800));
        assert_eq!(clock.snapshot().moves_to_go, Some(2));
    }

    #[test]
    fn test_move_budget() {
        assert_eq!(GameClock::new(None).move_budget(), None);

        let tc = TimeControl {
            move_time_ms: 250,
            expiry_margin_ms: 50,
            ..TimeControl::default()
        };
        let clock = GameClock::new(Some(tc));
        assert_eq!(clock.move_budget(), Some(Duration::from_millis(300)));
        assert_eq!(clock.snapshot().move_time, Some(Duration::from_millis(250)));
        assert_eq!(clock.snapshot().time_left, None);

        let clock = GameClock::new(Some(TimeControl::sudden_death(5_000, 0)));
        assert_eq!(clock.move_budget(), Some(Duration::from_millis(5_000)));
    }
}
