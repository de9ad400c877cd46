//! Shared types module - plain data used by every engine-link crate
//!
//! Everything here is a pure data type with no external dependencies, so the
//! same definitions can be used by the sans-IO core, the protocol drivers and
//! the async runtime.
//!
//! # Peer States
//!
//! | State | Meaning |
//! |-------|---------|
//! | `NotStarted` | Transport exists, nothing sent yet |
//! | `Starting` | Bootstrap sent, waiting for the engine to finish negotiation |
//! | `Idle` | Ready, no game in progress |
//! | `Observing` | In a game, opponent to move |
//! | `Thinking` | In a game, engine computing a move |
//! | `FinishingGame` | Game ended, waiting for the end-of-game ping round-trip |
//! | `Disconnected` | Terminal; every further request is ignored |
//!
//! # Timing Constants
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `PING_TIMEOUT_MS` | 10000 | Deadline for one liveness probe |
//! | `MAX_SETTLE_REPROBES` | 3 | Consecutive re-probes before forcing end-of-game settlement |
//!
//! # Examples
//!
//! ```
//! use engine_link_types::{GameResult, PeerState, Side};
//!
//! assert!(PeerState::Disconnected.is_terminal());
//! assert!(PeerState::Thinking.in_game());
//! assert_eq!(Side::White.opposite(), Side::Black);
//! assert_eq!(GameResult::WhiteWins.as_pgn(), "1-0");
//! ```

use std::fmt;

/// Deadline for a single liveness probe (milliseconds).
pub const PING_TIMEOUT_MS: u64 = 10_000;

/// Re-probes issued for one end-of-game settlement before settling anyway.
pub const MAX_SETTLE_REPROBES: u32 = 3;

/// Lifecycle state of an engine peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeerState {
    #[default]
    NotStarted,
    Starting,
    Idle,
    Observing,
    Thinking,
    FinishingGame,
    Disconnected,
}

impl PeerState {
    /// True once no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Disconnected)
    }

    /// True while a game is being played (either side to move).
    pub fn in_game(&self) -> bool {
        matches!(self, PeerState::Observing | PeerState::Thinking)
    }

    /// True before the engine finished its start-up negotiation.
    pub fn before_ready(&self) -> bool {
        matches!(self, PeerState::NotStarted | PeerState::Starting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerState::NotStarted => "not-started",
            PeerState::Starting => "starting",
            PeerState::Idle => "idle",
            PeerState::Observing => "observing",
            PeerState::Thinking => "thinking",
            PeerState::FinishingGame => "finishing-game",
            PeerState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side to move / side played by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    White,
    Black,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Parse from string (case-insensitive, accepts `w`/`b`)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "white" | "w" => Some(Side::White),
            "black" | "b" => Some(Side::Black),
            _ => None,
        }
    }
}

/// Why a peer lost a game without a move on the board deciding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForfeitCause {
    /// The peer failed to answer a liveness probe in time.
    StalledConnection,
    /// The transport closed while a game was in progress.
    Disconnection,
}

impl ForfeitCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForfeitCause::StalledConnection => "stalled connection",
            ForfeitCause::Disconnection => "disconnection",
        }
    }
}

impl fmt::Display for ForfeitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a game as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    /// Game stopped without a result (aborted, adjourned).
    NoResult,
}

impl GameResult {
    pub fn as_pgn(&self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::NoResult => "*",
        }
    }

    /// The losing side of a forfeit by `side`.
    pub fn forfeit_by(side: Side) -> Self {
        match side {
            Side::White => GameResult::BlackWins,
            Side::Black => GameResult::WhiteWins,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pgn())
    }
}

/// Direction of a line on the wire, from the adapter's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    /// Single-character marker used in debug output.
    pub fn marker(&self) -> char {
        match self {
            Direction::Outbound => '>',
            Direction::Inbound => '<',
        }
    }
}

/// Process-unique identity of one engine session, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine evaluation of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    /// Centipawns.
    Cp(i32),
    /// Mate in N moves (negative when the engine is being mated).
    Mate(i32),
}

impl Score {
    pub fn negate(self) -> Self {
        match self {
            Score::Cp(v) => Score::Cp(v.saturating_neg()),
            Score::Mate(v) => Score::Mate(v.saturating_neg()),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(v) => write!(f, "cp {}", v),
            Score::Mate(v) => write!(f, "mate {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(PeerState::NotStarted.before_ready());
        assert!(PeerState::Starting.before_ready());
        assert!(!PeerState::Idle.before_ready());
        assert!(PeerState::Observing.in_game());
        assert!(!PeerState::FinishingGame.in_game());
        assert!(PeerState::Disconnected.is_terminal());
        assert_eq!(PeerState::default(), PeerState::NotStarted);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::from_str("W"), Some(Side::White));
        assert_eq!(Side::from_str("black"), Some(Side::Black));
        assert_eq!(Side::from_str("red"), None);
    }

    #[test]
    fn test_forfeit_result() {
        assert_eq!(GameResult::forfeit_by(Side::White), GameResult::BlackWins);
        assert_eq!(ForfeitCause::StalledConnection.to_string(), "stalled connection");
    }

    #[test]
    fn test_score_negate() {
        assert_eq!(Score::Cp(35).negate(), Score::Cp(-35));
        assert_eq!(Score::Mate(-2).negate(), Score::Mate(2));
        assert_eq!(Score::Cp(i32::MIN).negate(), Score::Cp(i32::MAX));
        assert_eq!(Score::Mate(i32::MIN).negate(), Score::Mate(i32::MAX));
    }
}
