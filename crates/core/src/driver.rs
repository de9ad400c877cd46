//! Capabilities the session consumes: a protocol driver and a line sink.
//!
//! A [`ProtocolDriver`] knows one wire format (UCI, XBoard, ...). It never
//! writes to the transport itself: encoders return the lines to send and the
//! session decides whether they go out now or wait in the write buffer.

use std::time::Duration;

use crate::options::{OptionDescriptor, OptionValue};
use crate::settings::ClockSnapshot;
use crate::types::{GameResult, Score, Side};

/// Semantic event decoded from one inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Start-up negotiation finished; the peer accepts commands.
    StartComplete,
    /// Answer to the outstanding liveness probe.
    Pong,
    /// Name the engine reports for itself.
    Name(String),
    OptionDeclared(OptionDescriptor),
    VariantsDeclared(Vec<String>),
    /// Move played by the engine, in the protocol's notation.
    Move(String),
    /// Evaluation from the engine's point of view.
    Eval(Score),
    /// A line the protocol requires the adapter to send back.
    Reply(String),
    Error(String),
    Info(String),
}

/// Game parameters handed to the driver when a new game begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSetup {
    /// Side played by the engine.
    pub side: Side,
    pub variant: String,
    /// Starting position; `None` means the variant's standard start.
    pub start_fen: Option<String>,
}

impl GameSetup {
    pub const STANDARD_VARIANT: &'static str = "standard";

    pub fn new(side: Side) -> Self {
        Self {
            side,
            variant: Self::STANDARD_VARIANT.to_string(),
            start_fen: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_fen(mut self, fen: impl Into<String>) -> Self {
        self.start_fen = Some(fen.into());
        self
    }

    pub fn is_standard(&self) -> bool {
        self.variant == Self::STANDARD_VARIANT
    }
}

/// Everything a driver needs to encode a play request.
#[derive(Debug, Clone, Copy)]
pub struct GoRequest<'a> {
    pub setup: &'a GameSetup,
    /// Moves played so far, both sides, in order.
    pub moves: &'a [String],
    pub clock: ClockSnapshot,
}

impl GoRequest<'_> {
    pub fn side(&self) -> Side {
        self.setup.side
    }

    pub fn move_time(&self) -> Option<Duration> {
        self.clock.move_time
    }
}

/// Protocol-specific encoder/decoder. One instance per session.
pub trait ProtocolDriver: Send {
    /// Short protocol name for diagnostics.
    fn protocol(&self) -> &'static str;

    /// Bootstrap commands. Negotiation must end with a decoded
    /// [`PeerEvent::StartComplete`].
    fn start_session(&mut self) -> Vec<String>;

    /// Keepalive request, or `None` if the protocol (or this peer) has none.
    fn encode_ping(&mut self) -> Option<String>;

    fn encode_option_set(&self, name: &str, value: &OptionValue) -> String;

    fn encode_quit(&self) -> String;

    /// Peer option values that select `setup`'s variant. The session applies
    /// them through the option registry before the new-game commands, skipping
    /// options that already hold the wanted value.
    fn variant_options(&self, _setup: &GameSetup) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn encode_new_game(&mut self, setup: &GameSetup) -> Vec<String>;

    fn encode_go(&mut self, request: &GoRequest<'_>) -> Vec<String>;

    /// Forward an opponent move.
    fn encode_move(&mut self, mv: &str) -> Vec<String>;

    /// Ask the peer to stop computing and move now.
    fn encode_stop(&self) -> Option<String>;

    fn encode_result(&mut self, result: GameResult) -> Vec<String>;

    /// Decode one normalized line, appending zero or more events to `out`.
    fn decode_line(&mut self, line: &str, out: &mut Vec<PeerEvent>);
}

/// Outbound half of a transport, seen line by line.
pub trait LineSink {
    /// Queue one line (without terminator) for transmission.
    fn send_line(&mut self, line: &str);

    /// Close the transport. Further lines are dropped.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
