//! Engine peer lifecycle.
//!
//! [`EngineSession`] owns the authoritative [`PeerState`] of one engine and
//! every piece of bookkeeping that depends on it. It is sans-IO: the caller
//! feeds inbound lines and deadline expiries, the session answers through its
//! [`LineSink`] and a notification channel.
//!
//! State transitions:
//!
//! | from                    | trigger             | to            |
//! |-------------------------|---------------------|---------------|
//! | NotStarted              | `start`             | Starting      |
//! | Starting                | start complete      | Idle          |
//! | Idle, FinishingGame     | `new_game`          | Observing     |
//! | Observing               | `go`                | Thinking      |
//! | Thinking                | decoded move        | Observing     |
//! | Observing, Thinking     | `end_game`          | FinishingGame |
//! | FinishingGame           | settling pong       | Idle          |
//! | any                     | quit/timeout/EOF    | Disconnected  |

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

use crate::driver::{GameSetup, GoRequest, LineSink, PeerEvent, ProtocolDriver};
use crate::identity::next_peer_id;
use crate::liveness::Probe;
use crate::options::OptionRegistry;
use crate::settings::GameClock;
use crate::types::{Direction, ForfeitCause, GameResult, PeerId, PeerState, Score, Side};
use crate::write_buffer::WriteBuffer;

/// One wire line, as seen by a debug observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLine {
    pub direction: Direction,
    pub peer: String,
    pub id: PeerId,
    pub text: String,
}

impl fmt::Display for DebugLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}({}): {}",
            self.direction.marker(),
            self.peer,
            self.id,
            self.text
        )
    }
}

/// Signals sent to the game controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerNotification {
    /// The peer may be ready; re-check `is_ready`.
    Ready,
    Forfeit(ForfeitCause),
    Move(String),
    Eval(Score),
    Info(String),
    Error(String),
    Debug(DebugLine),
    Disconnected,
}

pub struct EngineSession<S: LineSink> {
    pub(crate) id: PeerId,
    pub(crate) name: String,
    pub(crate) state: PeerState,
    pub(crate) driver: Box<dyn ProtocolDriver>,
    pub(crate) sink: S,
    pub(crate) events: UnboundedSender<PeerNotification>,
    pub(crate) probe: Probe,
    pub(crate) write_buffer: WriteBuffer,
    pub(crate) options: OptionRegistry,
    pub(crate) variants: Vec<String>,
    /// Cleared once the session stops caring about the transport closing.
    pub(crate) watch_disconnect: bool,
    pub(crate) setup: Option<GameSetup>,
    pub(crate) moves: Vec<String>,
    pub(crate) clock: GameClock,
    pub(crate) move_deadline: Option<Instant>,
    pub(crate) white_eval_pov: bool,
    decode_buf: Vec<PeerEvent>,
}

impl<S: LineSink> EngineSession<S> {
    pub fn new(
        name: impl Into<String>,
        driver: Box<dyn ProtocolDriver>,
        sink: S,
        events: UnboundedSender<PeerNotification>,
    ) -> Self {
        Self {
            id: next_peer_id(),
            name: name.into(),
            state: PeerState::NotStarted,
            driver,
            sink,
            events,
            probe: Probe::None,
            write_buffer: WriteBuffer::new(),
            options: OptionRegistry::new(),
            variants: Vec::new(),
            watch_disconnect: true,
            setup: None,
            moves: Vec::new(),
            clock: GameClock::default(),
            move_deadline: None,
            white_eval_pov: false,
            decode_buf: Vec::with_capacity(4),
        }
    }

    /// Create a session together with its notification receiver.
    pub fn with_channel(
        name: impl Into<String>,
        driver: Box<dyn ProtocolDriver>,
        sink: S,
    ) -> (Self, UnboundedReceiver<PeerNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(name, driver, sink, tx), rx)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn protocol(&self) -> &'static str {
        self.driver.protocol()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn white_eval_pov(&self) -> bool {
        self.white_eval_pov
    }

    pub fn setup(&self) -> Option<&GameSetup> {
        self.setup.as_ref()
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn supports_variant(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }

    /// When the current move must be cut short, if a move is being computed
    /// under a time control.
    pub fn move_deadline(&self) -> Option<Instant> {
        self.move_deadline
    }

    /// False while a probe or the start-up hold is active; otherwise ready
    /// unless starting, computing a move or finishing a game.
    pub fn is_ready(&self) -> bool {
        if self.probe.is_active() {
            return false;
        }
        matches!(
            self.state,
            PeerState::Idle | PeerState::Observing | PeerState::Disconnected
        )
    }

    pub(crate) fn set_state(&mut self, state: PeerState) {
        if self.state == state {
            return;
        }
        tracing::info!(
            peer = %self.name,
            id = %self.id,
            "{} -> {}",
            self.state,
            state
        );
        self.state = state;
        if state == PeerState::Disconnected {
            let _ = self.events.send(PeerNotification::Disconnected);
        }
    }

    /// Begin start-up negotiation. Only valid once, from NotStarted.
    pub fn start(&mut self) {
        if self.state != PeerState::NotStarted {
            return;
        }
        self.probe = Probe::None;
        self.set_state(PeerState::Starting);
        self.flush_write_buffer();

        for line in self.driver.start_session() {
            self.write(line);
        }
        // Nothing else goes out until the driver reports start completion.
        self.probe = Probe::StartupHold;
    }

    fn on_start_complete(&mut self) {
        if self.state != PeerState::Starting {
            return;
        }
        self.probe = Probe::None;
        if !self.supports_variant(GameSetup::STANDARD_VARIANT) {
            // Every engine plays standard chess whether or not it says so.
            self.variants.insert(0, GameSetup::STANDARD_VARIANT.to_string());
        }
        self.set_state(PeerState::Idle);
        self.flush_write_buffer();
        self.replay_deferred_options();
        let _ = self.events.send(PeerNotification::Ready);
    }

    /// Prepare the peer for a new game.
    pub fn new_game(&mut self, setup: GameSetup) {
        if !matches!(self.state, PeerState::Idle | PeerState::FinishingGame) {
            tracing::warn!(peer = %self.name, id = %self.id, "new game while {}", self.state);
            return;
        }
        for (name, value) in self.driver.variant_options(&setup) {
            self.sync_option(name, &value);
        }
        let lines = self.driver.encode_new_game(&setup);
        self.setup = Some(setup);
        self.moves.clear();
        self.clock.reset();
        self.move_deadline = None;
        self.set_state(PeerState::Observing);
        for line in lines {
            self.write(line);
        }
    }

    /// Ask the peer to compute a move for the current position.
    pub fn go(&mut self) {
        if self.state != PeerState::Observing {
            return;
        }
        self.ping();

        let Some(setup) = self.setup.as_ref() else {
            return;
        };
        let request = GoRequest {
            setup,
            moves: &self.moves,
            clock: self.clock.snapshot(),
        };
        let lines = self.driver.encode_go(&request);

        let now = Instant::now();
        self.set_state(PeerState::Thinking);
        self.clock.start(now);
        self.move_deadline = self.clock.move_budget().map(|budget| now + budget);
        for line in lines {
            self.write(line);
        }
    }

    /// Forward a move played by the opponent.
    pub fn make_move(&mut self, mv: &str) {
        if !self.state.in_game() {
            return;
        }
        self.moves.push(mv.to_string());
        for line in self.driver.encode_move(mv) {
            self.write(line);
        }
    }

    /// The move budget ran out: tell the peer to move now.
    pub fn on_move_timeout(&mut self) {
        if self.move_deadline.take().is_none() || self.state != PeerState::Thinking {
            return;
        }
        tracing::debug!(peer = %self.name, id = %self.id, "move time expired");
        if let Some(line) = self.driver.encode_stop() {
            self.write(line);
        }
    }

    fn on_engine_move(&mut self, mv: String) {
        if self.state != PeerState::Thinking {
            tracing::warn!(peer = %self.name, id = %self.id, "unexpected move {} while {}", mv, self.state);
            return;
        }
        let elapsed = self.clock.stop(Instant::now());
        tracing::debug!(peer = %self.name, id = %self.id, "move {} after {:?}", mv, elapsed);
        self.move_deadline = None;
        self.moves.push(mv.clone());
        self.set_state(PeerState::Observing);
        let _ = self.events.send(PeerNotification::Move(mv));
    }

    /// Report the result and settle once the peer confirms it is listening.
    pub fn end_game(&mut self, result: GameResult) {
        if !self.state.in_game() {
            return;
        }
        self.clock.stop(Instant::now());
        self.move_deadline = None;
        self.set_state(PeerState::FinishingGame);
        for line in self.driver.encode_result(result) {
            self.write(line);
        }

        self.ping();
        if !self.probe.is_active() {
            // No keepalive primitive: nothing to wait for.
            self.set_state(PeerState::Idle);
            let _ = self.events.send(PeerNotification::Ready);
        }
    }

    /// Drop the transport without changing state.
    pub fn close_connection(&mut self) {
        if self.state == PeerState::Disconnected {
            return;
        }
        self.probe = Probe::None;
        self.move_deadline = None;
        self.write_buffer.clear();
        let _ = self.events.send(PeerNotification::Ready);
        self.watch_disconnect = false;
        self.sink.close();
    }

    /// Ask the peer to exit.
    pub fn quit(&mut self) {
        if !self.sink.is_open() || self.state == PeerState::Disconnected {
            return;
        }
        self.watch_disconnect = false;
        self.probe = Probe::None;
        self.move_deadline = None;
        self.write_buffer.clear();

        let line = self.driver.encode_quit();
        self.transmit(&line);
        self.set_state(PeerState::Disconnected);
    }

    /// The transport closed underneath the session.
    pub fn on_disconnect(&mut self) {
        if !self.watch_disconnect || self.state == PeerState::Disconnected {
            return;
        }
        let in_game = self.state.in_game();
        tracing::warn!(peer = %self.name, id = %self.id, "connection closed while {}", self.state);

        self.probe = Probe::None;
        self.move_deadline = None;
        self.write_buffer.clear();
        self.watch_disconnect = false;
        self.sink.close();
        self.set_state(PeerState::Disconnected);

        if in_game {
            let _ = self
                .events
                .send(PeerNotification::Forfeit(ForfeitCause::Disconnection));
        }
        let _ = self.events.send(PeerNotification::Ready);
    }

    /// Feed one normalized inbound line.
    pub fn on_line(&mut self, line: &str) {
        tracing::debug!(peer = %self.name, id = %self.id, "<{}", line);
        let _ = self.events.send(PeerNotification::Debug(DebugLine {
            direction: Direction::Inbound,
            peer: self.name.clone(),
            id: self.id,
            text: line.to_string(),
        }));

        let mut events = std::mem::take(&mut self.decode_buf);
        self.driver.decode_line(line, &mut events);
        for event in events.drain(..) {
            self.apply_event(event);
        }
        self.decode_buf = events;
    }

    fn apply_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::StartComplete => self.on_start_complete(),
            PeerEvent::Pong => self.pong(),
            PeerEvent::Name(name) => {
                if self.name.is_empty() {
                    self.name = name;
                }
            }
            PeerEvent::OptionDeclared(descriptor) => self.options.declare(descriptor),
            PeerEvent::VariantsDeclared(variants) => {
                for variant in variants {
                    if !self.supports_variant(&variant) {
                        self.variants.push(variant);
                    }
                }
            }
            PeerEvent::Move(mv) => self.on_engine_move(mv),
            PeerEvent::Eval(score) => {
                let black = self.setup.as_ref().is_some_and(|s| s.side == Side::Black);
                let score = if self.white_eval_pov && black {
                    score.negate()
                } else {
                    score
                };
                let _ = self.events.send(PeerNotification::Eval(score));
            }
            PeerEvent::Reply(line) => {
                // Protocol handshakes are answered even during the start-up hold.
                if self.state != PeerState::Disconnected {
                    self.transmit(&line);
                }
            }
            PeerEvent::Error(text) => {
                tracing::warn!(peer = %self.name, id = %self.id, "engine error: {}", text);
                let _ = self.events.send(PeerNotification::Error(text));
            }
            PeerEvent::Info(text) => {
                let _ = self.events.send(PeerNotification::Info(text));
            }
        }
    }
}

impl<S: LineSink> fmt::Debug for EngineSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("protocol", &self.driver.protocol())
            .field("state", &self.state)
            .field("probe", &self.probe)
            .field("buffered", &self.write_buffer.len())
            .finish()
    }
}
