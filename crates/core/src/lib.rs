//! Core adapter module - the engine peer state machine, with no I/O of its own
//!
//! This crate holds everything needed to keep a conversation with a chess
//! engine consistent, without owning a socket, a process or a runtime:
//!
//! - **Sans-IO**: outbound lines go to a [`LineSink`], inbound lines are fed
//!   to [`EngineSession::on_line`], timers are plain deadlines the caller polls
//! - **Single owner**: one [`EngineSession`] is driven by exactly one task, so
//!   nothing inside it is locked
//! - **Protocol agnostic**: wire details live behind [`ProtocolDriver`]
//!
//! # Module Structure
//!
//! - [`lifecycle`]: the [`EngineSession`] state machine and its notifications
//! - [`liveness`]: ping/pong probes, the 10 second deadline, stalled-peer forfeits
//! - [`write_buffer`]: outbound FIFO used while the peer cannot accept input
//! - [`options`]: peer-declared options, validation and deferred requests
//! - [`driver`]: the [`ProtocolDriver`] and [`LineSink`] capabilities
//! - [`settings`]: engine settings, time controls and the game clock
//! - [`identity`]: process-wide session id generator
//!
//! # Example
//!
//! ```
//! use engine_link_core::{EngineSession, LineSink, PeerNotification};
//! use engine_link_protocol::UciDriver;
//! use engine_link_types::PeerState;
//!
//! #[derive(Default)]
//! struct Wire(Vec<String>);
//!
//! impl LineSink for Wire {
//!     fn send_line(&mut self, line: &str) {
//!         self.0.push(line.to_string());
//!     }
//!     fn close(&mut self) {}
//!     fn is_open(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let (mut session, mut notifications) =
//!     EngineSession::with_channel("demo", Box::new(UciDriver::new()), Wire::default());
//!
//! session.start();
//! assert_eq!(session.state(), PeerState::Starting);
//! assert_eq!(session.sink().0, ["uci"]);
//!
//! session.on_line("uciok");
//! assert_eq!(session.state(), PeerState::Idle);
//! assert!(session.is_ready());
//! assert!(session.supports_variant("standard"));
//! assert!(matches!(notifications.try_recv(), Ok(PeerNotification::Debug(_))));
//! ```

pub mod driver;
pub mod identity;
pub mod lifecycle;
pub mod liveness;
pub mod options;
pub mod settings;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod write_buffer;

pub use engine_link_types as types;

pub use driver::{GameSetup, GoRequest, LineSink, PeerEvent, ProtocolDriver};
pub use identity::next_peer_id;
pub use lifecycle::{DebugLine, EngineSession, PeerNotification};
pub use liveness::{PendingPing, Probe};
pub use options::{
    OptionDescriptor, OptionError, OptionKind, OptionRegistry, OptionValue, SetOptionOutcome,
};
pub use settings::{ClockSnapshot, CustomSetting, EngineSettings, GameClock, TimeControl};
pub use write_buffer::WriteBuffer;
