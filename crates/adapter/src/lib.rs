//! Adapter module - runs engine sessions over real transports with tokio
//!
//! The core crate decides *what* to say to an engine; this crate moves the
//! bytes. Each session runs in its own task:
//!
//! ```text
//!  engine stdout ──► LineDispatcher ──► EngineSession::on_line
//!                                            │
//!  EngineHandle ──► EngineCommand ───────────┤──► PeerNotification ──► controller
//!                                            │          └──► WireLog (optional)
//!  ping / move deadlines ────────────────────┘
//!                                            │
//!  engine stdin  ◄── writer task ◄── ChannelSink
//! ```
//!
//! # Module Structure
//!
//! - [`runtime`]: the session reactor, [`EngineHandle`] and [`launch`]
//! - [`dispatch`]: inbound line splitting and normalization
//! - [`transport`]: channel sink, writer task, engine child processes
//! - [`wire_log`]: append-only file log of every wire line
//! - [`config`]: [`EngineConfig`] from JSON files and the environment
//!
//! # Environment Variables
//!
//! - `ENGINE_LINK_CMD`: engine binary
//! - `ENGINE_LINK_ARGS`: engine arguments, whitespace separated
//! - `ENGINE_LINK_PROTOCOL`: `uci` (default) or `xboard`
//! - `ENGINE_LINK_NAME`: display name
//! - `ENGINE_LINK_LOG_PATH`: wire log file

pub mod config;
pub mod dispatch;
pub mod runtime;
pub mod transport;
pub mod wire_log;

pub use engine_link_core as core;
pub use engine_link_protocol as protocol;
pub use engine_link_types as types;

pub use config::EngineConfig;
pub use dispatch::{normalize_line, LineDispatcher};
pub use runtime::{launch, spawn_session, EngineCommand, EngineHandle};
pub use transport::{spawn_process, spawn_writer, ChannelSink, EngineProcess};
pub use wire_log::WireLog;
