//! In-memory doubles for driving an [`EngineSession`] without a transport.
//!
//! [`ScriptedDriver`] speaks a tiny line protocol that keeps tests readable:
//!
//! | inbound                    | event                 |
//! |----------------------------|-----------------------|
//! | `ready`                    | `StartComplete`       |
//! | `pong`                     | `Pong`                |
//! | `option N spin D MIN MAX`  | `OptionDeclared`      |
//! | `option N check D`         | `OptionDeclared`      |
//! | `variants a,b`             | `VariantsDeclared`    |
//! | `bestmove X`               | `Move`                |
//! | `score N`                  | `Eval(Cp(N))`         |
//! | `name X`                   | `Name`                |
//! | `ask X`                    | `Reply`               |
//! | `error X`                  | `Error`               |
//! | anything else              | `Info`                |

use tokio::sync::mpsc::UnboundedReceiver;

use crate::driver::{GameSetup, GoRequest, LineSink, PeerEvent, ProtocolDriver};
use crate::lifecycle::{EngineSession, PeerNotification};
use crate::options::{OptionDescriptor, OptionValue};
use crate::types::{GameResult, Score};

/// Sink that keeps every line it is given.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    lines: Vec<String>,
    open: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            open: true,
        }
    }
}

impl RecordingSink {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_closed(&self) -> bool {
        !self.open
    }
}

impl LineSink for RecordingSink {
    fn send_line(&mut self, line: &str) {
        if self.open {
            self.lines.push(line.to_string());
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    ping_enabled: bool,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self { ping_enabled: true }
    }
}

impl ScriptedDriver {
    /// A peer with no keepalive primitive.
    pub fn without_ping() -> Self {
        Self {
            ping_enabled: false,
        }
    }

    fn decode_option(rest: &str) -> Option<OptionDescriptor> {
        let mut parts = rest.split_whitespace();
        let name = parts.next()?;
        match parts.next()? {
            "spin" => {
                let default = parts.next()?.parse().ok()?;
                let min = parts.next()?.parse().ok()?;
                let max = parts.next()?.parse().ok()?;
                Some(OptionDescriptor::spin(name, default, min, max))
            }
            "check" => Some(OptionDescriptor::check(name, parts.next()? == "true")),
            _ => None,
        }
    }
}

impl ProtocolDriver for ScriptedDriver {
    fn protocol(&self) -> &'static str {
        "scripted"
    }

    fn start_session(&mut self) -> Vec<String> {
        vec!["hello".to_string()]
    }

    fn encode_ping(&mut self) -> Option<String> {
        self.ping_enabled.then(|| "ping".to_string())
    }

    fn encode_option_set(&self, name: &str, value: &OptionValue) -> String {
        format!("setoption {} {}", name, value)
    }

    fn encode_quit(&self) -> String {
        "quit".to_string()
    }

    fn encode_new_game(&mut self, setup: &GameSetup) -> Vec<String> {
        vec![format!("new {}", setup.variant)]
    }

    fn encode_go(&mut self, _request: &GoRequest<'_>) -> Vec<String> {
        vec!["go".to_string()]
    }

    fn encode_move(&mut self, mv: &str) -> Vec<String> {
        vec![format!("move {}", mv)]
    }

    fn encode_stop(&self) -> Option<String> {
        Some("stop".to_string())
    }

    fn encode_result(&mut self, result: GameResult) -> Vec<String> {
        vec![format!("result {}", result.as_pgn())]
    }

    fn decode_line(&mut self, line: &str, out: &mut Vec<PeerEvent>) {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let event = match command {
            "ready" => PeerEvent::StartComplete,
            "pong" => PeerEvent::Pong,
            "option" => match Self::decode_option(rest) {
                Some(descriptor) => PeerEvent::OptionDeclared(descriptor),
                None => PeerEvent::Info(line.to_string()),
            },
            "variants" => PeerEvent::VariantsDeclared(
                rest.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "bestmove" => PeerEvent::Move(rest.to_string()),
            "score" => match rest.trim().parse() {
                Ok(cp) => PeerEvent::Eval(Score::Cp(cp)),
                Err(_) => PeerEvent::Info(line.to_string()),
            },
            "name" => PeerEvent::Name(rest.to_string()),
            "ask" => PeerEvent::Reply(rest.to_string()),
            "error" => PeerEvent::Error(rest.to_string()),
            _ => PeerEvent::Info(line.to_string()),
        };
        out.push(event);
    }
}

/// A started session that has declared `options` and completed start-up.
pub fn ready_session(
    options: Vec<OptionDescriptor>,
) -> (
    EngineSession<RecordingSink>,
    UnboundedReceiver<PeerNotification>,
) {
    let (mut session, rx) = EngineSession::with_channel(
        "scripted",
        Box::new(ScriptedDriver::default()),
        RecordingSink::default(),
    );
    session.start();
    for option in options {
        session.options.declare(option);
    }
    session.on_line("ready");
    (session, rx)
}

/// Collect every notification currently queued.
pub fn drain(rx: &mut UnboundedReceiver<PeerNotification>) -> Vec<PeerNotification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
