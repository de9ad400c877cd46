//! Wire protocol drivers for chess engines.
//!
//! | protocol | driver            | keepalive              |
//! |----------|-------------------|------------------------|
//! | UCI      | [`UciDriver`]     | `isready` / `readyok`  |
//! | XBoard   | [`XboardDriver`]  | `ping N` / `pong N`    |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use engine_link_core::ProtocolDriver;

pub mod uci;
pub mod xboard;

pub use uci::UciDriver;
pub use xboard::XboardDriver;

/// Protocol spoken by an engine binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    Uci,
    Xboard,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Uci => "uci",
            ProtocolKind::Xboard => "xboard",
        }
    }

    /// Fresh driver for one session.
    pub fn create_driver(self) -> Box<dyn ProtocolDriver> {
        match self {
            ProtocolKind::Uci => Box::new(UciDriver::new()),
            ProtocolKind::Xboard => Box::new(XboardDriver::new()),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uci" => Ok(ProtocolKind::Uci),
            "xboard" | "cecp" | "winboard" => Ok(ProtocolKind::Xboard),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}
