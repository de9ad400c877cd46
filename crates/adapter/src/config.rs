//! Engine launch configuration.
//!
//! Sources, lowest priority first: built-in defaults, a JSON file, the
//! environment. Command-line flags are applied on top by the binary.
//!
//! | variable               | field        |
//! |------------------------|--------------|
//! | `ENGINE_LINK_CMD`      | `command`    |
//! | `ENGINE_LINK_ARGS`     | `args` (whitespace separated) |
//! | `ENGINE_LINK_PROTOCOL` | `protocol`   |
//! | `ENGINE_LINK_NAME`     | `name`       |
//! | `ENGINE_LINK_LOG_PATH` | `log_path`   |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use engine_link_core::EngineSettings;
use engine_link_protocol::ProtocolKind;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Display name; empty means "use the name the engine reports".
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub protocol: ProtocolKind,
    pub settings: EngineSettings,
    pub log_path: Option<String>,
}

impl EngineConfig {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid engine config {}", path.display()))
    }

    /// Overlay environment variables onto this configuration.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        if let Some(command) = var("ENGINE_LINK_CMD") {
            self.command = command;
        }
        if let Some(args) = var("ENGINE_LINK_ARGS") {
            self.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(protocol) = var("ENGINE_LINK_PROTOCOL") {
            match protocol.parse() {
                Ok(p) => self.protocol = p,
                Err(e) => tracing::warn!("ignoring ENGINE_LINK_PROTOCOL: {}", e),
            }
        }
        if let Some(name) = var("ENGINE_LINK_NAME") {
            self.name = name;
        }
        if let Some(path) = var("ENGINE_LINK_LOG_PATH") {
            self.log_path = Some(path);
        }
        self
    }

    /// Name to show before the engine has reported its own.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        Path::new(&self.command)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
