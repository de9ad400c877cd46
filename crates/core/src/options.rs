//! Peer-declared configurable options.
//!
//! The engine declares its options during start-up; the registry keeps those
//! descriptors, validates set-requests against them and queues requests that
//! arrive before the declarations can have been received.

use std::fmt;

use crate::driver::LineSink;
use crate::lifecycle::EngineSession;
use crate::settings::EngineSettings;
use crate::types::PeerState;

/// Declared type and domain of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    Check { default: bool },
    Spin { default: i64, min: i64, max: i64 },
    Combo { default: String, choices: Vec<String> },
    /// Action without a value (e.g. "Clear Hash").
    Button,
    Text { default: String },
}

impl OptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Check { .. } => "check",
            OptionKind::Spin { .. } => "spin",
            OptionKind::Combo { .. } => "combo",
            OptionKind::Button => "button",
            OptionKind::Text { .. } => "string",
        }
    }

    fn default_value(&self) -> OptionValue {
        match self {
            OptionKind::Check { default } => OptionValue::Bool(*default),
            OptionKind::Spin { default, .. } => OptionValue::Int(*default),
            OptionKind::Combo { default, .. } => OptionValue::Text(default.clone()),
            OptionKind::Button => OptionValue::Trigger,
            OptionKind::Text { default } => OptionValue::Text(default.clone()),
        }
    }

    /// Parse `raw` against this domain.
    pub fn parse_value(&self, raw: &str) -> Result<OptionValue, String> {
        match self {
            OptionKind::Check { .. } => {
                if raw.eq_ignore_ascii_case("true") {
                    Ok(OptionValue::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Ok(OptionValue::Bool(false))
                } else {
                    Err("expected true or false".to_string())
                }
            }
            OptionKind::Spin { min, max, .. } => {
                let v = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| "expected an integer".to_string())?;
                if v < *min || v > *max {
                    return Err(format!("out of range [{}, {}]", min, max));
                }
                Ok(OptionValue::Int(v))
            }
            OptionKind::Combo { choices, .. } => {
                if choices.iter().any(|c| c == raw) {
                    Ok(OptionValue::Text(raw.to_string()))
                } else {
                    Err(format!("expected one of: {}", choices.join(", ")))
                }
            }
            OptionKind::Button => Ok(OptionValue::Trigger),
            OptionKind::Text { .. } => Ok(OptionValue::Text(raw.to_string())),
        }
    }
}

/// Typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Trigger,
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Text(v) => f.write_str(v),
            OptionValue::Trigger => Ok(()),
        }
    }
}

/// One option as declared by the peer, with its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub name: String,
    pub kind: OptionKind,
    pub value: OptionValue,
}

impl OptionDescriptor {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        let value = kind.default_value();
        Self {
            name: name.into(),
            kind,
            value,
        }
    }

    pub fn check(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, OptionKind::Check { default })
    }

    pub fn spin(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        Self::new(name, OptionKind::Spin { default, min, max })
    }

    pub fn combo(name: impl Into<String>, default: impl Into<String>, choices: Vec<String>) -> Self {
        Self::new(
            name,
            OptionKind::Combo {
                default: default.into(),
                choices,
            },
        )
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Button)
    }

    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(
            name,
            OptionKind::Text {
                default: default.into(),
            },
        )
    }

    pub fn is_valid(&self, raw: &str) -> bool {
        self.kind.parse_value(raw).is_ok()
    }
}

/// Set-request received before the peer declared its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOptionRequest {
    pub name: String,
    pub value: String,
}

/// Recoverable option failures. The session keeps running after either.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("{peer} doesn't have option {name}")]
    Unknown { peer: String, name: String },

    #[error("invalid value for option {name}: {value} ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// What `set_option` did with an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOptionOutcome {
    /// Validated, stored and sent to the peer.
    Applied,
    /// Queued until the peer finishes start-up.
    Deferred,
    /// Session already disconnected.
    Ignored,
}

/// Declared options plus requests waiting for start-up to finish.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    declared: Vec<OptionDescriptor>,
    deferred: Vec<PendingOptionRequest>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration. A repeated name replaces the earlier one.
    pub fn declare(&mut self, descriptor: OptionDescriptor) {
        match self.declared.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.declared.push(descriptor),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionDescriptor> {
        self.declared.iter().find(|d| d.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut OptionDescriptor> {
        self.declared.iter_mut().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.declared.iter()
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn defer(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.deferred.push(PendingOptionRequest {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn deferred(&self) -> &[PendingOptionRequest] {
        &self.deferred
    }

    /// Remove and return deferred requests in arrival order.
    pub fn take_deferred(&mut self) -> Vec<PendingOptionRequest> {
        std::mem::take(&mut self.deferred)
    }

    /// Validate `raw` against the declared option and store it.
    pub fn assign(&mut self, peer: &str, name: &str, raw: &str) -> Result<OptionValue, OptionError> {
        let Some(descriptor) = self.get_mut(name) else {
            return Err(OptionError::Unknown {
                peer: peer.to_string(),
                name: name.to_string(),
            });
        };
        let value = descriptor
            .kind
            .parse_value(raw)
            .map_err(|reason| OptionError::InvalidValue {
                name: name.to_string(),
                value: raw.to_string(),
                reason,
            })?;
        descriptor.value = value.clone();
        Ok(value)
    }
}

impl<S: LineSink> EngineSession<S> {
    pub fn get_option(&self, name: &str) -> Option<&OptionDescriptor> {
        self.options.get(name)
    }

    pub fn options(&self) -> &OptionRegistry {
        &self.options
    }

    /// Set a peer option.
    ///
    /// Before the peer is ready the request is queued unvalidated and replayed
    /// when start-up completes.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<SetOptionOutcome, OptionError> {
        if self.state.before_ready() {
            self.options.defer(name, value);
            return Ok(SetOptionOutcome::Deferred);
        }
        if self.state == PeerState::Disconnected {
            return Ok(SetOptionOutcome::Ignored);
        }

        let value = match self.options.assign(&self.name, name, value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(peer = %self.name, id = %self.id, "{}", e);
                return Err(e);
            }
        };
        let line = self.driver.encode_option_set(name, &value);
        self.write(line);
        Ok(SetOptionOutcome::Applied)
    }

    /// Bring a peer option to `value` unless it already holds it.
    pub(crate) fn sync_option(&mut self, name: &str, value: &str) {
        let unchanged = self
            .options
            .get(name)
            .and_then(|d| d.kind.parse_value(value).ok().map(|v| v == d.value))
            .unwrap_or(false);
        if !unchanged {
            // Failures are logged by set_option.
            let _ = self.set_option(name, value);
        }
    }

    /// Replay requests queued before start-up, in arrival order, once.
    pub(crate) fn replay_deferred_options(&mut self) {
        for request in self.options.take_deferred() {
            // Failures are already logged; a replay has no caller to report to.
            let _ = self.set_option(&request.name, &request.value);
        }
    }

    /// Apply configured settings: raw init lines, custom options, time control
    /// and evaluation point of view.
    pub fn apply_settings(&mut self, settings: &EngineSettings) {
        for line in &settings.init_strings {
            self.write(line.clone());
        }

        for setting in &settings.custom_settings {
            let _ = self.set_option(&setting.name, &setting.value);
        }

        if let Some(tc) = settings.time_control.filter(|tc| tc.is_valid()) {
            self.clock.set_time_control(tc);
        }
        self.white_eval_pov = settings.white_eval_pov;
    }
}
