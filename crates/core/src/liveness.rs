//! Liveness probes (ping/pong).
//!
//! A probe is a keepalive round-trip with a fixed 10 second deadline. While a
//! probe is outstanding, ordinary writes wait in the write buffer and the
//! session reports itself as not ready. A peer that misses the deadline is
//! closed and forfeits the game with cause "stalled connection".
//!
//! The deadline is a plain [`Instant`]; whoever drives the session sleeps
//! until [`EngineSession::ping_deadline`] and then calls
//! [`EngineSession::on_ping_timeout`]. Clearing the probe cancels the timer.

use std::time::Duration;

use tokio::time::Instant;

use crate::driver::LineSink;
use crate::lifecycle::{EngineSession, PeerNotification};
use crate::types::{ForfeitCause, PeerState, MAX_SETTLE_REPROBES, PING_TIMEOUT_MS};

pub const PING_TIMEOUT: Duration = Duration::from_millis(PING_TIMEOUT_MS);

/// An outstanding probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPing {
    /// Peer state when the probe was issued.
    pub state_at_ping: PeerState,
    pub deadline: Instant,
    /// Re-probes already issued for the current end-of-game settlement.
    pub reprobes: u32,
}

/// Liveness bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Probe {
    #[default]
    None,
    /// Start-up negotiation in progress: blocks writes and readiness, has no
    /// deadline and is not answered by a pong.
    StartupHold,
    Outstanding(PendingPing),
}

impl Probe {
    /// True while writes must be buffered.
    pub fn is_active(&self) -> bool {
        !matches!(self, Probe::None)
    }

    pub fn pending(&self) -> Option<&PendingPing> {
        match self {
            Probe::Outstanding(p) => Some(p),
            _ => None,
        }
    }
}

impl<S: LineSink> EngineSession<S> {
    /// Issue a liveness probe.
    ///
    /// No-op while another probe is active, before start, after disconnect,
    /// or when the protocol has no keepalive primitive.
    pub fn ping(&mut self) {
        self.issue_ping(0);
    }

    fn issue_ping(&mut self, reprobes: u32) -> bool {
        if self.probe.is_active()
            || matches!(self.state, PeerState::NotStarted | PeerState::Disconnected)
        {
            return false;
        }
        let Some(line) = self.driver.encode_ping() else {
            return false;
        };

        self.probe = Probe::Outstanding(PendingPing {
            state_at_ping: self.state,
            deadline: Instant::now() + PING_TIMEOUT,
            reprobes,
        });
        // Pings skip the buffer: they exist to detect a peer that stopped reading.
        self.transmit(&line);
        true
    }

    pub fn ping_deadline(&self) -> Option<Instant> {
        self.probe.pending().map(|p| p.deadline)
    }

    pub fn pending_ping(&self) -> Option<&PendingPing> {
        self.probe.pending()
    }

    /// Handle the peer's answer to the outstanding probe.
    pub fn pong(&mut self) {
        let Probe::Outstanding(pending) = self.probe else {
            return;
        };
        self.probe = Probe::None;
        self.flush_write_buffer();

        if self.state == PeerState::FinishingGame {
            let settled = pending.state_at_ping == PeerState::FinishingGame
                || pending.reprobes >= MAX_SETTLE_REPROBES;
            if !settled && self.issue_ping(pending.reprobes + 1) {
                // The game changed while the probe was in flight; this answer
                // says nothing about the end-of-game handshake.
                return;
            }
            if pending.reprobes >= MAX_SETTLE_REPROBES {
                tracing::warn!(
                    peer = %self.name,
                    id = %self.id,
                    "settling after {} re-probes",
                    pending.reprobes
                );
            }
            self.set_state(PeerState::Idle);
        }

        let _ = self.events.send(PeerNotification::Ready);
    }

    /// The probe deadline passed without a pong.
    pub fn on_ping_timeout(&mut self) {
        if !matches!(self.probe, Probe::Outstanding(_)) {
            return;
        }
        tracing::warn!(peer = %self.name, id = %self.id, "engine failed to respond to ping");

        self.probe = Probe::None;
        self.write_buffer.clear();
        self.close_connection();
        self.set_state(PeerState::Disconnected);

        let _ = self
            .events
            .send(PeerNotification::Forfeit(ForfeitCause::StalledConnection));
    }
}
