//! Outbound write path and the FIFO used while the peer cannot take input.

use std::collections::VecDeque;

use crate::driver::LineSink;
use crate::lifecycle::{DebugLine, EngineSession, PeerNotification};
use crate::types::{Direction, PeerState};

/// Lines waiting for the peer to become writable, oldest first.
#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    queue: VecDeque<String>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.queue.push_back(line);
    }

    /// Take every queued line, leaving the buffer empty.
    pub fn take(&mut self) -> VecDeque<String> {
        std::mem::take(&mut self.queue)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.queue.iter()
    }
}

impl<S: LineSink> EngineSession<S> {
    /// True while outbound lines must wait in the buffer.
    pub fn writes_blocked(&self) -> bool {
        self.state == PeerState::NotStarted || self.probe.is_active()
    }

    /// Send a line to the peer, or queue it if the peer cannot take it yet.
    /// Dropped silently once disconnected.
    pub fn write(&mut self, line: impl Into<String>) {
        if self.state == PeerState::Disconnected {
            return;
        }
        let line = line.into();
        if self.writes_blocked() {
            self.write_buffer.push(line);
            return;
        }
        self.transmit(&line);
    }

    /// Drain the buffer in FIFO order if writes are open.
    ///
    /// The queue is detached before the first line goes out, so nothing issued
    /// during the drain can interleave with it.
    pub fn flush_write_buffer(&mut self) {
        if self.writes_blocked() {
            return;
        }
        for line in self.write_buffer.take() {
            self.transmit(&line);
        }
    }

    pub fn write_buffer(&self) -> &WriteBuffer {
        &self.write_buffer
    }

    /// Put a line on the wire, bypassing the buffer.
    pub(crate) fn transmit(&mut self, line: &str) {
        if !self.sink.is_open() {
            return;
        }
        tracing::debug!(peer = %self.name, id = %self.id, ">{}", line);
        let _ = self.events.send(PeerNotification::Debug(DebugLine {
            direction: Direction::Outbound,
            peer: self.name.clone(),
            id: self.id,
            text: line.to_string(),
        }));
        self.sink.send_line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ready_session, RecordingSink, ScriptedDriver};

    #[test]
    fn test_writes_before_start_are_queued_then_flushed_in_order() {
        let (mut session, _rx) = EngineSession::with_channel(
            "scripted",
            Box::new(ScriptedDriver::default()),
            RecordingSink::default(),
        );

        session.write("a");
        session.write("b");
        session.write("c");
        assert!(session.sink().lines().is_empty());
        assert_eq!(session.write_buffer().len(), 3);

        session.start();
        assert_eq!(
            session.sink().lines(),
            &["a".to_string(), "b".to_string(), "c".to_string(), "hello".to_string()]
        );
        assert!(session.write_buffer().is_empty());
    }

    #[test]
    fn test_writes_during_probe_keep_fifo_order() {
        let (mut session, _rx) = ready_session(vec![]);
        session.sink_mut().clear();

        session.ping();
        for i in 0..5 {
            session.write(format!("line {}", i));
        }
        assert_eq!(session.sink().lines(), &["ping".to_string()]);

        session.on_line("pong");
        let expected: Vec<String> = std::iter::once("ping".to_string())
            .chain((0..5).map(|i| format!("line {}", i)))
            .collect();
        assert_eq!(session.sink().lines(), expected.as_slice());
    }

    #[test]
    fn test_write_after_disconnect_is_dropped() {
        let (mut session, _rx) = ready_session(vec![]);
        session.quit();
        session.sink_mut().clear();
        session.write("go");
        assert!(session.sink().lines().is_empty());
        assert!(session.write_buffer().is_empty());
    }

    #[test]
    fn test_transmit_emits_debug_line() {
        let (mut session, mut rx) = ready_session(vec![]);
        while rx.try_recv().is_ok() {}

        session.write("isready");
        let mut debug = None;
        while let Ok(n) = rx.try_recv() {
            if let PeerNotification::Debug(d) = n {
                debug = Some(d);
            }
        }
        let debug = debug.expect("expected debug notification");
        assert_eq!(debug.direction, Direction::Outbound);
        assert_eq!(debug.text, "isready");
        assert_eq!(debug.to_string(), format!(">scripted({}): isready", session.id()));
    }
}
