//! Inbound line splitting.
//!
//! Engines write whatever they like: CRLF terminators, tabs, runs of spaces,
//! the occasional invalid UTF-8 byte. [`LineDispatcher`] turns the raw stream
//! into normalized, non-empty lines for [`EngineSession::on_line`].
//!
//! [`EngineSession::on_line`]: engine_link_core::EngineSession::on_line

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Collapse whitespace runs to one space and trim. `None` for blank lines.
pub fn normalize_line(raw: &str) -> Option<String> {
    let mut line = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    (!line.is_empty()).then_some(line)
}

pub struct LineDispatcher<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineDispatcher<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::with_capacity(256),
        }
    }

    /// Next normalized line, or `None` once the stream is closed.
    ///
    /// Cancel safe: a partially read line stays buffered for the next call.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            let n = match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("engine read failed: {}", e);
                    return None;
                }
            };
            if n == 0 && self.buf.is_empty() {
                return None;
            }

            let line = normalize_line(&String::from_utf8_lossy(&self.buf));
            self.buf.clear();
            if line.is_some() {
                return line;
            }
            if n == 0 {
                return None;
            }
        }
    }
}
