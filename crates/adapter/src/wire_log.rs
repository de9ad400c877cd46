//! Optional wire log: every line to and from an engine, appended to a file
//! by a dedicated task so the session never waits on disk.

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use engine_link_core::DebugLine;

#[derive(Debug, Clone)]
pub struct WireLog {
    tx: mpsc::UnboundedSender<DebugLine>,
}

impl WireLog {
    /// Start the log task. Lines are appended to `path`, created if missing.
    /// If the file cannot be opened the log is silently disabled.
    pub fn spawn(path: impl Into<String>) -> (Self, JoinHandle<()>) {
        let path = path.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<DebugLine>();

        let task = tokio::spawn(async move {
            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!("wire log {} unavailable: {}", path, e);
                    return;
                }
            };

            let mut buf = String::with_capacity(256);
            while let Some(line) = rx.recv().await {
                buf.clear();
                buf.push_str(&line.to_string());
                buf.push('\n');
                if file.write_all(buf.as_bytes()).await.is_err() {
                    break;
                }
            }

            let _ = file.flush().await;
        });

        (Self { tx }, task)
    }

    pub fn record(&self, line: &DebugLine) {
        let _ = self.tx.send(line.clone());
    }
}
