//! Outbound transport: a channel-backed [`LineSink`] drained by a writer
//! task, and engine child processes.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use engine_link_core::LineSink;

use crate::config::EngineConfig;

/// Sink half of the writer channel. Closing it drops the sender, which lets
/// the writer task drain what is queued and shut the stream down.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx: Some(tx) }
    }
}

impl LineSink for ChannelSink {
    fn send_line(&mut self, line: &str) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(line.to_string());
        }
    }

    fn close(&mut self) {
        self.tx = None;
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}

/// Spawn a task that writes queued lines to `writer`, one `\n`-terminated
/// line at a time, flushing after each.
pub fn spawn_writer<W>(mut writer: W) -> (ChannelSink, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let task = tokio::spawn(async move {
        let mut buf: Vec<u8> = Vec::with_capacity(256);
        while let Some(line) = rx.recv().await {
            buf.clear();
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
            if writer.write_all(&buf).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    (ChannelSink::new(tx), task)
}

/// A launched engine binary with piped stdio.
pub struct EngineProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// Launch the engine described by `config`. The child is killed if its
/// handle is dropped.
pub fn spawn_process(config: &EngineConfig) -> Result<EngineProcess> {
    let mut command = Command::new(&config.command);
    command
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to launch engine {:?}", config.command))?;
    let stdin = child.stdin.take().context("engine stdin not captured")?;
    let stdout = child.stdout.take().context("engine stdout not captured")?;

    tracing::info!(
        command = %config.command,
        pid = ?child.id(),
        "engine process started"
    );
    Ok(EngineProcess {
        child,
        stdin,
        stdout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_writer_terminates_lines_and_shuts_down_on_close() {
        let (client, server) = tokio::io::duplex(256);
        let (mut sink, task) = spawn_writer(client);

        sink.send_line("uci");
        sink.send_line("isready");
        sink.close();
        assert!(!sink.is_open());
        sink.send_line("dropped");

        task.await.unwrap();
        let mut lines = BufReader::new(server).lines();
        assert_eq!(lines.next_line().await.unwrap(), Some("uci".to_string()));
        assert_eq!(lines.next_line().await.unwrap(), Some("isready".to_string()));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = EngineConfig {
                command: "/nonexistent/engine-link-test-binary".to_string(),
                ..EngineConfig::default()
            };
            let err = spawn_process(&config).err().unwrap();
            assert!(err.to_string().contains("failed to launch engine"));
        });
    }
}
