//! Session reactor.
//!
//! One task owns one [`EngineSession`] and processes one event at a time:
//! an inbound line, a controller command, the ping deadline or the move
//! deadline. Controllers talk to it through a cloneable [`EngineHandle`].

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use engine_link_core::types::{GameResult, PeerId, PeerState};
use engine_link_core::{
    EngineSession, EngineSettings, GameSetup, LineSink, OptionDescriptor, OptionError,
    PeerNotification, ProtocolDriver, SetOptionOutcome,
};

use crate::config::EngineConfig;
use crate::dispatch::LineDispatcher;
use crate::transport::{spawn_process, spawn_writer, ChannelSink};
use crate::wire_log::WireLog;

/// How long a process gets to exit on its own after the session ends.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Request delivered to the session task.
#[derive(Debug)]
pub enum EngineCommand {
    Start,
    ApplySettings(EngineSettings),
    NewGame(GameSetup),
    Go,
    MakeMove(String),
    EndGame(GameResult),
    Ping,
    Write(String),
    Quit,
    CloseConnection,
    SetOption {
        name: String,
        value: String,
        reply: oneshot::Sender<Result<SetOptionOutcome, OptionError>>,
    },
    GetOption {
        name: String,
        reply: oneshot::Sender<Option<OptionDescriptor>>,
    },
    Options {
        reply: oneshot::Sender<Vec<OptionDescriptor>>,
    },
    Variants {
        reply: oneshot::Sender<Vec<String>>,
    },
    SupportsVariant {
        variant: String,
        reply: oneshot::Sender<bool>,
    },
    IsReady {
        reply: oneshot::Sender<bool>,
    },
    State {
        reply: oneshot::Sender<PeerState>,
    },
    Name {
        reply: oneshot::Sender<String>,
    },
}

/// Controller-side handle. Calls made after the session ended are ignored;
/// queries then return `None`, `false` or an empty list.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    id: PeerId,
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// True once the session task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.tx.send(command);
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).ok()?;
        rx.await.ok()
    }

    pub fn start(&self) {
        self.send(EngineCommand::Start);
    }

    pub fn apply_settings(&self, settings: EngineSettings) {
        self.send(EngineCommand::ApplySettings(settings));
    }

    pub fn new_game(&self, setup: GameSetup) {
        self.send(EngineCommand::NewGame(setup));
    }

    pub fn go(&self) {
        self.send(EngineCommand::Go);
    }

    pub fn make_move(&self, mv: impl Into<String>) {
        self.send(EngineCommand::MakeMove(mv.into()));
    }

    pub fn end_game(&self, result: GameResult) {
        self.send(EngineCommand::EndGame(result));
    }

    pub fn ping(&self) {
        self.send(EngineCommand::Ping);
    }

    /// Send a raw protocol line through the write buffer.
    pub fn write(&self, line: impl Into<String>) {
        self.send(EngineCommand::Write(line.into()));
    }

    pub fn quit(&self) {
        self.send(EngineCommand::Quit);
    }

    pub fn close_connection(&self) {
        self.send(EngineCommand::CloseConnection);
    }

    pub async fn set_option(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<SetOptionOutcome, OptionError> {
        let (name, value) = (name.into(), value.into());
        self.query(|reply| EngineCommand::SetOption { name, value, reply })
            .await
            .unwrap_or(Ok(SetOptionOutcome::Ignored))
    }

    pub async fn get_option(&self, name: impl Into<String>) -> Option<OptionDescriptor> {
        let name = name.into();
        self.query(|reply| EngineCommand::GetOption { name, reply })
            .await
            .flatten()
    }

    pub async fn options(&self) -> Vec<OptionDescriptor> {
        self.query(|reply| EngineCommand::Options { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn variants(&self) -> Vec<String> {
        self.query(|reply| EngineCommand::Variants { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn supports_variant(&self, variant: impl Into<String>) -> bool {
        let variant = variant.into();
        self.query(|reply| EngineCommand::SupportsVariant { variant, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn is_ready(&self) -> bool {
        self.query(|reply| EngineCommand::IsReady { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn state(&self) -> Option<PeerState> {
        self.query(|reply| EngineCommand::State { reply }).await
    }

    pub async fn name(&self) -> Option<String> {
        self.query(|reply| EngineCommand::Name { reply }).await
    }
}

fn apply_command(session: &mut EngineSession<ChannelSink>, command: EngineCommand) {
    match command {
        EngineCommand::Start => session.start(),
        EngineCommand::ApplySettings(settings) => session.apply_settings(&settings),
        EngineCommand::NewGame(setup) => session.new_game(setup),
        EngineCommand::Go => session.go(),
        EngineCommand::MakeMove(mv) => session.make_move(&mv),
        EngineCommand::EndGame(result) => session.end_game(result),
        EngineCommand::Ping => session.ping(),
        EngineCommand::Write(line) => session.write(line),
        EngineCommand::Quit => session.quit(),
        EngineCommand::CloseConnection => session.close_connection(),
        EngineCommand::SetOption { name, value, reply } => {
            let _ = reply.send(session.set_option(&name, &value));
        }
        EngineCommand::GetOption { name, reply } => {
            let _ = reply.send(session.get_option(&name).cloned());
        }
        EngineCommand::Options { reply } => {
            let _ = reply.send(session.options().iter().cloned().collect());
        }
        EngineCommand::Variants { reply } => {
            let _ = reply.send(session.variants().to_vec());
        }
        EngineCommand::SupportsVariant { variant, reply } => {
            let _ = reply.send(session.supports_variant(&variant));
        }
        EngineCommand::IsReady { reply } => {
            let _ = reply.send(session.is_ready());
        }
        EngineCommand::State { reply } => {
            let _ = reply.send(session.state());
        }
        EngineCommand::Name { reply } => {
            let _ = reply.send(session.name().to_string());
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run an adapter over an arbitrary byte stream pair.
///
/// Returns the controller handle, the notification stream and the session
/// task. The task ends once the session is disconnected or its transport
/// closed, or when every handle has been dropped (the engine is then asked
/// to quit).
pub fn spawn_session<R, W>(
    reader: R,
    writer: W,
    driver: Box<dyn ProtocolDriver>,
    name: impl Into<String>,
    wire_log: Option<WireLog>,
) -> (
    EngineHandle,
    mpsc::UnboundedReceiver<PeerNotification>,
    JoinHandle<()>,
)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sink, writer_task) = spawn_writer(writer);
    let (session, mut internal_rx) = EngineSession::with_channel(name, driver, sink);
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<EngineCommand>();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<PeerNotification>();
    let handle = EngineHandle {
        id: session.id(),
        tx: cmd_tx,
    };

    let task = tokio::spawn(async move {
        let mut session = session;
        let mut dispatcher = LineDispatcher::new(reader);
        let mut eof = false;

        tracing::debug!(peer = %session.name(), id = %session.id(), protocol = session.protocol(), "session task started");

        loop {
            let ping_deadline = session.ping_deadline();
            let move_deadline = session.move_deadline();

            tokio::select! {
                line = dispatcher.next_line(), if !eof => match line {
                    Some(line) => session.on_line(&line),
                    None => {
                        eof = true;
                        session.on_disconnect();
                    }
                },
                command = cmd_rx.recv() => match command {
                    Some(command) => apply_command(&mut session, command),
                    None => session.quit(),
                },
                _ = sleep_until_opt(ping_deadline) => session.on_ping_timeout(),
                _ = sleep_until_opt(move_deadline) => session.on_move_timeout(),
            }

            while let Ok(notification) = internal_rx.try_recv() {
                if let (Some(log), PeerNotification::Debug(line)) = (&wire_log, &notification) {
                    log.record(line);
                }
                let _ = events_tx.send(notification);
            }

            if session.state() == PeerState::Disconnected || !session.sink().is_open() {
                break;
            }
        }

        tracing::debug!(peer = %session.name(), id = %session.id(), "session task finished");
        drop(session);
        let _ = writer_task.await;
    });

    (handle, events_rx, task)
}

/// Launch the engine process described by `config` and run a session for it.
///
/// The process is waited for after the session ends and killed if it does
/// not exit within a few seconds.
pub fn launch(
    config: &EngineConfig,
) -> anyhow::Result<(EngineHandle, mpsc::UnboundedReceiver<PeerNotification>, JoinHandle<()>)> {
    let process = spawn_process(config)?;
    let wire_log = config.log_path.as_ref().map(|path| WireLog::spawn(path.clone()).0);

    let (handle, events, session_task) = spawn_session(
        process.stdout,
        process.stdin,
        config.protocol.create_driver(),
        config.name.clone(),
        wire_log,
    );

    let mut child = process.child;
    let task = tokio::spawn(async move {
        let _ = session_task.await;
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => tracing::info!("engine exited with {}", status),
            Ok(Err(e)) => tracing::warn!("failed to wait for engine: {}", e),
            Err(_) => {
                tracing::warn!("engine did not exit in time, killing it");
                let _ = child.kill().await;
            }
        }
    });

    Ok((handle, events, task))
}
