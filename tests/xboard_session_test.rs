use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_test::assert_ok;

use engine_link::adapter::{spawn_session, EngineHandle};
use engine_link::core::{GameSetup, OptionKind, PeerNotification, SetOptionOutcome};
use engine_link::protocol::ProtocolKind;
use engine_link::types::{GameResult, PeerState, Side};

type EngineLines = Lines<BufReader<ReadHalf<DuplexStream>>>;

async fn read_line(lines: &mut EngineLines) -> String {
    timeout(Duration::from_secs(2), lines.next_line())
        .await
        .expect("timeout")
        .expect("io error")
        .expect("expected line")
}

async fn send(writer: &mut WriteHalf<DuplexStream>, line: &str) {
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    writer.flush().await.unwrap();
}

async fn next_matching(
    events: &mut UnboundedReceiver<PeerNotification>,
    mut pred: impl FnMut(&PeerNotification) -> bool,
) -> PeerNotification {
    loop {
        let n = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timeout")
            .expect("notification channel closed");
        if pred(&n) {
            return n;
        }
    }
}

struct Harness {
    handle: EngineHandle,
    events: UnboundedReceiver<PeerNotification>,
    lines: EngineLines,
    writer: WriteHalf<DuplexStream>,
}

fn spawn_xboard() -> Harness {
    let (engine_side, adapter_side) = tokio::io::duplex(4096);
    let (reader, writer) = tokio::io::split(adapter_side);
    let (handle, events, _task) =
        spawn_session(reader, writer, ProtocolKind::Xboard.create_driver(), "", None);
    let (engine_read, engine_write) = tokio::io::split(engine_side);
    Harness {
        handle,
        events,
        lines: BufReader::new(engine_read).lines(),
        writer: engine_write,
    }
}

async fn negotiate(h: &mut Harness, features: &str) -> Vec<String> {
    h.handle.start();
    assert_eq!(read_line(&mut h.lines).await, "xboard");
    assert_eq!(read_line(&mut h.lines).await, "protover 2");
    send(&mut h.writer, features).await;

    let mut replies = Vec::new();
    let expected = features.matches('=').count() - usize::from(features.contains("done="));
    while replies.len() < expected {
        replies.push(read_line(&mut h.lines).await);
    }
    next_matching(&mut h.events, |n| *n == PeerNotification::Ready).await;
    replies
}

#[tokio::test]
async fn feature_negotiation_is_acknowledged() {
    let mut h = spawn_xboard();
    let replies = negotiate(
        &mut h,
        r#"feature ping=1 setboard=1 usermove=1 san=1 myname="Crafty 25.2" variants="normal,fischerandom" option="Hash -spin 64 1 1024" done=1"#,
    )
    .await;

    assert_eq!(
        replies,
        vec![
            "accepted ping",
            "accepted setboard",
            "accepted usermove",
            "rejected san",
            "accepted myname",
            "accepted variants",
            "accepted option",
        ]
    );
    assert_eq!(h.handle.name().await.as_deref(), Some("Crafty 25.2"));
    assert!(h.handle.supports_variant("chess960").await);
    assert!(h.handle.supports_variant("standard").await);
    assert!(!h.handle.supports_variant("atomic").await);

    let hash = h.handle.get_option("Hash").await.expect("Hash declared");
    assert!(matches!(hash.kind, OptionKind::Spin { default: 64, min: 1, max: 1024 }));

    let outcome = assert_ok!(h.handle.set_option("Hash", "256").await);
    assert_eq!(outcome, SetOptionOutcome::Applied);
    assert_eq!(read_line(&mut h.lines).await, "option Hash=256");
}

#[tokio::test]
async fn xboard_game_round_trip() {
    let mut h = spawn_xboard();
    negotiate(&mut h, "feature ping=1 usermove=1 done=1").await;

    h.handle.new_game(GameSetup::new(Side::Black));
    assert_eq!(read_line(&mut h.lines).await, "new");
    assert_eq!(read_line(&mut h.lines).await, "force");
    assert_eq!(read_line(&mut h.lines).await, "post");

    h.handle.make_move("e2e4");
    assert_eq!(read_line(&mut h.lines).await, "usermove e2e4");

    // `go` waits behind the probe.
    h.handle.go();
    assert_eq!(read_line(&mut h.lines).await, "ping 1");
    assert!(!h.handle.is_ready().await);
    send(&mut h.writer, "pong 1").await;
    assert_eq!(read_line(&mut h.lines).await, "go");

    send(&mut h.writer, "9 31 120 118423 e7e5 g1f3").await;
    send(&mut h.writer, "move e7e5").await;
    let eval = next_matching(&mut h.events, |n| matches!(n, PeerNotification::Eval(_))).await;
    assert!(matches!(eval, PeerNotification::Eval(_)));
    let mv = next_matching(&mut h.events, |n| matches!(n, PeerNotification::Move(_))).await;
    assert_eq!(mv, PeerNotification::Move("e7e5".to_string()));
    assert_eq!(h.handle.state().await, Some(PeerState::Observing));

    // Moves after `go` put the engine back into force mode first.
    h.handle.make_move("g1f3");
    assert_eq!(read_line(&mut h.lines).await, "force");
    assert_eq!(read_line(&mut h.lines).await, "usermove g1f3");

    h.handle.end_game(GameResult::WhiteWins);
    assert_eq!(read_line(&mut h.lines).await, "result 1-0 {White wins}");
    assert_eq!(read_line(&mut h.lines).await, "ping 2");
    assert_eq!(h.handle.state().await, Some(PeerState::FinishingGame));

    // An answer to an older ping does not settle anything.
    send(&mut h.writer, "pong 1").await;
    assert_eq!(h.handle.state().await, Some(PeerState::FinishingGame));

    send(&mut h.writer, "pong 2").await;
    next_matching(&mut h.events, |n| *n == PeerNotification::Ready).await;
    assert_eq!(h.handle.state().await, Some(PeerState::Idle));

    h.handle.quit();
    assert_eq!(read_line(&mut h.lines).await, "quit");
}

#[tokio::test]
async fn engine_without_ping_settles_immediately() {
    let mut h = spawn_xboard();
    negotiate(&mut h, "feature done=1").await;
    assert_eq!(h.handle.variants().await, vec!["standard".to_string()]);

    h.handle.new_game(GameSetup::new(Side::White));
    for expected in ["new", "force", "post"] {
        assert_eq!(read_line(&mut h.lines).await, expected);
    }

    // No keepalive: `go` goes straight out.
    h.handle.go();
    assert_eq!(read_line(&mut h.lines).await, "go");
    send(&mut h.writer, "move e2e4").await;
    next_matching(&mut h.events, |n| matches!(n, PeerNotification::Move(_))).await;

    h.handle.end_game(GameResult::Draw);
    assert_eq!(read_line(&mut h.lines).await, "result 1/2-1/2 {Draw}");
    next_matching(&mut h.events, |n| *n == PeerNotification::Ready).await;
    assert_eq!(h.handle.state().await, Some(PeerState::Idle));
}

#[tokio::test]
async fn engine_errors_are_reported() {
    let mut h = spawn_xboard();
    negotiate(&mut h, "feature done=1").await;

    send(&mut h.writer, "Illegal move: e2e5").await;
    let err = next_matching(&mut h.events, |n| matches!(n, PeerNotification::Error(_))).await;
    assert_eq!(err, PeerNotification::Error("Illegal move: e2e5".to_string()));

    send(&mut h.writer, "telluser book exhausted").await;
    let info = next_matching(&mut h.events, |n| matches!(n, PeerNotification::Info(_))).await;
    assert_eq!(info, PeerNotification::Info("book exhausted".to_string()));
}
