//! XBoard / CECP version 2 driver.
//!
//! Unlike UCI the engine keeps its own board. Moves are forwarded one by one
//! while the engine sits in force mode, and `go` hands it the side to move.
//! Keepalive is only available once the engine has accepted `ping=1`.

use std::time::Duration;

use engine_link_core::types::{GameResult, Score};
use engine_link_core::{
    GameSetup, GoRequest, OptionDescriptor, OptionValue, PeerEvent, ProtocolDriver,
};

/// Features this driver understands. Anything else is rejected.
const KNOWN_FEATURES: [&str; 22] = [
    "ping", "setboard", "playother", "san", "usermove", "time", "draw", "sigint", "sigterm",
    "reuse", "analyze", "myname", "variants", "colors", "ics", "name", "pause", "nps", "debug",
    "memory", "smp", "option",
];

/// Offset XBoard engines add to mate scores.
const MATE_SCORE: i32 = 100_000;

#[derive(Debug, Clone)]
pub struct XboardDriver {
    ping_enabled: bool,
    ping_serial: u32,
    usermove: bool,
    setboard: bool,
    forced: bool,
    level_sent: bool,
}

impl Default for XboardDriver {
    fn default() -> Self {
        Self {
            ping_enabled: false,
            ping_serial: 0,
            usermove: false,
            setboard: false,
            forced: true,
            level_sent: false,
        }
    }
}

impl XboardDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn variant_name(variant: &str) -> &str {
        match variant {
            GameSetup::STANDARD_VARIANT => "normal",
            "chess960" => "fischerandom",
            v => v,
        }
    }

    fn canonical_variant(variant: &str) -> String {
        match variant {
            "normal" => GameSetup::STANDARD_VARIANT.to_string(),
            "fischerandom" => "chess960".to_string(),
            v => v.to_string(),
        }
    }

    fn decode_features(&mut self, rest: &str, out: &mut Vec<PeerEvent>) {
        let mut done = false;
        for (key, value) in parse_features(rest) {
            let accepted = match key {
                "done" => {
                    done = value == "1";
                    continue;
                }
                "ping" => {
                    self.ping_enabled = value == "1";
                    true
                }
                "usermove" => {
                    self.usermove = value == "1";
                    true
                }
                "setboard" => {
                    self.setboard = value == "1";
                    true
                }
                // Moves are opaque coordinate strings; no SAN conversion here.
                "san" => value == "0",
                "myname" => {
                    out.push(PeerEvent::Name(value.to_string()));
                    true
                }
                "variants" => {
                    out.push(PeerEvent::VariantsDeclared(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(Self::canonical_variant)
                            .collect(),
                    ));
                    true
                }
                "option" => match parse_option(value) {
                    Some(option) => {
                        out.push(PeerEvent::OptionDeclared(option));
                        true
                    }
                    None => {
                        tracing::warn!("unsupported option feature: {}", value);
                        false
                    }
                },
                k => KNOWN_FEATURES.contains(&k),
            };

            let verdict = if accepted { "accepted" } else { "rejected" };
            out.push(PeerEvent::Reply(format!("{} {}", verdict, key)));
        }

        if done {
            out.push(PeerEvent::StartComplete);
        }
    }

    /// Thinking output: `ply score time nodes pv`.
    fn decode_thinking(line: &str, out: &mut Vec<PeerEvent>) -> bool {
        let mut tokens = line.split_whitespace();
        let ply = tokens.next().map(|t| t.trim_end_matches(['.', '&']));
        if ply.and_then(|p| p.parse::<u32>().ok()).is_none() {
            return false;
        }
        let Some(score) = tokens.next().and_then(|s| s.parse::<i32>().ok()) else {
            return false;
        };

        let Some(magnitude) = score.checked_abs() else {
            return false;
        };
        let score = if magnitude >= MATE_SCORE {
            let plies = magnitude - MATE_SCORE;
            let moves = (plies + 1) / 2;
            Score::Mate(if score > 0 { moves } else { -moves })
        } else {
            Score::Cp(score)
        };
        out.push(PeerEvent::Eval(score));
        true
    }
}

/// Split `k1=v1 k2="quoted value" ...` into pairs.
fn parse_features(rest: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut s = rest.trim_start();
    while let Some(eq) = s.find('=') {
        let key = s[..eq].trim();
        let after = &s[eq + 1..];
        let (value, next) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(' ') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };
        pairs.push((key, value));
        s = next.trim_start();
    }
    pairs
}

/// Parse an option feature body: `Name -type args...`.
fn parse_option(body: &str) -> Option<OptionDescriptor> {
    let (name, spec) = body.split_once(" -")?;
    let name = name.trim();
    let (kind, args) = spec.split_once(' ').unwrap_or((spec, ""));
    let args = args.trim();

    let descriptor = match kind {
        "check" => OptionDescriptor::check(name, args == "1"),
        "spin" | "slider" => {
            let mut nums = args.split_whitespace().map(|n| n.parse::<i64>());
            let default = nums.next()?.ok()?;
            let min = nums.next()?.ok()?;
            let max = nums.next()?.ok()?;
            if min > max {
                return None;
            }
            OptionDescriptor::spin(name, default.clamp(min, max), min, max)
        }
        "combo" => {
            let mut default = None;
            let choices: Vec<String> = args
                .split("///")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| match c.strip_prefix('*') {
                    Some(c) => {
                        default = Some(c.to_string());
                        c.to_string()
                    }
                    None => c.to_string(),
                })
                .collect();
            let default = default.or_else(|| choices.first().cloned())?;
            OptionDescriptor::combo(name, default, choices)
        }
        "button" | "save" | "reset" => OptionDescriptor::button(name),
        "string" | "file" | "path" => OptionDescriptor::text(name, args),
        _ => return None,
    };
    Some(descriptor)
}

fn centiseconds(d: Duration) -> u128 {
    d.as_millis() / 10
}

impl ProtocolDriver for XboardDriver {
    fn protocol(&self) -> &'static str {
        "xboard"
    }

    fn start_session(&mut self) -> Vec<String> {
        vec!["xboard".to_string(), "protover 2".to_string()]
    }

    fn encode_ping(&mut self) -> Option<String> {
        if !self.ping_enabled {
            return None;
        }
        self.ping_serial += 1;
        Some(format!("ping {}", self.ping_serial))
    }

    fn encode_option_set(&self, name: &str, value: &OptionValue) -> String {
        match value {
            OptionValue::Trigger => format!("option {}", name),
            OptionValue::Bool(b) => format!("option {}={}", name, u8::from(*b)),
            v => format!("option {}={}", name, v),
        }
    }

    fn encode_quit(&self) -> String {
        "quit".to_string()
    }

    fn encode_new_game(&mut self, setup: &GameSetup) -> Vec<String> {
        self.forced = true;
        self.level_sent = false;

        let mut lines = vec!["new".to_string(), "force".to_string()];
        if !setup.is_standard() {
            lines.push(format!("variant {}", Self::variant_name(&setup.variant)));
        }
        if let Some(fen) = &setup.start_fen {
            if self.setboard {
                lines.push(format!("setboard {}", fen));
            } else {
                tracing::warn!("engine does not support setboard; starting from the initial position");
            }
        }
        lines.push("post".to_string());
        lines
    }

    fn encode_go(&mut self, request: &GoRequest<'_>) -> Vec<String> {
        let clock = &request.clock;
        let mut lines = Vec::with_capacity(3);

        if !self.level_sent {
            self.level_sent = true;
            if let Some(move_time) = clock.move_time {
                lines.push(format!("st {}", move_time.as_secs().max(1)));
            } else if let Some(time_left) = clock.time_left {
                let secs = time_left.as_secs();
                lines.push(format!(
                    "level {} {}:{:02} {}",
                    clock.moves_to_go.unwrap_or(0),
                    secs / 60,
                    secs % 60,
                    clock.increment.as_secs()
                ));
            }
        }
        if let Some(time_left) = clock.time_left {
            lines.push(format!("time {}", centiseconds(time_left)));
        }

        self.forced = false;
        lines.push("go".to_string());
        lines
    }

    fn encode_move(&mut self, mv: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(2);
        if !self.forced {
            // Keep the engine from answering on its own; `go` decides when it moves.
            self.forced = true;
            lines.push("force".to_string());
        }
        if self.usermove {
            lines.push(format!("usermove {}", mv));
        } else {
            lines.push(mv.to_string());
        }
        lines
    }

    fn encode_stop(&self) -> Option<String> {
        Some("?".to_string())
    }

    fn encode_result(&mut self, result: GameResult) -> Vec<String> {
        self.forced = true;
        let reason = match result {
            GameResult::WhiteWins => "White wins",
            GameResult::BlackWins => "Black wins",
            GameResult::Draw => "Draw",
            GameResult::NoResult => "No result",
        };
        vec![format!("result {} {{{}}}", result.as_pgn(), reason)]
    }

    fn decode_line(&mut self, line: &str, out: &mut Vec<PeerEvent>) {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "feature" => self.decode_features(rest, out),
            "pong" => {
                if rest.trim().parse::<u32>().ok() == Some(self.ping_serial) {
                    out.push(PeerEvent::Pong);
                } else {
                    tracing::debug!("stale pong: {}", line);
                }
            }
            "move" => out.push(PeerEvent::Move(rest.trim().to_string())),
            "tellusererror" => out.push(PeerEvent::Error(rest.to_string())),
            "telluser" | "tellics" | "tellall" | "tellothers" => {
                out.push(PeerEvent::Info(rest.to_string()))
            }
            _ if command.starts_with("Error") || line.starts_with("Illegal move") => {
                out.push(PeerEvent::Error(line.to_string()))
            }
            _ if command.starts_with('#') => {}
            _ => {
                if !Self::decode_thinking(line, out) {
                    out.push(PeerEvent::Info(line.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_link_core::types::Side;
    use engine_link_core::ClockSnapshot;

    fn decode(driver: &mut XboardDriver, line: &str) -> Vec<PeerEvent> {
        let mut out = Vec::new();
        driver.decode_line(line, &mut out);
        out
    }

    #[test]
    fn test_feature_negotiation() {
        let mut driver = XboardDriver::new();
        assert_eq!(
            driver.start_session(),
            vec!["xboard".to_string(), "protover 2".to_string()]
        );
        assert_eq!(driver.encode_ping(), None);

        let events = decode(
            &mut driver,
            r#"feature ping=1 setboard=1 myname="Crafty 25.2" variants="normal,fischerandom" frobnicate=1"#,
        );
        assert_eq!(
            events,
            vec![
                PeerEvent::Reply("accepted ping".to_string()),
                PeerEvent::Reply("accepted setboard".to_string()),
                PeerEvent::Name("Crafty 25.2".to_string()),
                PeerEvent::Reply("accepted myname".to_string()),
                PeerEvent::VariantsDeclared(vec!["standard".to_string(), "chess960".to_string()]),
                PeerEvent::Reply("accepted variants".to_string()),
                PeerEvent::Reply("rejected frobnicate".to_string()),
            ]
        );

        assert_eq!(
            decode(&mut driver, "feature done=1"),
            vec![PeerEvent::StartComplete]
        );
        assert!(decode(&mut driver, "feature done=0").is_empty());
    }

    #[test]
    fn test_ping_serials() {
        let mut driver = XboardDriver::new();
        decode(&mut driver, "feature ping=1");
        assert_eq!(driver.encode_ping(), Some("ping 1".to_string()));
        assert!(decode(&mut driver, "pong 0").is_empty());
        assert_eq!(decode(&mut driver, "pong 1"), vec![PeerEvent::Pong]);
        assert_eq!(driver.encode_ping(), Some("ping 2".to_string()));
        assert!(decode(&mut driver, "pong 1").is_empty());
    }

    #[test]
    fn test_option_features() {
        let mut driver = XboardDriver::new();
        let events = decode(
            &mut driver,
            r#"feature option="Hash -spin 64 1 4096" option="Ponder -check 0" option="Style -combo Solid /// *Normal /// Risky" option="Clear Hash -button""#,
        );
        let declared: Vec<_> = events
            .into_iter()
            .filter_map(|e| match e {
                PeerEvent::OptionDeclared(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(
            declared,
            vec![
                OptionDescriptor::spin("Hash", 64, 1, 4096),
                OptionDescriptor::check("Ponder", false),
                OptionDescriptor::combo(
                    "Style",
                    "Normal",
                    vec!["Solid".to_string(), "Normal".to_string(), "Risky".to_string()]
                ),
                OptionDescriptor::button("Clear Hash"),
            ]
        );
        assert_eq!(
            driver.encode_option_set("Hash", &OptionValue::Int(128)),
            "option Hash=128"
        );
        assert_eq!(
            driver.encode_option_set("Ponder", &OptionValue::Bool(true)),
            "option Ponder=1"
        );
        assert_eq!(
            driver.encode_option_set("Clear Hash", &OptionValue::Trigger),
            "option Clear Hash"
        );
    }

    #[test]
    fn test_bad_features_are_rejected() {
        let mut driver = XboardDriver::new();
        let events = decode(
            &mut driver,
            r#"feature option="W -spin 5 10 1" option="Nameless" option="Q -spin x 1 2" frob=1 done=1"#,
        );
        assert_eq!(
            events,
            vec![
                PeerEvent::Reply("rejected option".to_string()),
                PeerEvent::Reply("rejected option".to_string()),
                PeerEvent::Reply("rejected option".to_string()),
                PeerEvent::Reply("rejected frob".to_string()),
                PeerEvent::StartComplete,
            ]
        );

        // Unterminated quotes and empty keys do not derail the parser.
        let events = decode(&mut driver, r#"feature myname="Half =1"#);
        assert_eq!(
            events,
            vec![
                PeerEvent::Name("Half =1".to_string()),
                PeerEvent::Reply("accepted myname".to_string()),
            ]
        );
        assert_eq!(
            decode(&mut driver, "feature =1"),
            vec![PeerEvent::Reply("rejected ".to_string())]
        );
    }

    #[test]
    fn test_extreme_scores() {
        let mut driver = XboardDriver::new();
        assert_eq!(
            decode(&mut driver, "1 -2147483648 0 0 e2e4"),
            vec![PeerEvent::Info("1 -2147483648 0 0 e2e4".to_string())]
        );
        assert_eq!(
            decode(&mut driver, "1 2147483647 0 0 e2e4"),
            vec![PeerEvent::Eval(Score::Mate((i32::MAX - MATE_SCORE + 1) / 2))]
        );
        assert_eq!(
            decode(&mut driver, "1 -100001 0 0 e2e4"),
            vec![PeerEvent::Eval(Score::Mate(-1))]
        );
        assert_eq!(
            decode(&mut driver, "3 99999999999 0 0 e2e4"),
            vec![PeerEvent::Info("3 99999999999 0 0 e2e4".to_string())]
        );
        assert!(decode(&mut driver, "pong").is_empty());
    }

    #[test]
    fn test_game_commands() {
        let mut driver = XboardDriver::new();
        decode(&mut driver, "feature usermove=1 setboard=1");

        let setup = GameSetup::new(Side::White)
            .with_variant("chess960")
            .with_fen("bqnbrkrn/pppppppp/8/8/8/8/PPPPPPPP/BQNBRKRN w GEge - 0 1");
        assert_eq!(
            driver.encode_new_game(&setup),
            vec![
                "new".to_string(),
                "force".to_string(),
                "variant fischerandom".to_string(),
                "setboard bqnbrkrn/pppppppp/8/8/8/8/PPPPPPPP/BQNBRKRN w GEge - 0 1".to_string(),
                "post".to_string(),
            ]
        );

        assert_eq!(driver.encode_move("e2e4"), vec!["usermove e2e4".to_string()]);

        let request = GoRequest {
            setup: &setup,
            moves: &[],
            clock: ClockSnapshot {
                time_left: Some(Duration::from_secs(300)),
                increment: Duration::from_secs(2),
                moves_to_go: None,
                move_time: None,
            },
        };
        assert_eq!(
            driver.encode_go(&request),
            vec!["level 0 5:00 2".to_string(), "time 30000".to_string(), "go".to_string()]
        );
        assert_eq!(
            driver.encode_go(&request),
            vec!["time 30000".to_string(), "go".to_string()]
        );

        assert_eq!(
            driver.encode_move("e7e5"),
            vec!["force".to_string(), "usermove e7e5".to_string()]
        );
        assert_eq!(driver.encode_stop(), Some("?".to_string()));
        assert_eq!(
            driver.encode_result(GameResult::Draw),
            vec!["result 1/2-1/2 {Draw}".to_string()]
        );
    }

    #[test]
    fn test_engine_output() {
        let mut driver = XboardDriver::new();
        assert_eq!(
            decode(&mut driver, "move e7e5"),
            vec![PeerEvent::Move("e7e5".to_string())]
        );
        assert!(matches!(
            decode(&mut driver, "Illegal move: e2e5").as_slice(),
            [PeerEvent::Error(_)]
        ));
        assert!(matches!(
            decode(&mut driver, "Error (unknown command): frob").as_slice(),
            [PeerEvent::Error(_)]
        ));
        assert_eq!(
            decode(&mut driver, "tellusererror Out of memory"),
            vec![PeerEvent::Error("Out of memory".to_string())]
        );
        assert_eq!(
            decode(&mut driver, "12 -45 104 123456 e7e5 g1f3"),
            vec![PeerEvent::Eval(Score::Cp(-45))]
        );
        assert_eq!(
            decode(&mut driver, "9. 100005 50 9999 Qh5"),
            vec![PeerEvent::Eval(Score::Mate(3))]
        );
        assert!(decode(&mut driver, "# debug chatter").is_empty());
        assert_eq!(
            decode(&mut driver, "resign"),
            vec![PeerEvent::Info("resign".to_string())]
        );
    }
}
