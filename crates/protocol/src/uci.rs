//! Universal Chess Interface driver.
//!
//! UCI is stateless on the engine side: the full position is sent with every
//! `go`, so forwarded moves only extend the local move list.

use std::time::Duration;

use engine_link_core::types::{GameResult, Score, Side};
use engine_link_core::{
    GameSetup, GoRequest, OptionDescriptor, OptionKind, OptionValue, PeerEvent, ProtocolDriver,
};

const VARIANT_OPTION: &str = "UCI_Variant";
const CHESS960_OPTION: &str = "UCI_Chess960";
const CHESS960: &str = "chess960";

const OPTION_KEYWORDS: [&str; 6] = ["name", "type", "default", "min", "max", "var"];

#[derive(Debug, Clone, Default)]
pub struct UciDriver {
    has_variant_option: bool,
    has_chess960_option: bool,
}

impl UciDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_option(&mut self, rest: &str, out: &mut Vec<PeerEvent>) {
        let Some(option) = parse_option(rest) else {
            tracing::warn!("malformed option declaration: {}", rest);
            out.push(PeerEvent::Info(format!("option {}", rest)));
            return;
        };

        match option.name.as_str() {
            VARIANT_OPTION => {
                self.has_variant_option = true;
                if let OptionKind::Combo { choices, .. } = &option.kind {
                    let mut variants = vec![GameSetup::STANDARD_VARIANT.to_string()];
                    variants.extend(
                        choices
                            .iter()
                            .filter(|c| c.as_str() != "chess")
                            .cloned(),
                    );
                    out.push(PeerEvent::VariantsDeclared(variants));
                }
            }
            CHESS960_OPTION => {
                self.has_chess960_option = true;
                out.push(PeerEvent::VariantsDeclared(vec![
                    GameSetup::STANDARD_VARIANT.to_string(),
                    CHESS960.to_string(),
                ]));
            }
            _ => {}
        }
        out.push(PeerEvent::OptionDeclared(option));
    }

    fn decode_info(rest: &str, out: &mut Vec<PeerEvent>) {
        if let Some(text) = rest.strip_prefix("string ") {
            out.push(PeerEvent::Info(text.to_string()));
            return;
        }

        let mut tokens = rest.split_whitespace();
        while let Some(token) = tokens.next() {
            if token != "score" {
                continue;
            }
            let kind = tokens.next();
            let value = tokens.next().and_then(|v| v.parse::<i32>().ok());
            match (kind, value) {
                (Some("cp"), Some(v)) => out.push(PeerEvent::Eval(Score::Cp(v))),
                (Some("mate"), Some(v)) => out.push(PeerEvent::Eval(Score::Mate(v))),
                _ => {}
            }
            return;
        }
    }
}

/// Parse the part of an `option` line after the command word.
fn parse_option(rest: &str) -> Option<OptionDescriptor> {
    let mut name = Vec::new();
    let mut kind = None;
    let mut default = Vec::new();
    let mut min = None;
    let mut max = None;
    let mut vars: Vec<Vec<&str>> = Vec::new();

    let mut current = "";
    for token in rest.split_whitespace() {
        if OPTION_KEYWORDS.contains(&token) {
            current = token;
            if token == "var" {
                vars.push(Vec::new());
            }
            continue;
        }
        match current {
            "name" => name.push(token),
            "type" => kind = Some(token),
            "default" => default.push(token),
            "min" => min = token.parse::<i64>().ok(),
            "max" => max = token.parse::<i64>().ok(),
            "var" => {
                if let Some(var) = vars.last_mut() {
                    var.push(token);
                }
            }
            _ => return None,
        }
    }

    if name.is_empty() {
        return None;
    }
    let name = name.join(" ");
    let default = match default.join(" ").as_str() {
        "<empty>" => String::new(),
        d => d.to_string(),
    };

    let descriptor = match kind? {
        "check" => OptionDescriptor::check(name, default.eq_ignore_ascii_case("true")),
        "spin" => {
            let (min, max) = (min?, max?);
            if min > max {
                return None;
            }
            let value = default.parse::<i64>().ok()?.clamp(min, max);
            OptionDescriptor::spin(name, value, min, max)
        }
        "combo" => {
            let choices: Vec<String> = vars.into_iter().map(|v| v.join(" ")).collect();
            OptionDescriptor::combo(name, default, choices)
        }
        "button" => OptionDescriptor::button(name),
        "string" => OptionDescriptor::text(name, default),
        _ => return None,
    };
    Some(descriptor)
}

fn millis(d: Duration) -> u128 {
    d.as_millis()
}

impl ProtocolDriver for UciDriver {
    fn protocol(&self) -> &'static str {
        "uci"
    }

    fn start_session(&mut self) -> Vec<String> {
        vec!["uci".to_string()]
    }

    fn encode_ping(&mut self) -> Option<String> {
        Some("isready".to_string())
    }

    fn encode_option_set(&self, name: &str, value: &OptionValue) -> String {
        match value {
            OptionValue::Trigger => format!("setoption name {}", name),
            v => format!("setoption name {} value {}", name, v),
        }
    }

    fn encode_quit(&self) -> String {
        "quit".to_string()
    }

    fn variant_options(&self, setup: &GameSetup) -> Vec<(&'static str, String)> {
        let chess960 = setup.variant == CHESS960 && self.has_chess960_option;
        let mut options = Vec::with_capacity(2);
        if self.has_chess960_option {
            options.push((CHESS960_OPTION, chess960.to_string()));
        }
        if self.has_variant_option {
            let variant = if setup.is_standard() || chess960 {
                "chess"
            } else {
                setup.variant.as_str()
            };
            options.push((VARIANT_OPTION, variant.to_string()));
        }
        options
    }

    fn encode_new_game(&mut self, _setup: &GameSetup) -> Vec<String> {
        vec!["ucinewgame".to_string()]
    }

    fn encode_go(&mut self, request: &GoRequest<'_>) -> Vec<String> {
        let mut position = match &request.setup.start_fen {
            Some(fen) => format!("position fen {}", fen),
            None => "position startpos".to_string(),
        };
        if !request.moves.is_empty() {
            position.push_str(" moves ");
            position.push_str(&request.moves.join(" "));
        }

        let clock = &request.clock;
        let go = if let Some(move_time) = clock.move_time {
            format!("go movetime {}", millis(move_time))
        } else if let Some(time_left) = clock.time_left {
            let (time, inc) = match request.side() {
                Side::White => ("wtime", "winc"),
                Side::Black => ("btime", "binc"),
            };
            let mut go = format!("go {} {}", time, millis(time_left));
            if !clock.increment.is_zero() {
                go.push_str(&format!(" {} {}", inc, millis(clock.increment)));
            }
            if let Some(moves) = clock.moves_to_go {
                go.push_str(&format!(" movestogo {}", moves));
            }
            go
        } else {
            "go infinite".to_string()
        };

        vec![position, go]
    }

    fn encode_move(&mut self, _mv: &str) -> Vec<String> {
        Vec::new()
    }

    fn encode_stop(&self) -> Option<String> {
        Some("stop".to_string())
    }

    fn encode_result(&mut self, _result: GameResult) -> Vec<String> {
        Vec::new()
    }

    fn decode_line(&mut self, line: &str, out: &mut Vec<PeerEvent>) {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "uciok" => out.push(PeerEvent::StartComplete),
            "readyok" => out.push(PeerEvent::Pong),
            "id" => match rest.split_once(' ') {
                Some(("name", name)) => out.push(PeerEvent::Name(name.to_string())),
                _ => out.push(PeerEvent::Info(line.to_string())),
            },
            "option" => self.decode_option(rest, out),
            "bestmove" => match rest.split_whitespace().next() {
                Some("(none)") | Some("0000") | None => {
                    out.push(PeerEvent::Error(format!("no move in: {}", line)))
                }
                Some(mv) => out.push(PeerEvent::Move(mv.to_string())),
            },
            "info" => Self::decode_info(rest, out),
            _ => out.push(PeerEvent::Info(line.to_string())),
        }
    }
}
