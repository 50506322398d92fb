//! UCI commands written to the engine.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// Set an engine option. `value` is absent for button options.
    SetOption { name: String, value: Option<String> },
    /// The next position belongs to a different game.
    UciNewGame,
    /// Set up position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// Search exactly this many nodes.
    pub nodes: Option<u64>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    /// A fixed-depth search.
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }
}

impl GuiCommand {
    /// Shorthand for `setoption name <name> value <value>`.
    pub fn set_option(name: &str, value: impl ToString) -> Self {
        GuiCommand::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Shorthand for `position fen <fen>` with no moves.
    pub fn position_fen(fen: &str) -> Self {
        GuiCommand::Position {
            fen: Some(fen.to_string()),
            moves: Vec::new(),
        }
    }

    /// Format the command as a single protocol line (without newline).
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(f) => format!("position fen {}", f),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            GuiCommand::Go(opts) => {
                let mut parts = vec!["go".to_string()];
                if let Some(d) = opts.depth {
                    parts.push(format!("depth {}", d));
                }
                if let Some(n) = opts.nodes {
                    parts.push(format!("nodes {}", n));
                }
                if let Some(t) = opts.movetime {
                    parts.push(format!("movetime {}", t));
                }
                if opts.infinite {
                    parts.push("infinite".to_string());
                }
                parts.join(" ")
            }
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(raw) => raw.clone(),
        }
    }

    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(GuiCommand::Uci),
            "isready" => Ok(GuiCommand::IsReady),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "setoption" => Self::parse_setoption(parts),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            "" => Ok(GuiCommand::Unknown(String::new())),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_setoption<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        if parts.next() != Some("name") {
            return Err(UciError::InvalidCommand(
                "setoption without 'name'".to_string(),
            ));
        }

        let mut name = Vec::new();
        let mut value = Vec::new();
        let mut in_value = false;
        for part in parts {
            if part == "value" && !in_value {
                in_value = true;
            } else if in_value {
                value.push(part);
            } else {
                name.push(part);
            }
        }

        if name.is_empty() {
            return Err(UciError::InvalidCommand(
                "setoption with empty name".to_string(),
            ));
        }

        Ok(GuiCommand::SetOption {
            name: name.join(" "),
            value: in_value.then(|| value.join(" ")),
        })
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut fen = None;
        let mut moves = Vec::new();

        match parts.next() {
            Some("startpos") => {
                if parts.next() == Some("moves") {
                    moves = parts.map(str::to_string).collect();
                }
            }
            Some("fen") => {
                // Collect FEN fields until "moves" or end
                let mut fen_parts = Vec::new();
                for part in parts.by_ref() {
                    if part == "moves" {
                        break;
                    }
                    fen_parts.push(part);
                }
                if fen_parts.is_empty() {
                    return Err(UciError::ParseError("Empty FEN".to_string()));
                }
                fen = Some(fen_parts.join(" "));
                moves = parts.map(str::to_string).collect();
            }
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::ParseError(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        }

        Ok(GuiCommand::Position { fen, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    opts.depth = parts.get(i).and_then(|s| s.parse().ok());
                }
                "nodes" => {
                    i += 1;
                    opts.nodes = parts.get(i).and_then(|s| s.parse().ok());
                }
                "movetime" => {
                    i += 1;
                    opts.movetime = parts.get(i).and_then(|s| s.parse().ok());
                }
                "infinite" => {
                    opts.infinite = true;
                }
                _ => {}
            }
            i += 1;
        }

        Ok(GuiCommand::Go(opts))
    }
}
