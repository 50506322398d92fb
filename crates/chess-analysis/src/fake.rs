//! Scripted UCI engine for tests.
//!
//! Speaks the protocol over in-memory pipes so session, scheduler and
//! analyzer behaviour can be exercised without an engine binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use uci::{EngineMessage, GuiCommand, InfoBuilder, Score};

use crate::engine::EngineError;
use crate::launcher::{EngineIo, Launcher};

const PIPE_CAPACITY: usize = 64 * 1024;

/// How one launched instance behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    Healthy,
    /// Never answers `uci` or `isready`.
    Silent,
    /// Reports depth 1, then neither finishes nor honours `stop`.
    Hang,
    /// Exits as soon as a search starts.
    CrashOnGo,
}

#[derive(Debug, Clone)]
struct ScriptedPosition {
    lines: Vec<(&'static str, Score)>,
    delay: Option<Duration>,
}

impl Default for ScriptedPosition {
    fn default() -> Self {
        Self {
            lines: vec![("e2e4", Score::Cp(30)), ("d2d4", Score::Cp(22))],
            delay: None,
        }
    }
}

/// A launcher that starts scripted engines.
///
/// Instance `n` follows `script[n]`; the last entry repeats. Every command
/// received by any instance is recorded in order.
pub(crate) struct FakeEngine {
    script: Vec<Behaviour>,
    positions: HashMap<String, ScriptedPosition>,
    launches: AtomicUsize,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    pub fn new(script: Vec<Behaviour>) -> Self {
        Self {
            script,
            positions: HashMap::new(),
            launches: AtomicUsize::new(0),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn healthy() -> Self {
        Self::new(vec![Behaviour::Healthy])
    }

    /// Lines reported for `fen`, best first. Matched on piece placement.
    pub fn with_lines(mut self, fen: &str, lines: &[(&'static str, Score)]) -> Self {
        self.positions.entry(board(fen)).or_default().lines = lines.to_vec();
        self
    }

    /// Holds back everything past depth 1 for `delay` when searching `fen`.
    pub fn with_delay(mut self, fen: &str, delay: Duration) -> Self {
        self.positions.entry(board(fen)).or_default().delay = Some(delay);
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count_commands(&self, prefix: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl Launcher for FakeEngine {
    fn launch(&self) -> Result<EngineIo, EngineError> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        let behaviour = self
            .script
            .get(n)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(Behaviour::Healthy);

        let (session_stdin, engine_stdin) = tokio::io::duplex(PIPE_CAPACITY);
        let (engine_stdout, session_stdout) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(run(
            behaviour,
            self.positions.clone(),
            Arc::clone(&self.commands),
            engine_stdin,
            engine_stdout,
        ));

        Ok(EngineIo {
            stdin: Box::new(session_stdin),
            stdout: Box::new(session_stdout),
            child: None,
        })
    }

    fn describe(&self) -> String {
        "fake engine".to_string()
    }
}

fn board(fen: &str) -> String {
    fen.split_whitespace().next().unwrap_or_default().to_string()
}

async fn run(
    behaviour: Behaviour,
    positions: HashMap<String, ScriptedPosition>,
    commands: Arc<Mutex<Vec<String>>>,
    stdin: DuplexStream,
    mut stdout: DuplexStream,
) {
    let mut input = BufReader::new(stdin).lines();
    let mut multipv = 1;
    let mut position = ScriptedPosition::default();

    while let Ok(Some(line)) = input.next_line().await {
        commands.lock().unwrap().push(line.clone());

        let mut replies = Vec::new();
        let mut delayed = Vec::new();
        let mut delay = None;

        match GuiCommand::parse(&line) {
            Ok(GuiCommand::Uci) if behaviour != Behaviour::Silent => {
                replies.push(EngineMessage::Id {
                    name: Some("Fake Engine".to_string()),
                    author: None,
                });
                replies.push(EngineMessage::UciOk);
            }
            Ok(GuiCommand::IsReady) if behaviour != Behaviour::Silent => {
                replies.push(EngineMessage::ReadyOk);
            }
            Ok(GuiCommand::SetOption {
                name,
                value: Some(value),
            }) if name == "MultiPV" => {
                multipv = value.parse().unwrap_or(1);
            }
            Ok(GuiCommand::Position { fen: Some(fen), .. }) => {
                position = positions.get(&board(&fen)).cloned().unwrap_or_default();
            }
            Ok(GuiCommand::Go(opts)) => {
                let depth = opts.depth.unwrap_or(1).max(1);
                match behaviour {
                    Behaviour::CrashOnGo => return,
                    Behaviour::Hang => replies.extend(info_lines(&position, 1, multipv)),
                    Behaviour::Healthy | Behaviour::Silent => {
                        replies.extend(info_lines(&position, 1, multipv));
                        let rest = if position.delay.is_some() {
                            delay = position.delay;
                            &mut delayed
                        } else {
                            &mut replies
                        };
                        for d in 2..=depth {
                            rest.push(EngineMessage::Info(
                                InfoBuilder::new().depth(d).currmove(position.lines[0].0).build(),
                            ));
                            rest.extend(info_lines(&position, d, multipv));
                        }
                        rest.push(EngineMessage::BestMove {
                            mv: position.lines[0].0.to_string(),
                            ponder: None,
                        });
                    }
                }
            }
            Ok(GuiCommand::Quit) => return,
            _ => {}
        }

        if !write_all(&mut stdout, &replies).await {
            return;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
            if !write_all(&mut stdout, &delayed).await {
                return;
            }
        }
    }
}

fn info_lines(position: &ScriptedPosition, depth: u32, multipv: usize) -> Vec<EngineMessage> {
    position
        .lines
        .iter()
        .take(multipv)
        .enumerate()
        .map(|(i, (mv, score))| {
            let builder = InfoBuilder::new()
                .depth(depth)
                .multipv(i as u32 + 1)
                .nodes(u64::from(depth) * 1000)
                .pv(vec![mv.to_string()]);
            let builder = match score {
                Score::Cp(cp) => builder.score_cp(*cp),
                Score::Mate(m) => builder.score_mate(*m),
            };
            EngineMessage::Info(builder.build())
        })
        .collect()
}

async fn write_all(stdout: &mut DuplexStream, messages: &[EngineMessage]) -> bool {
    for message in messages {
        let text = format!("{}\n", message.to_uci());
        if stdout.write_all(text.as_bytes()).await.is_err() {
            return false;
        }
    }
    true
}
