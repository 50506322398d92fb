//! Supervised UCI engine session.
//!
//! An [`EngineSession`] owns one engine instance for its whole life: it
//! performs the handshake, serializes search requests, cancels searches that
//! run too long and replaces the instance when it stops responding. Engine
//! output is read by a background task into a bounded queue, so a request
//! can always tell whether the engine is still talking and nothing left over
//! from an earlier search is mistaken for the current one.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use uci::{EngineMessage, GoOptions, GuiCommand};

use crate::interpreter::{EngineLine, LineCollector};
use crate::launcher::{EngineReader, EngineWriter, Launcher};

/// Output lines buffered between the reader task and the session.
pub const OUTPUT_QUEUE_CAPACITY: usize = 4096;

/// Errors that can occur when working with the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {}", .0.display())]
    BinaryNotFound(PathBuf),
    /// The engine did not answer a synchronization command in time.
    #[error("Engine did not answer '{expected}' within {timeout:?}")]
    HandshakeTimeout { expected: String, timeout: Duration },
    /// The engine could not be brought to a ready state.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
    /// Reading from or writing to the engine failed.
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The engine closed its output.
    #[error("Engine process exited")]
    ProcessExited,
    /// The operation is not allowed in the current session state.
    #[error("Engine session is {actual}, expected {expected}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
    /// The FEN contains characters that would break the command line.
    #[error("Invalid FEN for engine: {0:?}")]
    InvalidFen(String),
}

/// Checks that `fen` can be sent as a single protocol line.
///
/// # Errors
///
/// - `EngineError::InvalidFen` if `fen` is empty or contains a control character
pub fn check_fen_text(fen: &str) -> Result<(), EngineError> {
    if fen.trim().is_empty() || fen.chars().any(char::is_control) {
        return Err(EngineError::InvalidFen(fen.to_string()));
    }
    Ok(())
}

/// Lifecycle of an engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Ready,
    Analyzing,
    /// The engine stopped responding or exited; it must be restarted.
    Stalled,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotStarted => "not started",
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Analyzing => "analyzing",
            SessionState::Stalled => "stalled",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Timeouts and engine options applied by a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Limit for each of `uciok` and `readyok`.
    pub handshake_timeout: Duration,
    /// How long a stopped search may take to report `bestmove`.
    pub stop_grace: Duration,
    /// How long the engine may take to exit after `quit`.
    pub quit_grace: Duration,
    pub multipv: u32,
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(2),
            quit_grace: Duration::from_secs(1),
            multipv: 2,
            threads: 1,
            hash_mb: 64,
        }
    }
}

struct Running {
    stdin: EngineWriter,
    output: mpsc::Receiver<String>,
    child: Option<Child>,
    reader: JoinHandle<()>,
}

enum Received {
    Line(String),
    TimedOut,
    Closed,
}

/// One supervised engine instance.
///
/// At most one search is in flight at a time; `&mut self` on every request
/// enforces that. The lines of the search in flight are kept in the session,
/// so when a caller gives up waiting, [`EngineSession::stop`] can still hand
/// back what the engine reported so far.
pub struct EngineSession {
    launcher: Arc<dyn Launcher>,
    config: SessionConfig,
    state: SessionState,
    running: Option<Running>,
    pending: Option<LineCollector>,
    engine_name: Option<String>,
}

impl EngineSession {
    pub fn new(launcher: Arc<dyn Launcher>, config: SessionConfig) -> Self {
        Self {
            launcher,
            config,
            state: SessionState::NotStarted,
            running: None,
            pending: None,
            engine_name: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Name reported by the engine during the handshake.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    /// Launches the engine and performs the UCI handshake.
    ///
    /// A handshake that fails is retried once with a fresh instance.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the engine has answered `readyok`; the session is then
    /// in the `Ready` state and [`EngineSession::engine_name`] is known.
    ///
    /// # Errors
    ///
    /// - `EngineError::BinaryNotFound` if the executable cannot be located
    /// - `EngineError::Unavailable` if the second attempt fails as well
    pub async fn start(&mut self) -> Result<(), EngineError> {
        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(EngineError::BinaryNotFound(path)) => Err(EngineError::BinaryNotFound(path)),
            Err(first) => {
                warn!(error = %first, engine = %self.launcher.describe(), "Engine start failed, retrying once");
                match self.try_start().await {
                    Ok(()) => Ok(()),
                    Err(EngineError::BinaryNotFound(path)) => Err(EngineError::BinaryNotFound(path)),
                    Err(second) => Err(EngineError::Unavailable(second.to_string())),
                }
            }
        }
    }

    async fn try_start(&mut self) -> Result<(), EngineError> {
        self.kill().await;
        self.state = SessionState::Starting;

        let io = match self.launcher.launch() {
            Ok(io) => io,
            Err(e) => {
                self.state = SessionState::Terminated;
                return Err(e);
            }
        };

        let (tx, output) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
        let reader = tokio::spawn(read_output(io.stdout, tx));
        self.running = Some(Running {
            stdin: io.stdin,
            output,
            child: io.child,
            reader,
        });

        match self.handshake().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                info!(
                    engine = %self.launcher.describe(),
                    name = self.engine_name.as_deref().unwrap_or("unknown"),
                    "Engine ready"
                );
                Ok(())
            }
            Err(e) => {
                self.kill().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::Uci).await?;
        let preamble = self.wait_for(EngineMessage::UciOk).await?;
        self.engine_name = preamble.into_iter().find_map(|msg| match msg {
            EngineMessage::Id { name, .. } => name,
            _ => None,
        });

        self.send(&GuiCommand::set_option("Threads", self.config.threads))
            .await?;
        self.send(&GuiCommand::set_option("Hash", self.config.hash_mb))
            .await?;
        self.send(&GuiCommand::set_option("MultiPV", self.config.multipv))
            .await?;

        self.send(&GuiCommand::IsReady).await?;
        self.wait_for(EngineMessage::ReadyOk).await?;
        Ok(())
    }

    /// Resets engine state between games.
    pub async fn new_game(&mut self) -> Result<(), EngineError> {
        self.require(SessionState::Ready)?;
        self.discard_buffered()?;
        self.send(&GuiCommand::UciNewGame).await?;
        self.send(&GuiCommand::IsReady).await?;
        match self.wait_for(EngineMessage::ReadyOk).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.state = SessionState::Stalled;
                Err(e)
            }
        }
    }

    /// Searches `fen` to `depth` and returns the deepest line per rank.
    ///
    /// Output still queued from an earlier search is discarded before the
    /// position is sent. The call waits for `bestmove` without a time limit;
    /// callers bound it and call [`EngineSession::stop`] when they give up.
    ///
    /// # Arguments
    ///
    /// * `fen` - Position to search, sent to the engine as given
    /// * `depth` - Search depth in plies
    ///
    /// # Returns
    ///
    /// The deepest line reported for each rank, best first. Empty when the
    /// engine reported no usable line before `bestmove`.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidFen` if `fen` cannot be sent as one command line
    /// - `EngineError::InvalidState` if the session is not ready
    /// - `EngineError::ProcessExited` if the engine exits during the search
    /// - `EngineError::Io` if a command cannot be written
    pub async fn submit_analysis(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> Result<Vec<EngineLine>, EngineError> {
        check_fen_text(fen)?;
        self.require(SessionState::Ready)?;

        let stale = self.discard_buffered()?;
        if stale > 0 {
            warn!(stale, "Discarded stale engine output");
        }

        self.pending = Some(LineCollector::new());
        self.state = SessionState::Analyzing;
        self.send(&GuiCommand::position_fen(fen)).await?;
        self.send(&GuiCommand::Go(GoOptions::depth(depth))).await?;

        loop {
            let Some(line) = self.recv().await else {
                warn!(fen, "Engine exited during analysis");
                self.state = SessionState::Stalled;
                return Err(EngineError::ProcessExited);
            };
            if EngineMessage::parse(&line).is_bestmove() {
                break;
            }
            if let Some(collector) = self.pending.as_mut() {
                collector.feed(&line);
            }
        }

        self.state = SessionState::Ready;
        let collector = self.pending.take().unwrap_or_default();
        let discarded = collector.discarded();
        let lines = collector.finish();
        debug!(fen, depth, lines = lines.len(), discarded, "Analysis complete");
        Ok(lines)
    }

    /// Cancels the search in flight and returns the lines reported so far.
    ///
    /// Waits up to the stop grace period for the engine to confirm with
    /// `bestmove`; if it does not, the session is marked stalled. Does
    /// nothing when no search is running.
    pub async fn stop(&mut self) -> Vec<EngineLine> {
        if self.state != SessionState::Analyzing {
            return Vec::new();
        }

        if let Err(e) = self.send(&GuiCommand::Stop).await {
            warn!(error = %e, "Failed to send stop");
            return self.take_pending();
        }

        let deadline = Instant::now() + self.config.stop_grace;
        loop {
            match self.recv_until(deadline).await {
                Received::Line(line) => {
                    if EngineMessage::parse(&line).is_bestmove() {
                        self.state = SessionState::Ready;
                        break;
                    }
                    if let Some(collector) = self.pending.as_mut() {
                        collector.feed(&line);
                    }
                }
                Received::TimedOut => {
                    warn!(grace = ?self.config.stop_grace, "Engine ignored stop");
                    self.state = SessionState::Stalled;
                    break;
                }
                Received::Closed => {
                    self.state = SessionState::Stalled;
                    break;
                }
            }
        }

        self.take_pending()
    }

    /// Whether the engine can take requests.
    ///
    /// Marks the session stalled when the process has exited.
    pub fn is_alive(&mut self) -> bool {
        if !matches!(self.state, SessionState::Ready | SessionState::Analyzing) {
            return false;
        }
        let Some(running) = self.running.as_mut() else {
            return false;
        };

        if let Some(child) = running.child.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                warn!(%status, "Engine process exited");
                self.state = SessionState::Stalled;
                return false;
            }
        }
        if running.reader.is_finished() {
            warn!("Engine output closed");
            self.state = SessionState::Stalled;
            return false;
        }
        true
    }

    /// Replaces the engine with a fresh instance.
    pub async fn restart(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::NotStarted {
            info!(state = %self.state, "Restarting engine");
        }
        self.kill().await;
        self.start().await
    }

    /// Asks the engine to quit and kills it if it does not. Never fails.
    pub async fn shutdown(&mut self) {
        if let Some(running) = self.running.take() {
            let Running {
                mut stdin,
                output,
                child,
                reader,
            } = running;

            let quit = format!("{}\n", GuiCommand::Quit.to_uci());
            if let Err(e) = write_line(&mut stdin, &quit).await {
                debug!(error = %e, "Failed to send quit");
            }
            drop(stdin);

            if let Some(mut child) = child {
                match timeout(self.config.quit_grace, child.wait()).await {
                    Ok(Ok(status)) => debug!(%status, "Engine exited"),
                    Ok(Err(e)) => debug!(error = %e, "Failed to wait for engine"),
                    Err(_) => {
                        warn!("Engine did not quit in time, killing");
                        if let Err(e) = child.kill().await {
                            debug!(error = %e, "Failed to kill engine");
                        }
                    }
                }
            }

            reader.abort();
            drop(output);
            info!(engine = %self.launcher.describe(), "Engine shut down");
        }

        self.pending = None;
        self.state = SessionState::Terminated;
    }

    async fn kill(&mut self) {
        if let Some(running) = self.running.take() {
            let Running {
                stdin,
                output,
                child,
                reader,
            } = running;
            drop(stdin);
            reader.abort();
            drop(output);
            if let Some(mut child) = child {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Failed to kill engine");
                }
            }
        }
        self.pending = None;
        self.state = SessionState::Terminated;
    }

    fn require(&self, expected: SessionState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn take_pending(&mut self) -> Vec<EngineLine> {
        self.pending
            .take()
            .map(LineCollector::finish)
            .unwrap_or_default()
    }

    async fn send(&mut self, command: &GuiCommand) -> Result<(), EngineError> {
        let Some(running) = self.running.as_mut() else {
            return Err(EngineError::ProcessExited);
        };

        let line = command.to_uci();
        debug!(cmd = %line, "engine <");
        if let Err(e) = write_line(&mut running.stdin, &format!("{}\n", line)).await {
            warn!(error = %e, cmd = %line, "Failed to write to engine");
            self.state = SessionState::Stalled;
            return Err(EngineError::Io(e));
        }
        Ok(())
    }

    /// Waits for `expected`, returning the messages seen before it.
    async fn wait_for(&mut self, expected: EngineMessage) -> Result<Vec<EngineMessage>, EngineError> {
        let limit = self.config.handshake_timeout;
        let deadline = Instant::now() + limit;
        let mut seen = Vec::new();

        loop {
            match self.recv_until(deadline).await {
                Received::Line(line) => {
                    let message = EngineMessage::parse(&line);
                    if message == expected {
                        return Ok(seen);
                    }
                    seen.push(message);
                }
                Received::TimedOut => {
                    return Err(EngineError::HandshakeTimeout {
                        expected: expected.to_uci(),
                        timeout: limit,
                    });
                }
                Received::Closed => {
                    self.state = SessionState::Stalled;
                    return Err(EngineError::ProcessExited);
                }
            }
        }
    }

    async fn recv(&mut self) -> Option<String> {
        let running = self.running.as_mut()?;
        let line = running.output.recv().await?;
        debug!(%line, "engine >");
        Some(line)
    }

    async fn recv_until(&mut self, deadline: Instant) -> Received {
        let Some(running) = self.running.as_mut() else {
            return Received::Closed;
        };
        match timeout_at(deadline, running.output.recv()).await {
            Ok(Some(line)) => {
                debug!(%line, "engine >");
                Received::Line(line)
            }
            Ok(None) => Received::Closed,
            Err(_) => Received::TimedOut,
        }
    }

    /// Drops queued output. Fails if the engine has closed its output.
    fn discard_buffered(&mut self) -> Result<usize, EngineError> {
        let Some(running) = self.running.as_mut() else {
            return Err(EngineError::ProcessExited);
        };

        let mut discarded = 0;
        loop {
            match running.output.try_recv() {
                Ok(line) => {
                    debug!(%line, "discarded");
                    discarded += 1;
                }
                Err(TryRecvError::Empty) => return Ok(discarded),
                Err(TryRecvError::Disconnected) => {
                    self.state = SessionState::Stalled;
                    return Err(EngineError::ProcessExited);
                }
            }
        }
    }
}

async fn write_line(stdin: &mut EngineWriter, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

async fn read_output(stdout: EngineReader, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Failed to read engine output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Evaluation;
    use crate::fake::{Behaviour, FakeEngine};
    use crate::launcher::ProcessLauncher;
    use uci::Score;

    const FEN_A: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const FEN_B: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn fast_config() -> SessionConfig {
        SessionConfig {
            handshake_timeout: Duration::from_millis(200),
            stop_grace: Duration::from_millis(200),
            quit_grace: Duration::from_millis(100),
            ..SessionConfig::default()
        }
    }

    fn session(engine: &Arc<FakeEngine>, config: SessionConfig) -> EngineSession {
        EngineSession::new(Arc::clone(engine) as Arc<dyn Launcher>, config)
    }

    #[tokio::test]
    async fn test_start_performs_handshake() {
        let engine = Arc::new(FakeEngine::healthy());
        let mut session = session(&engine, fast_config());
        assert_eq!(session.state(), SessionState::NotStarted);

        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.engine_name(), Some("Fake Engine"));
        assert!(session.is_alive());

        let commands = engine.commands();
        assert_eq!(commands[0], "uci");
        assert!(commands.contains(&"setoption name MultiPV value 2".to_string()));
        assert!(commands.contains(&"setoption name Threads value 1".to_string()));
        assert!(commands.contains(&"setoption name Hash value 64".to_string()));
        assert_eq!(commands.last().map(String::as_str), Some("isready"));
    }

    #[tokio::test]
    async fn test_analysis_returns_ranked_lines() {
        let engine = Arc::new(
            FakeEngine::healthy().with_lines(FEN_A, &[("g1f3", Score::Cp(25)), ("c2c4", Score::Cp(20))]),
        );
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        let lines = session.submit_analysis(FEN_A, 6).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].rank, 1);
        assert_eq!(lines[0].depth, 6);
        assert_eq!(lines[0].move_uci, "g1f3");
        assert_eq!(lines[0].evaluation, Evaluation::Centipawn(25));
        assert_eq!(lines[1].move_uci, "c2c4");
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(engine.count_commands("go depth 6"), 1);
    }

    #[tokio::test]
    async fn test_analysis_requires_ready_session() {
        let engine = Arc::new(FakeEngine::healthy());
        let mut session = session(&engine, fast_config());

        let err = session.submit_analysis(FEN_A, 4).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                expected: SessionState::Ready,
                actual: SessionState::NotStarted,
            }
        ));
        assert_eq!(engine.launches(), 0);
    }

    #[tokio::test]
    async fn test_fen_with_line_break_is_rejected() {
        let engine = Arc::new(FakeEngine::healthy());
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        let fen = format!("{FEN_A}\ngo infinite");
        let err = session.submit_analysis(&fen, 4).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidFen(_)));
        assert!(matches!(
            session.submit_analysis("  ", 4).await,
            Err(EngineError::InvalidFen(_))
        ));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(engine.count_commands("position"), 0);
        assert_eq!(engine.count_commands("go"), 0);

        let lines = session.submit_analysis(FEN_A, 4).await.unwrap();
        assert_eq!(lines[0].move_uci, "e2e4");
    }

    #[test]
    fn test_check_fen_text() {
        assert!(check_fen_text(FEN_A).is_ok());
        assert!(check_fen_text("8/8/8/8/8/8/8/8 w - - 0 1\r").is_err());
        assert!(check_fen_text("8/8/8/8\t/8/8/8/8 w - - 0 1").is_err());
        assert!(check_fen_text("").is_err());
    }

    #[tokio::test]
    async fn test_silent_engine_is_retried_once_then_unavailable() {
        let engine = Arc::new(FakeEngine::new(vec![Behaviour::Silent]));
        let mut session = session(&engine, fast_config());

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)), "got {err}");
        assert_eq!(engine.launches(), 2);
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn test_handshake_retry_recovers() {
        let engine = Arc::new(FakeEngine::new(vec![Behaviour::Silent, Behaviour::Healthy]));
        let mut session = session(&engine, fast_config());

        session.start().await.unwrap();
        assert_eq!(engine.launches(), 2);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_retried() {
        let launcher = Arc::new(ProcessLauncher::new("/nonexistent/path/to/stockfish"));
        let mut session = EngineSession::new(launcher, fast_config());

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, EngineError::BinaryNotFound(_)));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_stop_without_search_is_noop() {
        let engine = Arc::new(FakeEngine::healthy());
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        assert!(session.stop().await.is_empty());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(engine.count_commands("stop"), 0);
    }

    #[tokio::test]
    async fn test_stop_collects_late_output_before_next_request() {
        let engine = Arc::new(
            FakeEngine::healthy()
                .with_lines(FEN_A, &[("a2a3", Score::Cp(5)), ("a2a4", Score::Cp(0))])
                .with_lines(FEN_B, &[("h7h6", Score::Cp(-40)), ("e7e5", Score::Cp(-20))])
                .with_delay(FEN_A, Duration::from_millis(100)),
        );
        let mut config = fast_config();
        config.stop_grace = Duration::from_secs(1);
        let mut session = session(&engine, config);
        session.start().await.unwrap();

        let timed_out = timeout(Duration::from_millis(20), session.submit_analysis(FEN_A, 8)).await;
        assert!(timed_out.is_err());
        assert_eq!(session.state(), SessionState::Analyzing);

        let partial = session.stop().await;
        assert_eq!(session.state(), SessionState::Ready);
        assert!(partial.iter().all(|l| l.move_uci.starts_with("a2")));

        let lines = session.submit_analysis(FEN_B, 8).await.unwrap();
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l.move_uci == "h7h6" || l.move_uci == "e7e5"));
        assert_eq!(engine.launches(), 1);
    }

    #[tokio::test]
    async fn test_ignored_stop_stalls_session() {
        let engine = Arc::new(FakeEngine::new(vec![Behaviour::Hang]));
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        let timed_out = timeout(Duration::from_millis(50), session.submit_analysis(FEN_A, 10)).await;
        assert!(timed_out.is_err());

        let partial = session.stop().await;
        assert_eq!(partial.len(), 2);
        assert_eq!(partial[0].depth, 1);
        assert_eq!(session.state(), SessionState::Stalled);
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn test_crash_during_search_is_reported() {
        let engine = Arc::new(FakeEngine::new(vec![Behaviour::CrashOnGo, Behaviour::Healthy]));
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        let err = session.submit_analysis(FEN_A, 5).await.unwrap_err();
        assert!(matches!(err, EngineError::ProcessExited | EngineError::Io(_)), "got {err}");
        assert_eq!(session.state(), SessionState::Stalled);

        session.restart().await.unwrap();
        assert_eq!(engine.launches(), 2);
        let lines = session.submit_analysis(FEN_A, 5).await.unwrap();
        assert_eq!(lines[0].move_uci, "e2e4");
    }

    #[tokio::test]
    async fn test_new_game_resynchronizes() {
        let engine = Arc::new(FakeEngine::healthy());
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        session.new_game().await.unwrap();
        assert_eq!(engine.count_commands("ucinewgame"), 1);
        assert_eq!(engine.count_commands("isready"), 2);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_shutdown_sends_quit() {
        let engine = Arc::new(FakeEngine::healthy());
        let mut session = session(&engine, fast_config());
        session.start().await.unwrap();

        session.shutdown().await;
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(!session.is_alive());

        // Give the scripted engine a moment to record the command
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.count_commands("quit"), 1);

        // A second shutdown has nothing left to do
        session.shutdown().await;
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Stalled.to_string(), "stalled");
        assert_eq!(SessionState::NotStarted.to_string(), "not started");
    }
}
