//! Starting the engine process.
//!
//! A [`Launcher`] hands the session a fresh pair of streams each time the
//! engine is (re)started. [`ProcessLauncher`] spawns a real executable;
//! tests attach scripted engines over in-memory pipes instead.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::engine::EngineError;

/// Stream the session writes commands to.
pub type EngineWriter = Box<dyn AsyncWrite + Send + Unpin>;
/// Stream the session reads engine output from.
pub type EngineReader = Box<dyn AsyncRead + Send + Unpin>;

/// The I/O handles of one running engine.
pub struct EngineIo {
    pub stdin: EngineWriter,
    pub stdout: EngineReader,
    /// The OS process, when there is one.
    pub child: Option<Child>,
}

/// Starts engine instances.
pub trait Launcher: Send + Sync {
    /// Starts a new engine instance.
    ///
    /// # Errors
    ///
    /// - `EngineError::BinaryNotFound` if the executable cannot be located
    /// - `EngineError::Io` if the process fails to start
    fn launch(&self) -> Result<EngineIo, EngineError>;

    /// Human readable description for logs.
    fn describe(&self) -> String;
}

/// Executable name of the engine on the host platform.
pub fn platform_binary_name() -> &'static str {
    if cfg!(windows) {
        "stockfish.exe"
    } else {
        "stockfish"
    }
}

/// Resolves an engine path to an existing file.
///
/// Paths with a directory component are checked as given. Bare names are
/// looked up in `PATH` first, then in the working directory.
pub fn resolve_binary(path: &Path) -> Option<PathBuf> {
    let bare = path.parent().map_or(true, |p| p.as_os_str().is_empty());
    if !bare {
        return path.is_file().then(|| path.to_path_buf());
    }

    let from_path = std::env::var_os("PATH").and_then(|dirs| {
        std::env::split_paths(&dirs)
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    });

    from_path.or_else(|| path.is_file().then(|| path.to_path_buf()))
}

/// Spawns the engine as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    path: PathBuf,
}

impl ProcessLauncher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self) -> Result<EngineIo, EngineError> {
        let binary =
            resolve_binary(&self.path).ok_or_else(|| EngineError::BinaryNotFound(self.path.clone()))?;

        let mut child = Command::new(&binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine stdout not captured".to_string()))?;

        Ok(EngineIo {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            child: Some(child),
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
