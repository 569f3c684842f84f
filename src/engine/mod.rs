//! Debugging engine capability surface.
//!
//! The MI interpreter never touches a debugged process directly: every action goes through
//! an [`Engine`] implementation, and every change of the process state comes back as an
//! [`EngineEvent`] delivered into the [`EventSink`] passed to [`Engine::subscribe`].
//!
//! Two engines are provided:
//! - [`native::NativeEngine`] - a ptrace based engine for local linux targets.
//! - [`scripted::ScriptedEngine`] - an in-memory simulation of a small program, useful for
//!   protocol dry runs and tests.

pub mod error;
pub mod expression;
pub mod native;
pub mod scripted;

pub use error::EngineError;

use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Engine thread identifier, `1` is always the main thread of a process.
pub type ThreadId = u64;

/// Location of a stopped thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub addr: u64,
    pub func: Option<String>,
}

/// Raw, engine level, cause of a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// Thread hit a breakpoint with engine id.
    Breakpoint { id: u32 },
    /// Single step (or step-like operation) completed.
    Trace,
    /// Process stopped at its entry point right after launch.
    Entry,
    /// Process received an OS signal, `name` is a signal name like `SIGUSR1`.
    Signal { name: String },
    /// Hardware fault, `description` is a platform specific text.
    Exception { description: String },
    /// Stop requested by [`Engine::interrupt`].
    Interrupted,
}

/// Threads affected by a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffectedThreads {
    All,
    Set(Vec<ThreadId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStop {
    pub thread: ThreadId,
    pub cause: StopCause,
    pub affected: AffectedThreads,
    pub frame: Option<FrameInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Process exited with code.
    Code(i32),
    /// Process terminated by a signal with name.
    Signal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Result of a breakpoint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo {
    /// Engine breakpoint id, unique for engine lifetime.
    pub id: u32,
    /// True if location resolved into at least one address.
    pub resolved: bool,
    pub addr: Option<u64>,
    pub func: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    /// OS level thread identifier (tid for a native process).
    pub target_id: String,
    pub frame: Option<FrameInfo>,
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Process (all threads) resumed.
    Resumed,
    Stopped(RawStop),
    Exited(ExitStatus),
    /// Text written by a debugged program.
    Output { stream: OutputStream, text: String },
    /// Pending breakpoint was resolved.
    BreakpointResolved(BreakpointInfo),
    /// Connection with a remote target was lost.
    Disconnected { reason: String },
}

/// Receiving side of engine events. Never blocks a sender.
#[derive(Clone, Debug)]
pub struct EventSink(mpsc::Sender<EngineEvent>);

impl EventSink {
    /// Create a new sink and a receiver for its events.
    pub fn channel() -> (EventSink, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        (EventSink(tx), rx)
    }

    /// Deliver an event. Return false if nobody listens anymore.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

/// Process launch parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Stop a process at its entry point.
    pub stop_at_entry: bool,
}

/// Parse an address location like `0x401000` or `*0x401000`.
pub(crate) fn parse_address(location: &str) -> Option<u64> {
    let location = location.trim().trim_start_matches('*');
    let hex = location
        .strip_prefix("0x")
        .or_else(|| location.strip_prefix("0X"))?;
    u64::from_str_radix(hex, 16).ok()
}

/// Debugging engine. All methods are called under the interpreter lock,
/// so implementation may assume requests are never concurrent.
pub trait Engine: Send {
    /// Set destination for engine events.
    fn subscribe(&mut self, sink: EventSink);

    /// Load executable and its symbols.
    fn create_target(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Select a platform by name (like `host` or `remote-linux`).
    fn select_platform(&mut self, name: &str, sysroot: Option<&str>) -> Result<(), EngineError>;

    /// Connect to a remote debug server.
    fn connect_remote(&mut self, host: &str, port: u16) -> Result<(), EngineError>;

    /// Start a process for the current target. Process begins to run, a stop (if any)
    /// is reported asynchronously.
    fn launch(&mut self, options: &LaunchOptions) -> Result<(), EngineError>;

    /// Set a breakpoint at location (symbol name or address). If `pending` is true an
    /// unresolved location is not an error.
    fn set_breakpoint(&mut self, location: &str, pending: bool)
        -> Result<BreakpointInfo, EngineError>;

    /// Remove breakpoint by engine id.
    fn remove_breakpoint(&mut self, id: u32) -> Result<(), EngineError>;

    /// Evaluate an expression, return a textual value.
    fn evaluate(&mut self, expression: &str) -> Result<String, EngineError>;

    /// Resume a stopped process.
    fn resume(&mut self) -> Result<(), EngineError>;

    /// Ask a running process to stop, the stop is reported with [`StopCause::Interrupted`].
    fn interrupt(&mut self) -> Result<(), EngineError>;

    fn threads(&mut self) -> Result<Vec<ThreadInfo>, EngineError>;

    /// Execute an engine native command line, return its textual output.
    fn execute_command(&mut self, line: &str) -> Result<String, EngineError>;

    /// Kill a debugged process (if any) and release all resources.
    fn shutdown(&mut self);
}
