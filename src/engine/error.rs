use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("engine request timed out after {0} ms")]
    Timeout(u128),
    #[error("engine is gone")]
    EngineGone,
    #[error("{0} is not supported by this engine")]
    Unsupported(&'static str),

    // --------------------------------- target errors ---------------------------------------------
    #[error("{0}: no such file or directory")]
    TargetNotFound(PathBuf),
    #[error("invalid target {0}: {1}")]
    InvalidTarget(PathBuf, String),
    #[error("no executable file loaded")]
    NoTarget,
    #[error("object file parsing error: {0}")]
    ObjParsing(#[from] object::Error),

    // --------------------------------- breakpoint and evaluation errors --------------------------
    #[error("could not resolve breakpoint location \"{0}\"")]
    UnresolvedLocation(String),
    #[error("{0}")]
    Evaluation(String),
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    // --------------------------------- process errors --------------------------------------------
    #[error("process is running")]
    ProcessRunning,
    #[error("process is not running")]
    ProcessNotRunning,
    #[error("failed to connect to {0}: {1}")]
    Connect(String, String),
    #[error("connection lost: {0}")]
    TransportLost(String),

    // --------------------------------- syscall errors --------------------------------------------
    #[error("waitpid syscall error: {0}")]
    Waitpid(nix::Error),
    #[error("ptrace syscall error: {0}")]
    Ptrace(nix::Error),
    #[error("{0} syscall error: {1}")]
    Syscall(&'static str, nix::Error),
}

impl EngineError {
    /// Return a hint to an interface - continue the session after error or close it.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::IO(_) => false,
            EngineError::Timeout(_) => false,
            EngineError::Unsupported(_) => false,
            EngineError::TargetNotFound(_) => false,
            EngineError::InvalidTarget(_, _) => false,
            EngineError::NoTarget => false,
            EngineError::ObjParsing(_) => false,
            EngineError::UnresolvedLocation(_) => false,
            EngineError::Evaluation(_) => false,
            EngineError::UnknownCommand(_) => false,
            EngineError::ProcessRunning => false,
            EngineError::ProcessNotRunning => false,
            EngineError::Connect(_, _) => false,
            EngineError::Waitpid(_) => false,
            EngineError::Ptrace(_) => false,

            // the engine cannot serve further requests
            EngineError::EngineGone => true,
            EngineError::TransportLost(_) => true,
            EngineError::Syscall(_, _) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "engine", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "engine", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
