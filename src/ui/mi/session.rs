//! Session manager: lifecycle of a debugging session.
//!
//! ```text
//! NotConnected -> ConnectedLocal | ConnectedRemote
//! ConnectedLocal -> ConnectedRemote
//! ConnectedLocal | ConnectedRemote -> Running
//! Running <-> Stopped
//! Running | Stopped -> ConnectedLocal | ConnectedRemote (process exited)
//! * -> Exited
//! ```

use log::debug;
use std::path::{Path, PathBuf};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionState {
    NotConnected,
    ConnectedLocal,
    ConnectedRemote,
    Running,
    Stopped,
    Exited,
}

impl SessionState {
    fn is_connected(self) -> bool {
        matches!(
            self,
            SessionState::ConnectedLocal | SessionState::ConnectedRemote
        )
    }

    fn can_transit(self, to: SessionState) -> bool {
        use SessionState::*;
        match (self, to) {
            (Exited, _) => false,
            (_, Exited) => true,
            (NotConnected, ConnectedLocal | ConnectedRemote) => true,
            (ConnectedLocal, ConnectedRemote) => true,
            (ConnectedLocal | ConnectedRemote, Running) => true,
            (Running, Stopped) | (Stopped, Running) => true,
            (Running | Stopped, ConnectedLocal | ConnectedRemote) => true,
            _ => false,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("session closed")]
    Closed,
    #[error("connection lost: {0}")]
    TransportLost(String),
    #[error("no executable file specified")]
    NoTarget,
    #[error("the program is being debugged already")]
    ProcessAlive,
    #[error("the program is already running")]
    AlreadyRunning,
    #[error("the program is not being run")]
    NotRunning,
    #[error("invalid session transition: {0} -> {1}")]
    InvalidTransition(SessionState, SessionState),
}

/// Debugging session state, owned by the interpreter core.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    /// Connected state to return to when a process exits.
    connection: SessionState,
    target: Option<PathBuf>,
    platform: Option<String>,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    /// Set when engine reports transport loss, reported at next command.
    lost: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::NotConnected,
            connection: SessionState::ConnectedLocal,
            target: None,
            platform: None,
            args: vec![],
            cwd: None,
            lost: None,
        }
    }
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Process exists, running or stopped.
    pub fn has_process(&self) -> bool {
        matches!(self.state, SessionState::Running | SessionState::Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Exited
    }

    /// Transport loss is recorded but not reported by a command yet.
    pub fn is_lost(&self) -> bool {
        self.lost.is_some()
    }

    /// State as seen by an interrupt request, a lost session has no process to interrupt.
    pub fn interrupt_state(&self) -> SessionState {
        if self.is_lost() {
            SessionState::Exited
        } else {
            self.state
        }
    }

    fn transit(&mut self, to: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transit(to) {
            return Err(SessionError::InvalidTransition(self.state, to));
        }
        debug!(target: "mi", "session: {} -> {to}", self.state);
        self.state = to;
        Ok(())
    }

    /// Check that session accepts commands. A recorded transport loss is reported once,
    /// the session is closed after that.
    pub fn check_open(&mut self) -> Result<(), SessionError> {
        if let Some(reason) = self.lost.take() {
            self.state = SessionState::Exited;
            return Err(SessionError::TransportLost(reason));
        }
        if self.state == SessionState::Exited {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Check that a process can be launched.
    pub fn check_can_run(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running | SessionState::Stopped => Err(SessionError::AlreadyRunning),
            SessionState::Exited => Err(SessionError::Closed),
            _ if self.target.is_none() => Err(SessionError::NoTarget),
            _ => Ok(()),
        }
    }

    /// Check that a stopped process can be resumed.
    pub fn check_stopped(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Stopped => Ok(()),
            SessionState::Running => Err(SessionError::AlreadyRunning),
            _ => Err(SessionError::NotRunning),
        }
    }

    /// Check that target may be replaced or connection established.
    pub fn check_no_process(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running | SessionState::Stopped => Err(SessionError::ProcessAlive),
            _ => Ok(()),
        }
    }

    /// Executable loaded, a local session begins if not connected yet.
    pub fn target_loaded(&mut self, path: &Path) -> Result<(), SessionError> {
        self.check_no_process()?;
        if self.state == SessionState::NotConnected {
            self.transit(SessionState::ConnectedLocal)?;
            self.connection = SessionState::ConnectedLocal;
        }
        self.target = Some(path.to_path_buf());
        Ok(())
    }

    pub fn platform_selected(&mut self, name: &str) {
        self.platform = Some(name.to_string());
    }

    pub fn remote_connected(&mut self) -> Result<(), SessionError> {
        self.check_no_process()?;
        if self.state != SessionState::ConnectedRemote {
            self.transit(SessionState::ConnectedRemote)?;
        }
        self.connection = SessionState::ConnectedRemote;
        Ok(())
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = Some(cwd);
    }

    /// Process started or resumed.
    pub fn resumed(&mut self) -> Result<(), SessionError> {
        self.transit(SessionState::Running)
    }

    pub fn stopped(&mut self) -> Result<(), SessionError> {
        self.transit(SessionState::Stopped)
    }

    /// Process exited, session returns into connected state, target stays loaded.
    pub fn process_exited(&mut self) -> Result<(), SessionError> {
        let connection = self.connection;
        if self.state.is_connected() {
            return Ok(());
        }
        self.transit(connection)
    }

    pub fn transport_lost(&mut self, reason: &str) {
        if self.state != SessionState::Exited {
            self.lost = Some(reason.to_string());
        }
    }

    pub fn close(&mut self) {
        if self.state != SessionState::Exited {
            debug!(target: "mi", "session: {} -> {}", self.state, SessionState::Exited);
        }
        self.state = SessionState::Exited;
        self.lost = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transitions() {
        use SessionState::*;
        struct TestCase {
            from: SessionState,
            to: SessionState,
            allowed: bool,
        }
        let cases = vec![
            TestCase {
                from: NotConnected,
                to: ConnectedLocal,
                allowed: true,
            },
            TestCase {
                from: NotConnected,
                to: Running,
                allowed: false,
            },
            TestCase {
                from: ConnectedLocal,
                to: ConnectedRemote,
                allowed: true,
            },
            TestCase {
                from: ConnectedRemote,
                to: ConnectedLocal,
                allowed: false,
            },
            TestCase {
                from: Running,
                to: Stopped,
                allowed: true,
            },
            TestCase {
                from: Stopped,
                to: Running,
                allowed: true,
            },
            TestCase {
                from: Stopped,
                to: Stopped,
                allowed: false,
            },
            TestCase {
                from: Running,
                to: ConnectedRemote,
                allowed: true,
            },
            TestCase {
                from: Stopped,
                to: Exited,
                allowed: true,
            },
            TestCase {
                from: Exited,
                to: ConnectedLocal,
                allowed: false,
            },
        ];

        for tc in cases {
            assert_eq!(
                tc.from.can_transit(tc.to),
                tc.allowed,
                "{} -> {}",
                tc.from,
                tc.to
            );
        }
    }

    #[test]
    fn test_process_lifecycle() {
        let mut session = Session::default();
        assert_eq!(session.check_can_run(), Err(SessionError::NoTarget));

        session.target_loaded(Path::new("a.out")).unwrap();
        assert_eq!(session.state(), SessionState::ConnectedLocal);
        session.check_can_run().unwrap();

        session.resumed().unwrap();
        assert_eq!(session.check_can_run(), Err(SessionError::AlreadyRunning));
        assert_eq!(session.check_stopped(), Err(SessionError::AlreadyRunning));
        assert_eq!(
            session.target_loaded(Path::new("b.out")),
            Err(SessionError::ProcessAlive)
        );

        session.stopped().unwrap();
        session.check_stopped().unwrap();

        session.process_exited().unwrap();
        assert_eq!(session.state(), SessionState::ConnectedLocal);
        assert_eq!(session.target(), Some(Path::new("a.out")));
        assert_eq!(session.check_stopped(), Err(SessionError::NotRunning));
    }

    #[test]
    fn test_remote_session_returns_to_remote() {
        let mut session = Session::default();
        session.target_loaded(Path::new("a.out")).unwrap();
        session.remote_connected().unwrap();
        session.resumed().unwrap();
        session.process_exited().unwrap();
        assert_eq!(session.state(), SessionState::ConnectedRemote);
    }

    #[test]
    fn test_transport_lost_reported_once() {
        let mut session = Session::default();
        session.target_loaded(Path::new("a.out")).unwrap();
        session.transport_lost("eof");

        assert_eq!(
            session.check_open(),
            Err(SessionError::TransportLost("eof".to_string()))
        );
        assert_eq!(session.state(), SessionState::Exited);
        assert_eq!(session.check_open(), Err(SessionError::Closed));
    }

    #[test]
    fn test_lost_session_not_interruptible() {
        let mut session = Session::default();
        session.target_loaded(Path::new("a.out")).unwrap();
        session.resumed().unwrap();
        assert_eq!(session.interrupt_state(), SessionState::Running);

        session.transport_lost("eof");
        assert!(session.is_lost());
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.interrupt_state(), SessionState::Exited);
    }
}
