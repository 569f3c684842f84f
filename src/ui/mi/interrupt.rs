//! Interrupt controller.
//!
//! Both an `-exec-interrupt` command and a SIGINT delivered to the interpreter end up here.
//! A request is an idempotent transition guarded by the session state, so that a racing
//! command and signal produce a single engine call and a single stop record.

use crate::ui::mi::session::SessionState;
use log::debug;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Ask an engine to suspend a process.
    Issue,
    /// An interrupt already requested and stop is not observed yet.
    Coalesced,
    /// Nothing to interrupt.
    NotRunning,
}

#[derive(Debug, Default)]
pub struct InterruptController {
    pending: Option<Instant>,
}

impl InterruptController {
    pub fn request(&mut self, state: SessionState) -> Decision {
        if state != SessionState::Running {
            return Decision::NotRunning;
        }
        if self.pending.is_some() {
            return Decision::Coalesced;
        }
        self.pending = Some(Instant::now());
        Decision::Issue
    }

    /// Engine refuses to interrupt, forget a request.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Process stopped or exited, any outstanding request is satisfied by this.
    /// Return true if there was an outstanding request.
    pub fn take_for_stop(&mut self) -> bool {
        match self.pending.take() {
            Some(issued) => {
                debug!(target: "mi", "interrupt satisfied in {:?}", issued.elapsed());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_request_coalescing() {
        let mut ctl = InterruptController::default();
        assert_eq!(ctl.request(SessionState::Running), Decision::Issue);
        assert_eq!(ctl.request(SessionState::Running), Decision::Coalesced);
        assert!(ctl.take_for_stop());
        assert!(!ctl.take_for_stop());

        assert_eq!(ctl.request(SessionState::Stopped), Decision::NotRunning);
        assert_eq!(ctl.request(SessionState::NotConnected), Decision::NotRunning);
        assert!(!ctl.is_pending());
    }

    #[test]
    fn test_cancel() {
        let mut ctl = InterruptController::default();
        assert_eq!(ctl.request(SessionState::Running), Decision::Issue);
        ctl.cancel();
        assert_eq!(ctl.request(SessionState::Running), Decision::Issue);
    }
}
