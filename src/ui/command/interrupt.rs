use crate::engine::EngineError;
use crate::ui::command::{CommandError, CommandResult};
use crate::ui::mi::dispatch::Core;
use crate::ui::mi::interrupt::Decision;
use log::debug;

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Request a running process to stop. The stop itself is reported by an event hook
    /// as `signal-received` with `SIGINT`.
    pub fn handle(&mut self) -> CommandResult<()> {
        match self.core.interrupts.request(self.core.session.interrupt_state()) {
            Decision::NotRunning => Err(CommandError::NotRunning),
            Decision::Coalesced => {
                debug!(target: "mi", "interrupt already requested");
                Ok(())
            }
            Decision::Issue => match self.core.engine.interrupt() {
                Ok(()) => Ok(()),
                // process stopped by itself, stop event is on the way and satisfies the request
                Err(EngineError::ProcessNotRunning) => {
                    debug!(target: "mi", "process already stopped, waiting for stop event");
                    Ok(())
                }
                Err(e) => {
                    self.core.interrupts.cancel();
                    Err(e.into())
                }
            },
        }
    }
}
