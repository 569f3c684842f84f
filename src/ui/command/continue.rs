use crate::ui::command::CommandResult;
use crate::ui::mi::dispatch::{Core, OperationKind};

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    pub fn handle(&mut self, token: Option<u64>) -> CommandResult<()> {
        self.core.session.check_stopped()?;
        self.core.engine.resume()?;
        self.core.session.resumed()?;
        self.core.start_operation(token, OperationKind::Continue);
        Ok(())
    }
}
