use crate::ui::command::CommandResult;
use crate::ui::mi::dispatch::Core;

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    pub fn handle(&mut self, expression: &str) -> CommandResult<String> {
        Ok(self.core.engine.evaluate(expression)?)
    }
}
