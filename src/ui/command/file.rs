use crate::ui::command::CommandResult;
use crate::ui::mi::dispatch::Core;
use log::info;
use std::path::Path;

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Load an executable and its symbols, a local session begins if there is no session yet.
    pub fn handle(&mut self, path: &Path) -> CommandResult<()> {
        self.core.session.check_no_process()?;
        self.core.engine.create_target(path)?;
        self.core.session.target_loaded(path)?;
        info!(target: "mi", "executable loaded: {path:?}");
        Ok(())
    }
}
