use crate::engine::LaunchOptions;
use crate::ui::command::CommandResult;
use crate::ui::mi::dispatch::{Core, OperationKind};
use log::info;

pub enum Command {
    /// `-exec-run [--start]`
    Run { stop_at_entry: bool },
    /// `process launch [-s] [-- args]`
    Launch {
        stop_at_entry: bool,
        args: Option<Vec<String>>,
    },
}

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Launch a process for a loaded executable. Return as soon as a process begins to run,
    /// a stop is reported later by an event hook.
    pub fn handle(&mut self, cmd: Command, token: Option<u64>) -> CommandResult<()> {
        self.core.session.check_can_run()?;

        let (stop_at_entry, args) = match cmd {
            Command::Run { stop_at_entry } => (stop_at_entry, None),
            Command::Launch {
                stop_at_entry,
                args,
            } => (stop_at_entry, args),
        };
        let options = LaunchOptions {
            args: args.unwrap_or_else(|| self.core.session.args().to_vec()),
            env: vec![],
            cwd: self.core.session.cwd().map(|cwd| cwd.to_path_buf()),
            stop_at_entry,
        };

        self.core.engine.launch(&options)?;
        self.core.session.resumed()?;
        self.core.current_thread = None;
        self.core.start_operation(token, OperationKind::Run);
        if let Some(target) = self.core.session.target() {
            info!(target: "mi", "process launched: {target:?} {:?}", options.args);
        }
        Ok(())
    }
}
