use crate::ui::command::{CommandError, CommandResult};
use crate::ui::mi::dispatch::Core;
use std::path::PathBuf;

pub enum Command {
    /// Arguments for the next launch.
    Arguments(Vec<String>),
    /// Working directory for the next launch.
    Cd(PathBuf),
}

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    pub fn handle(&mut self, cmd: Command) -> CommandResult<()> {
        match cmd {
            Command::Arguments(args) => self.core.session.set_args(args),
            Command::Cd(dir) => {
                if !dir.is_dir() {
                    return Err(CommandError::InvalidArguments(format!(
                        "{}: No such file or directory.",
                        dir.display()
                    )));
                }
                self.core.session.set_cwd(dir);
            }
        }
        Ok(())
    }
}
