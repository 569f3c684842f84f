use crate::ui::command::cli::CliCommand;
use crate::ui::command::{file, interrupt, r#continue, run, target, CommandResult, Outcome};
use crate::ui::mi::dispatch::Core;
use log::debug;

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Pass a CLI command to an engine, return its textual output.
    pub fn handle(&mut self, line: &str) -> CommandResult<String> {
        debug!(target: "mi", "console command: {line}");
        let mut text = self.core.engine.execute_command(line)?;
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}

/// Execute a CLI command that changes a session through the same handlers as
/// corresponding MI commands.
pub fn handle_session_command(
    core: &mut Core,
    cmd: CliCommand,
    token: Option<u64>,
) -> CommandResult<Outcome> {
    let outcome = match cmd {
        CliCommand::PlatformSelect { name, sysroot } => {
            target::Handler::new(core).handle(target::Command::PlatformSelect {
                name: name.clone(),
                sysroot,
            })?;
            Outcome::Console(format!("  Platform: {name}\n"))
        }
        CliCommand::ProcessConnect { host, port } => {
            target::Handler::new(core).handle(target::Command::Connect { host, port })?;
            Outcome::Done(vec![])
        }
        CliCommand::ProcessLaunch {
            stop_at_entry,
            args,
        } => {
            run::Handler::new(core).handle(
                run::Command::Launch {
                    stop_at_entry,
                    args,
                },
                token,
            )?;
            Outcome::Done(vec![])
        }
        CliCommand::ProcessContinue => {
            r#continue::Handler::new(core).handle(token)?;
            Outcome::Done(vec![])
        }
        CliCommand::ProcessInterrupt => {
            interrupt::Handler::new(core).handle()?;
            Outcome::Done(vec![])
        }
        CliCommand::TargetCreate(path) => {
            file::Handler::new(core).handle(&path)?;
            Outcome::Console(format!("Current executable set to '{}'.\n", path.display()))
        }
        CliCommand::Passthrough(line) => Outcome::Console(Handler::new(core).handle(&line)?),
    };
    Ok(outcome)
}
