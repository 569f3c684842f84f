//! Command dispatcher and an interpreter core.

use crate::engine::{Engine, ThreadId};
use crate::ui::command::cli::CliCommand;
use crate::ui::command::{
    console, environment, evaluate, file, interrupt, r#break, r#continue, run, target, thread,
    Command, CommandResult, MiCommand, Outcome,
};
use crate::ui::mi::breakpoint::BreakpointTable;
use crate::ui::mi::interrupt::InterruptController;
use crate::ui::mi::record::MiResult;
use crate::ui::mi::session::Session;
use log::debug;
use std::time::Instant;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Run,
    Continue,
}

/// Resuming command whose stop is not reported yet.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub token: Option<u64>,
    pub kind: OperationKind,
    pub issued_at: Instant,
}

/// Interpreter state shared by a command path and an event path.
/// Any access is serialized by a single mutex.
pub struct Core {
    pub session: Session,
    pub breakpoints: BreakpointTable,
    pub interrupts: InterruptController,
    pub pending: Option<PendingOperation>,
    pub engine: Box<dyn Engine>,
    /// Thread of the last stop.
    pub current_thread: Option<ThreadId>,
    /// Resumes issued by the interpreter itself (skipped breakpoint hits),
    /// they are not reported with `*running` records.
    pub silent_resumes: usize,
    /// Render breakpoints and stops in gdb style, with all details.
    pub detailed_records: bool,
}

impl Core {
    pub fn new(engine: Box<dyn Engine>, detailed_records: bool) -> Self {
        Self {
            session: Session::default(),
            breakpoints: BreakpointTable::default(),
            interrupts: InterruptController::default(),
            pending: None,
            engine,
            current_thread: None,
            silent_resumes: 0,
            detailed_records,
        }
    }

    pub(crate) fn start_operation(&mut self, token: Option<u64>, kind: OperationKind) {
        self.pending = Some(PendingOperation {
            token,
            kind,
            issued_at: Instant::now(),
        });
    }

    /// Forget a pending operation (process stopped or exited).
    pub(crate) fn complete_operation(&mut self) {
        if let Some(op) = self.pending.take() {
            let token = op.token.map(|t| t.to_string()).unwrap_or_default();
            debug!(
                target: "mi",
                "{} operation (token: {token}) completed in {:?}",
                op.kind,
                op.issued_at.elapsed()
            );
        }
    }
}

/// Execute a command, return its outcome. Called with a core lock held, so an outcome record
/// is written before any asynchronous record caused by the command.
pub fn dispatch(core: &mut Core, cmd: &MiCommand) -> CommandResult<Outcome> {
    let command = Command::from_mi(cmd);
    // exit is accepted in any state, including a closed or lost session
    if !matches!(command, Ok(Command::GdbExit)) {
        core.session.check_open()?;
    }
    let command = command?;
    debug!(target: "mi", "dispatch {command:?}");

    let outcome = match command {
        Command::FileExecAndSymbols(path) => {
            file::Handler::new(core).handle(&path)?;
            Outcome::Done(vec![])
        }
        Command::BreakInsert(options) => {
            let bkpt = r#break::Handler::new(core).handle(options)?;
            Outcome::Done(vec![MiResult::new("bkpt", bkpt)])
        }
        Command::BreakEnable { numbers, enabled } => {
            r#break::Handler::new(core).handle_enable(&numbers, enabled)?;
            Outcome::Done(vec![])
        }
        Command::ExecRun { stop_at_entry } => {
            run::Handler::new(core).handle(run::Command::Run { stop_at_entry }, cmd.token)?;
            Outcome::Running
        }
        Command::ExecContinue => {
            r#continue::Handler::new(core).handle(cmd.token)?;
            Outcome::Running
        }
        Command::ExecInterrupt => {
            interrupt::Handler::new(core).handle()?;
            Outcome::Done(vec![])
        }
        Command::Evaluate(expr) => {
            let value = evaluate::Handler::new(core).handle(&expr)?;
            Outcome::Done(vec![MiResult::new("value", value)])
        }
        Command::ExecArguments(args) => {
            environment::Handler::new(core).handle(environment::Command::Arguments(args))?;
            Outcome::Done(vec![])
        }
        Command::EnvironmentCd(dir) => {
            environment::Handler::new(core).handle(environment::Command::Cd(dir))?;
            Outcome::Done(vec![])
        }
        Command::TargetSelectRemote { host, port } => {
            target::Handler::new(core).handle(target::Command::Connect { host, port })?;
            Outcome::Connected
        }
        Command::ThreadInfo => Outcome::Done(thread::Handler::new(core).handle()?),
        Command::GdbExit => {
            exit(core);
            Outcome::Exit
        }
        Command::Console(CliCommand::Passthrough(line)) => {
            Outcome::Console(console::Handler::new(core).handle(&line)?)
        }
        Command::Console(cli) => console::handle_session_command(core, cli, cmd.token)?,
    };
    Ok(outcome)
}

/// Close a session and release an engine.
pub fn exit(core: &mut Core) {
    core.session.close();
    core.interrupts.cancel();
    core.complete_operation();
    core.engine.shutdown();
}
