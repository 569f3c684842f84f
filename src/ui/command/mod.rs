//! An interface to an engine for MI clients.
//!
//! Contains commands and corresponding command handlers. Command is a request to the
//! interpreter that define an action and a list of input arguments. Command handler validate
//! command, define what exactly engine must do and return an outcome of it.

pub mod r#break;
pub mod cli;
pub mod console;
pub mod r#continue;
pub mod environment;
pub mod evaluate;
pub mod file;
pub mod interrupt;
pub mod parser;
pub mod run;
pub mod target;
pub mod thread;

use crate::engine::EngineError;
use crate::ui::mi::breakpoint::InsertOptions;
use crate::ui::mi::record::MiResult;
use crate::ui::mi::session::SessionError;
use parser::*;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Malformed(String),
    #[error("Undefined MI command: {0}")]
    Unknown(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error("not running")]
    NotRunning,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CommandError {
    /// Value of a `code` field of an error record.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CommandError::Unknown(_) => Some("undefined-command"),
            _ => None,
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// A parsed input line: `[token]-name[ args]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiCommand {
    pub token: Option<u64>,
    pub name: String,
    pub args: Vec<String>,
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `^done` with payload.
    Done(Vec<MiResult>),
    /// Console stream record followed by `^done`.
    Console(String),
    /// `^running`, a stop is reported asynchronously.
    Running,
    Connected,
    Exit,
}

/// Commands that can be processed by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FileExecAndSymbols(PathBuf),
    BreakInsert(InsertOptions),
    BreakEnable { numbers: Vec<u32>, enabled: bool },
    ExecRun { stop_at_entry: bool },
    ExecContinue,
    ExecInterrupt,
    Evaluate(String),
    ExecArguments(Vec<String>),
    EnvironmentCd(PathBuf),
    TargetSelectRemote { host: String, port: u16 },
    ThreadInfo,
    GdbExit,
    Console(cli::CliCommand),
}

fn is_console(interpreter: &str) -> bool {
    interpreter == CONSOLE_INTERPRETER || interpreter == COMMAND_INTERPRETER
}

fn single_arg(cmd: &MiCommand) -> CommandResult<String> {
    match cmd.args.as_slice() {
        [] => Err(CommandError::InvalidArguments(format!(
            "-{}: argument required",
            cmd.name
        ))),
        args => Ok(args.join(" ")),
    }
}

/// Skip gdb thread selection options that make no sense for an all-stop engine.
fn check_resume_args(cmd: &MiCommand) -> CommandResult<()> {
    let mut args = cmd.args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--all" => {}
            "--thread-group" | "--thread" => {
                args.next();
            }
            "--start" if cmd.name == EXEC_RUN => {}
            other => {
                return Err(CommandError::InvalidArguments(format!(
                    "-{}: unexpected argument '{other}'",
                    cmd.name
                )))
            }
        }
    }
    Ok(())
}

impl Command {
    /// Convert parsed MI command into a typed command.
    pub fn from_mi(cmd: &MiCommand) -> CommandResult<Command> {
        let command = match cmd.name.as_str() {
            FILE_EXEC_AND_SYMBOLS => Command::FileExecAndSymbols(single_arg(cmd)?.into()),
            BREAK_INSERT => Command::BreakInsert(r#break::parse_options(&cmd.args)?),
            BREAK_ENABLE | BREAK_DISABLE => Command::BreakEnable {
                numbers: r#break::parse_numbers(&cmd.name, &cmd.args)?,
                enabled: cmd.name == BREAK_ENABLE,
            },
            EXEC_RUN => {
                check_resume_args(cmd)?;
                Command::ExecRun {
                    stop_at_entry: cmd.args.iter().any(|a| a == "--start"),
                }
            }
            EXEC_CONTINUE => {
                check_resume_args(cmd)?;
                Command::ExecContinue
            }
            EXEC_INTERRUPT => {
                check_resume_args(cmd)?;
                Command::ExecInterrupt
            }
            DATA_EVALUATE_EXPRESSION => Command::Evaluate(single_arg(cmd)?),
            EXEC_ARGUMENTS => Command::ExecArguments(cmd.args.clone()),
            ENVIRONMENT_CD => Command::EnvironmentCd(single_arg(cmd)?.into()),
            TARGET_SELECT => {
                let (host, port) = target::parse_target_select(&cmd.args)?;
                Command::TargetSelectRemote { host, port }
            }
            THREAD_INFO => Command::ThreadInfo,
            GDB_EXIT => Command::GdbExit,
            INTERPRETER_EXEC => match cmd.args.as_slice() {
                [interpreter, line @ ..] if is_console(interpreter) && !line.is_empty() => {
                    Command::Console(cli::CliCommand::parse(&line.join(" "))?)
                }
                [interpreter, ..] if !is_console(interpreter) => {
                    return Err(CommandError::InvalidArguments(format!(
                        "-interpreter-exec: unsupported interpreter '{interpreter}'"
                    )))
                }
                _ => {
                    return Err(CommandError::InvalidArguments(
                        "-interpreter-exec: usage: -interpreter-exec console <command>"
                            .to_string(),
                    ))
                }
            },
            name => return Err(CommandError::Unknown(name.to_string())),
        };
        Ok(command)
    }
}
