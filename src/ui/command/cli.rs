//! Console (CLI) commands accepted by `-interpreter-exec console`.
//!
//! Commands that change a session are handled by the interpreter itself, all others are
//! passed to the engine as is:
//!
//! ```text
//! platform select <name> [--sysroot <dir>]
//! process connect [-p <plugin>] connect://<host>:<port>
//! process launch [-s] [-- <args>...]
//! process continue | continue
//! process interrupt
//! target create <file>
//! ```

use super::parser::c_string;
use super::{CommandError, CommandResult};
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just};
use chumsky::{extra, text, IterParser, Parser};
use std::path::PathBuf;

pub const PLATFORM_COMMAND: &str = "platform";
pub const PLATFORM_SELECT_SUBCOMMAND: &str = "select";
pub const PROCESS_COMMAND: &str = "process";
pub const PROCESS_CONNECT_SUBCOMMAND: &str = "connect";
pub const PROCESS_LAUNCH_SUBCOMMAND: &str = "launch";
pub const PROCESS_CONTINUE_SUBCOMMAND: &str = "continue";
pub const PROCESS_INTERRUPT_SUBCOMMAND: &str = "interrupt";
pub const CONTINUE_COMMAND: &str = "continue";
pub const TARGET_COMMAND: &str = "target";
pub const TARGET_CREATE_SUBCOMMAND: &str = "create";

type Err<'a> = extra::Err<Rich<'a, char>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    PlatformSelect {
        name: String,
        sysroot: Option<String>,
    },
    ProcessConnect {
        host: String,
        port: u16,
    },
    ProcessLaunch {
        stop_at_entry: bool,
        /// Program arguments, if none - arguments from `-exec-arguments` are used.
        args: Option<Vec<String>>,
    },
    ProcessContinue,
    ProcessInterrupt,
    TargetCreate(PathBuf),
    /// Command for an engine.
    Passthrough(String),
}

/// `<host>:<port>` pair.
pub fn host_port<'a>() -> impl Parser<'a, &'a str, (String, u16), Err<'a>> + Clone {
    let host = any()
        .filter(|c: &char| *c != ':' && !c.is_whitespace())
        .repeated()
        .to_slice();
    let port = text::digits(10)
        .at_least(1)
        .to_slice()
        .try_map(|s: &str, span| s.parse::<u16>().map_err(|e| Rich::custom(span, e)));

    host.then_ignore(just(':'))
        .then(port)
        .map(|(host, port): (&str, u16)| {
            let host = if host.is_empty() { "localhost" } else { host };
            (host.to_string(), port)
        })
        .labelled("host:port")
}

fn parser<'a>() -> impl Parser<'a, &'a str, CliCommand, Err<'a>> {
    let op = |sym| just(sym).padded();
    let word = any()
        .filter(|c: &char| !c.is_whitespace() && *c != '"')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string());
    let arg = choice((c_string(), word)).padded();

    let platform_select = op(PLATFORM_COMMAND)
        .then(op(PLATFORM_SELECT_SUBCOMMAND))
        .ignore_then(arg.clone())
        .then(op("--sysroot").ignore_then(arg.clone()).or_not())
        .map(|(name, sysroot)| CliCommand::PlatformSelect { name, sysroot });

    let process_connect = op(PROCESS_COMMAND)
        .then(op(PROCESS_CONNECT_SUBCOMMAND))
        .then(op("-p").then(arg.clone()).or_not())
        .ignore_then(just("connect://").ignore_then(host_port()).padded())
        .map(|(host, port)| CliCommand::ProcessConnect { host, port });

    let process_launch = op(PROCESS_COMMAND)
        .then(op(PROCESS_LAUNCH_SUBCOMMAND))
        .ignore_then(op("-s").or_not().map(|s| s.is_some()))
        .then(
            op("--")
                .ignore_then(arg.clone().repeated().collect::<Vec<_>>())
                .or_not(),
        )
        .map(|(stop_at_entry, args)| CliCommand::ProcessLaunch {
            stop_at_entry,
            args,
        });

    let process_continue = choice((
        op(PROCESS_COMMAND)
            .then(op(PROCESS_CONTINUE_SUBCOMMAND))
            .ignored(),
        op(CONTINUE_COMMAND).ignored(),
    ))
    .to(CliCommand::ProcessContinue);

    let process_interrupt = op(PROCESS_COMMAND)
        .then(op(PROCESS_INTERRUPT_SUBCOMMAND))
        .to(CliCommand::ProcessInterrupt);

    let target_create = op(TARGET_COMMAND)
        .then(op(TARGET_CREATE_SUBCOMMAND))
        .ignore_then(arg)
        .map(|file| CliCommand::TargetCreate(file.into()));

    choice((
        platform_select.then_ignore(end()),
        process_connect.then_ignore(end()),
        process_launch.then_ignore(end()),
        process_continue.then_ignore(end()),
        process_interrupt.then_ignore(end()),
        target_create.then_ignore(end()),
    ))
}

impl CliCommand {
    pub fn parse(line: &str) -> CommandResult<CliCommand> {
        let line = line.trim();
        match parser().parse(line).into_result() {
            Ok(cmd) => Ok(cmd),
            Err(errors) => {
                // a session command with bad arguments must not reach the engine
                let mut words = line.split_whitespace();
                let session_command = matches!(
                    (words.next(), words.next()),
                    (Some(PLATFORM_COMMAND), Some(PLATFORM_SELECT_SUBCOMMAND))
                        | (Some(PROCESS_COMMAND), Some(PROCESS_CONNECT_SUBCOMMAND))
                        | (Some(PROCESS_COMMAND), Some(PROCESS_LAUNCH_SUBCOMMAND))
                        | (Some(TARGET_COMMAND), Some(TARGET_CREATE_SUBCOMMAND))
                );
                if session_command {
                    return Err(CommandError::InvalidArguments(format!(
                        "{line}: {}",
                        errors[0]
                    )));
                }
                Ok(CliCommand::Passthrough(line.to_string()))
            }
        }
    }
}

#[test]
fn test_cli_parser() {
    struct TestCase {
        line: &'static str,
        result: Result<CliCommand, ()>,
    }
    let cases = vec![
        TestCase {
            line: "platform select remote-linux",
            result: Ok(CliCommand::PlatformSelect {
                name: "remote-linux".to_string(),
                sysroot: None,
            }),
        },
        TestCase {
            line: "platform select remote-linux --sysroot \"/opt/root fs\"",
            result: Ok(CliCommand::PlatformSelect {
                name: "remote-linux".to_string(),
                sysroot: Some("/opt/root fs".to_string()),
            }),
        },
        TestCase {
            line: "process connect connect://localhost:5432",
            result: Ok(CliCommand::ProcessConnect {
                host: "localhost".to_string(),
                port: 5432,
            }),
        },
        TestCase {
            line: "process connect -p gdb-remote connect://:5432",
            result: Ok(CliCommand::ProcessConnect {
                host: "localhost".to_string(),
                port: 5432,
            }),
        },
        TestCase {
            line: "process connect connect://localhost:99999",
            result: Err(()),
        },
        TestCase {
            line: "process launch",
            result: Ok(CliCommand::ProcessLaunch {
                stop_at_entry: false,
                args: None,
            }),
        },
        TestCase {
            line: "process launch -s -- 1 \"two words\"",
            result: Ok(CliCommand::ProcessLaunch {
                stop_at_entry: true,
                args: Some(vec!["1".to_string(), "two words".to_string()]),
            }),
        },
        TestCase {
            line: "process continue",
            result: Ok(CliCommand::ProcessContinue),
        },
        TestCase {
            line: "continue",
            result: Ok(CliCommand::ProcessContinue),
        },
        TestCase {
            line: "process interrupt",
            result: Ok(CliCommand::ProcessInterrupt),
        },
        TestCase {
            line: "target create /bin/ls",
            result: Ok(CliCommand::TargetCreate("/bin/ls".into())),
        },
        TestCase {
            line: "target create",
            result: Err(()),
        },
        TestCase {
            line: "breakpoint list",
            result: Ok(CliCommand::Passthrough("breakpoint list".to_string())),
        },
        TestCase {
            line: "  version ",
            result: Ok(CliCommand::Passthrough("version".to_string())),
        },
    ];

    for tc in cases {
        let result = CliCommand::parse(tc.line);
        assert_eq!(result.map_err(|_| ()), tc.result, "line: {}", tc.line);
    }
}
