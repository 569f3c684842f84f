//! Input line parser.
//!
//! ```text
//! line     -> [token] "-" name ( " " arg )* | [token] cli-command
//! arg      -> c-string | non-blank sequence
//! ```

use super::{CommandError, CommandResult, MiCommand};
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just, none_of};
use chumsky::{extra, text, IterParser, Parser};

pub const FILE_EXEC_AND_SYMBOLS: &str = "file-exec-and-symbols";
pub const BREAK_INSERT: &str = "break-insert";
pub const BREAK_ENABLE: &str = "break-enable";
pub const BREAK_DISABLE: &str = "break-disable";
pub const EXEC_RUN: &str = "exec-run";
pub const EXEC_CONTINUE: &str = "exec-continue";
pub const EXEC_INTERRUPT: &str = "exec-interrupt";
pub const EXEC_ARGUMENTS: &str = "exec-arguments";
pub const DATA_EVALUATE_EXPRESSION: &str = "data-evaluate-expression";
pub const ENVIRONMENT_CD: &str = "environment-cd";
pub const TARGET_SELECT: &str = "target-select";
pub const THREAD_INFO: &str = "thread-info";
pub const INTERPRETER_EXEC: &str = "interpreter-exec";
pub const GDB_EXIT: &str = "gdb-exit";

pub const CONSOLE_INTERPRETER: &str = "console";
/// Alias of the console interpreter.
pub const COMMAND_INTERPRETER: &str = "command";

type Err<'a> = extra::Err<Rich<'a, char>>;

pub fn token<'a>() -> impl Parser<'a, &'a str, u64, Err<'a>> + Clone {
    text::digits(10)
        .at_least(1)
        .to_slice()
        .try_map(|s: &str, span| s.parse::<u64>().map_err(|e| Rich::custom(span, e)))
        .labelled("token")
}

/// Quoted C string with `\"`, `\\`, `\n`, `\t` and `\r` escapes.
pub fn c_string<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('"').to('"'),
        just('\\').to('\\'),
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
    )));

    none_of("\\\"")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("c-string")
}

fn bare_arg<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .filter(|c: &char| !c.is_whitespace() && *c != '"')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("argument")
}

fn command_name<'a>() -> impl Parser<'a, &'a str, &'a str, Err<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .repeated()
        .at_least(1)
        .to_slice()
        .labelled("command name")
}

fn parser<'a>() -> impl Parser<'a, &'a str, MiCommand, Err<'a>> {
    let args = choice((c_string(), bare_arg()))
        .padded()
        .repeated()
        .collect::<Vec<_>>();

    let mi = token()
        .or_not()
        .then_ignore(just('-'))
        .then(command_name())
        .then(args)
        .then_ignore(end())
        .map(|((token, name), args)| MiCommand {
            token,
            name: name.to_string(),
            args,
        });

    // a line without leading `-` is a CLI command for the console interpreter
    let cli = token()
        .or_not()
        .then(
            any()
                .filter(|c: &char| *c != '-' && !c.is_ascii_digit())
                .then(any().repeated())
                .to_slice(),
        )
        .then_ignore(end())
        .map(|(token, line): (Option<u64>, &str)| MiCommand {
            token,
            name: INTERPRETER_EXEC.to_string(),
            args: vec![CONSOLE_INTERPRETER.to_string(), line.trim().to_string()],
        });

    mi.or(cli)
}

/// Parse an input line, return `None` for an empty line.
pub fn parse_line(line: &str) -> CommandResult<Option<MiCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    parser()
        .parse(line)
        .into_result()
        .map(Some)
        .map_err(|e| CommandError::Malformed(format!("malformed command: {}", e[0])))
}

/// Return a token of a line that can't be parsed, if any.
pub fn leading_token(line: &str) -> Option<u64> {
    let line = line.trim_start();
    let digits = line
        .find(|c: char| !c.is_ascii_digit())
        .map(|end| &line[..end])
        .unwrap_or(line);
    digits.parse().ok()
}

#[test]
fn test_c_string_parser() {
    struct TestCase {
        string: &'static str,
        result: Result<&'static str, ()>,
    }
    let cases = vec![
        TestCase {
            string: r#""main""#,
            result: Ok("main"),
        },
        TestCase {
            string: r#""a \"b\" \\ c\n""#,
            result: Ok("a \"b\" \\ c\n"),
        },
        TestCase {
            string: r#""""#,
            result: Ok(""),
        },
        TestCase {
            string: r#""unterminated"#,
            result: Err(()),
        },
        TestCase {
            string: r#""bad \q escape""#,
            result: Err(()),
        },
    ];

    for tc in cases {
        let s = c_string().parse(tc.string).into_result();
        assert_eq!(s.map_err(|_| ()), tc.result.map(|s| s.to_string()));
    }
}

#[test]
fn test_parse_line() {
    struct TestCase {
        line: &'static str,
        result: Option<(Option<u64>, &'static str, Vec<&'static str>)>,
    }
    let cases = vec![
        TestCase {
            line: "1-file-exec-and-symbols a.out",
            result: Some((Some(1), "file-exec-and-symbols", vec!["a.out"])),
        },
        TestCase {
            line: "-exec-run",
            result: Some((None, "exec-run", vec![])),
        },
        TestCase {
            line: "  22-break-insert  -f   main ",
            result: Some((Some(22), "break-insert", vec!["-f", "main"])),
        },
        TestCase {
            line: r#"5-interpreter-exec console "platform select remote-linux""#,
            result: Some((
                Some(5),
                "interpreter-exec",
                vec!["console", "platform select remote-linux"],
            )),
        },
        TestCase {
            line: r#"-data-evaluate-expression "do_loop = 1""#,
            result: Some((None, "data-evaluate-expression", vec!["do_loop = 1"])),
        },
        TestCase {
            line: "7version",
            result: Some((Some(7), "interpreter-exec", vec!["console", "version"])),
        },
        TestCase {
            line: "process launch -s",
            result: Some((None, "interpreter-exec", vec!["console", "process launch -s"])),
        },
        TestCase {
            line: "3-",
            result: None,
        },
        TestCase {
            line: r#"-exec-run "unterminated"#,
            result: None,
        },
    ];

    for tc in cases {
        let result = parse_line(tc.line);
        match tc.result {
            None => assert!(result.is_err(), "line: {}", tc.line),
            Some((token, name, args)) => {
                let cmd = result.unwrap().unwrap();
                assert_eq!(cmd.token, token, "line: {}", tc.line);
                assert_eq!(cmd.name, name, "line: {}", tc.line);
                assert_eq!(cmd.args, args, "line: {}", tc.line);
            }
        }
    }

    assert_eq!(parse_line("   ").unwrap(), None);
}

#[test]
fn test_leading_token() {
    assert_eq!(leading_token("12-foo \"bad"), Some(12));
    assert_eq!(leading_token("-foo"), None);
    assert_eq!(leading_token("42"), Some(42));
}
