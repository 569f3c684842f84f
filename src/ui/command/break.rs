use crate::ui::command::{CommandError, CommandResult};
use crate::ui::mi::breakpoint::InsertOptions;
use crate::ui::mi::dispatch::Core;
use crate::ui::mi::record::Value;
use log::debug;

/// Parse `-break-insert` arguments:
/// `[-t] [-f] [-d] [-h] [-c condition] [-i ignore-count] [-p thread-id] location`.
pub fn parse_options(args: &[String]) -> CommandResult<InsertOptions> {
    let invalid = |msg: String| CommandError::InvalidArguments(format!("-break-insert: {msg}"));

    let mut options = InsertOptions::default();
    let mut location = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .cloned()
                .ok_or_else(|| invalid(format!("option {flag} requires an argument")))
        };
        match arg.as_str() {
            "-f" => options.pending = true,
            "-t" => options.temporary = true,
            "-d" => options.disabled = true,
            // hardware breakpoints are software ones here
            "-h" => {}
            "-c" => options.condition = Some(value("-c")?),
            "-i" => {
                let count = value("-i")?;
                options.ignore_count = count
                    .parse()
                    .map_err(|_| invalid(format!("invalid ignore count '{count}'")))?;
            }
            "-p" => {
                let thread = value("-p")?;
                options.thread = Some(
                    thread
                        .parse()
                        .map_err(|_| invalid(format!("invalid thread id '{thread}'")))?,
                );
            }
            flag if flag.starts_with('-') => {
                return Err(invalid(format!("unknown option '{flag}'")));
            }
            loc => {
                if location.replace(loc.to_string()).is_some() {
                    return Err(invalid("only one location allowed".to_string()));
                }
            }
        }
    }

    options.location = location.ok_or_else(|| invalid("missing location".to_string()))?;
    Ok(options)
}

/// Parse `-break-enable` and `-break-disable` arguments: one or more breakpoint numbers.
pub fn parse_numbers(name: &str, args: &[String]) -> CommandResult<Vec<u32>> {
    if args.is_empty() {
        return Err(CommandError::InvalidArguments(format!(
            "-{name}: breakpoint number required"
        )));
    }
    args.iter()
        .map(|arg| {
            arg.parse().map_err(|_| {
                CommandError::InvalidArguments(format!("-{name}: bad breakpoint number '{arg}'"))
            })
        })
        .collect()
}

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Set a breakpoint, return its `bkpt` tuple. A breakpoint number is consumed
    /// only if engine accepts a breakpoint.
    pub fn handle(&mut self, options: InsertOptions) -> CommandResult<Value> {
        let info = self
            .core
            .engine
            .set_breakpoint(&options.location, options.pending)?;
        let detailed = self.core.detailed_records;
        let brkpt = self.core.breakpoints.insert(info, options);
        debug!(
            target: "mi",
            "breakpoint {} at {} (resolved: {})",
            brkpt.number,
            brkpt.options.location,
            brkpt.resolved
        );

        Ok(if detailed {
            brkpt.tuple()
        } else {
            brkpt.short_tuple()
        })
    }

    /// Enable or disable breakpoints, a disabled breakpoint is hit silently.
    pub fn handle_enable(&mut self, numbers: &[u32], enabled: bool) -> CommandResult<()> {
        self.core
            .breakpoints
            .set_enabled(numbers, enabled)
            .map_err(|number| {
                CommandError::InvalidArguments(format!("Bad breakpoint number '{number}'"))
            })?;
        debug!(target: "mi", "breakpoints {numbers:?} enabled: {enabled}");
        Ok(())
    }
}

#[test]
fn test_parse_options() {
    struct TestCase {
        args: Vec<&'static str>,
        result: Result<InsertOptions, ()>,
    }
    let cases = vec![
        TestCase {
            args: vec!["main"],
            result: Ok(InsertOptions {
                location: "main".to_string(),
                ..Default::default()
            }),
        },
        TestCase {
            args: vec!["-f", "-t", "-c", "x == 1", "-i", "3", "-p", "2", "loop_body"],
            result: Ok(InsertOptions {
                location: "loop_body".to_string(),
                pending: true,
                temporary: true,
                disabled: false,
                condition: Some("x == 1".to_string()),
                ignore_count: 3,
                thread: Some(2),
            }),
        },
        TestCase {
            args: vec!["-d", "*0x401000"],
            result: Ok(InsertOptions {
                location: "*0x401000".to_string(),
                disabled: true,
                ..Default::default()
            }),
        },
        TestCase {
            args: vec!["-f"],
            result: Err(()),
        },
        TestCase {
            args: vec!["-i", "many", "main"],
            result: Err(()),
        },
        TestCase {
            args: vec!["-x", "main"],
            result: Err(()),
        },
        TestCase {
            args: vec!["main", "foo"],
            result: Err(()),
        },
        TestCase {
            args: vec!["main", "-c"],
            result: Err(()),
        },
    ];

    for tc in cases {
        let args: Vec<String> = tc.args.iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_options(&args).map_err(|_| ()), tc.result);
    }
}
