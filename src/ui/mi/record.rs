//! GDB/MI output records.
//!
//! ```text
//! output     -> ( out-of-band-record )* [ result-record ] "(gdb)" nl
//! result     -> variable "=" value
//! value      -> const | tuple | list
//! const      -> c-string
//! tuple      -> "{}" | "{" result ( "," result )* "}"
//! list       -> "[]" | "[" value ( "," value )* "]" | "[" result ( "," result )* "]"
//! ```

use std::fmt;
use std::fmt::{Display, Formatter, Write};
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Const(String),
    Tuple(Vec<MiResult>),
    List(Vec<Value>),
    /// List of named values, like `[frame={..},frame={..}]`.
    ResultList(Vec<MiResult>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Const(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Const(value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(c) => write_c_string(f, c),
            Value::Tuple(results) => {
                f.write_char('{')?;
                write_separated(f, results)?;
                f.write_char('}')
            }
            Value::List(values) => {
                f.write_char('[')?;
                write_separated(f, values)?;
                f.write_char(']')
            }
            Value::ResultList(results) => {
                f.write_char('[')?;
                write_separated(f, results)?;
                f.write_char(']')
            }
        }
    }
}

/// Named value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiResult {
    pub variable: String,
    pub value: Value,
}

impl MiResult {
    pub fn new(variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            variable: variable.into(),
            value: value.into(),
        }
    }
}

impl Display for MiResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.variable, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `~`, text that should be displayed in a console.
    Console,
    /// `@`, output of a debugged program.
    Target,
    /// `&`, interpreter internal messages.
    Log,
}

impl StreamKind {
    fn prefix(self) -> char {
        match self {
            StreamKind::Console => '~',
            StreamKind::Target => '@',
            StreamKind::Log => '&',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Terminal reply to a command.
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: Vec<MiResult>,
    },
    /// `*` record, a change of execution state.
    ExecAsync {
        class: &'static str,
        results: Vec<MiResult>,
    },
    /// `=` record, supplementary information.
    NotifyAsync {
        class: &'static str,
        results: Vec<MiResult>,
    },
    Stream { kind: StreamKind, text: String },
}

impl Record {
    pub fn result(token: Option<u64>, class: ResultClass, results: Vec<MiResult>) -> Self {
        Record::Result {
            token,
            class,
            results,
        }
    }

    pub fn done(token: Option<u64>, results: Vec<MiResult>) -> Self {
        Self::result(token, ResultClass::Done, results)
    }

    pub fn error(token: Option<u64>, msg: impl Into<String>, code: Option<&str>) -> Self {
        let mut results = vec![MiResult::new("msg", msg.into())];
        if let Some(code) = code {
            results.push(MiResult::new("code", code));
        }
        Self::result(token, ResultClass::Error, results)
    }

    pub fn console(text: impl Into<String>) -> Self {
        Record::Stream {
            kind: StreamKind::Console,
            text: text.into(),
        }
    }

    pub fn log(text: impl Into<String>) -> Self {
        Record::Stream {
            kind: StreamKind::Log,
            text: text.into(),
        }
    }

    pub fn target(text: impl Into<String>) -> Self {
        Record::Stream {
            kind: StreamKind::Target,
            text: text.into(),
        }
    }

    /// `*running,thread-id="all"`
    pub fn running_all() -> Self {
        Record::ExecAsync {
            class: "running",
            results: vec![MiResult::new("thread-id", "all")],
        }
    }

    pub fn is_result(&self) -> bool {
        matches!(self, Record::Result { .. })
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (prefix, class, results) = match self {
            Record::Result {
                token,
                class,
                results,
            } => {
                if let Some(token) = token {
                    write!(f, "{token}")?;
                }
                let class: &'static str = class.into();
                ('^', class, results)
            }
            Record::ExecAsync { class, results } => ('*', *class, results),
            Record::NotifyAsync { class, results } => ('=', *class, results),
            Record::Stream { kind, text } => {
                f.write_char(kind.prefix())?;
                return write_c_string(f, text);
            }
        };

        write!(f, "{prefix}{class}")?;
        for r in results {
            write!(f, ",{r}")?;
        }
        Ok(())
    }
}

fn write_separated<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Write a string as a quoted C string, non-printable characters escaped.
fn write_c_string(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c.is_ascii_control() => write!(f, "\\{:03o}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Build a tuple value from a list of (name, value) pairs.
#[macro_export]
macro_rules! mi_tuple {
    ($($name: expr => $value: expr),* $(,)?) => {
        $crate::ui::mi::record::Value::Tuple(vec![
            $($crate::ui::mi::record::MiResult::new($name, $value)),*
        ])
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_display() {
        struct TestCase {
            record: Record,
            expected: &'static str,
        }
        let cases = vec![
            TestCase {
                record: Record::done(Some(1), vec![]),
                expected: "1^done",
            },
            TestCase {
                record: Record::done(
                    Some(2),
                    vec![MiResult::new("bkpt", mi_tuple!("number" => "1"))],
                ),
                expected: r#"2^done,bkpt={number="1"}"#,
            },
            TestCase {
                record: Record::result(None, ResultClass::Running, vec![]),
                expected: "^running",
            },
            TestCase {
                record: Record::error(Some(4), "not running", None),
                expected: r#"4^error,msg="not running""#,
            },
            TestCase {
                record: Record::error(
                    None,
                    "Undefined MI command: foo",
                    Some("undefined-command"),
                ),
                expected: r#"^error,msg="Undefined MI command: foo",code="undefined-command""#,
            },
            TestCase {
                record: Record::running_all(),
                expected: r#"*running,thread-id="all""#,
            },
            TestCase {
                record: Record::console("a \"quoted\"\tline\n"),
                expected: r#"~"a \"quoted\"\tline\n""#,
            },
            TestCase {
                record: Record::target("\x01\\"),
                expected: r#"@"\001\\""#,
            },
            TestCase {
                record: Record::log("connection lost: eof\n"),
                expected: r#"&"connection lost: eof\n""#,
            },
            TestCase {
                record: Record::done(
                    None,
                    vec![MiResult::new(
                        "threads",
                        Value::List(vec![mi_tuple!("id" => "1"), mi_tuple!("id" => "2")]),
                    )],
                ),
                expected: r#"^done,threads=[{id="1"},{id="2"}]"#,
            },
            TestCase {
                record: Record::NotifyAsync {
                    class: "breakpoint-modified",
                    results: vec![MiResult::new(
                        "bkpt",
                        mi_tuple!("number" => "1", "times" => "0"),
                    )],
                },
                expected: r#"=breakpoint-modified,bkpt={number="1",times="0"}"#,
            },
            TestCase {
                record: Record::done(
                    None,
                    vec![MiResult::new(
                        "stack",
                        Value::ResultList(vec![MiResult::new("frame", Value::Tuple(vec![]))]),
                    )],
                ),
                expected: r#"^done,stack=[frame={}]"#,
            },
        ];

        for tc in cases {
            assert_eq!(tc.record.to_string(), tc.expected);
        }
    }
}
