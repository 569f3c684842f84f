use bugstalker_mi::engine::scripted::{FaultStyle, ScriptedControl, ScriptedEngine};
use bugstalker_mi::ui::mi::output::Output;
use bugstalker_mi::ui::mi::{Interrupter, MiApplication};
use regex::Regex;
use std::io;
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(3);
const POLL: Duration = Duration::from_millis(5);

/// Shared in-memory output.
#[derive(Clone, Default)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    pub fn lines(&self) -> Vec<String> {
        let data = self.0.lock().unwrap();
        String::from_utf8_lossy(&data)
            .lines()
            .map(ToString::to_string)
            .collect()
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Interpreter over a scripted engine with line expectations.
pub struct MiSession {
    pub app: MiApplication,
    pub control: ScriptedControl,
    out: Buffer,
    cursor: usize,
}

impl MiSession {
    pub fn new() -> Self {
        Self::with_engine(FaultStyle::Linux, false)
    }

    pub fn with_engine(style: FaultStyle, detailed: bool) -> Self {
        let engine = ScriptedEngine::new(style);
        let control = engine.control();
        let out = Buffer::default();
        let app = MiApplication::new(Box::new(engine), Output::new(out.clone(), false), detailed)
            .unwrap();
        Self {
            app,
            control,
            out,
            cursor: 0,
        }
    }

    pub fn send(&mut self, line: &str) -> ControlFlow<()> {
        self.app.handle_line(line)
    }

    pub fn interrupter(&self) -> Interrupter {
        self.app.interrupter()
    }

    /// Wait for a line that matches a pattern, skipping lines before it.
    pub fn expect(&mut self, pattern: &str) -> String {
        let re = Regex::new(pattern).unwrap();
        let started = Instant::now();
        loop {
            let lines = self.out.lines();
            if let Some(pos) = lines[self.cursor..].iter().position(|l| re.is_match(l)) {
                let line = lines[self.cursor + pos].clone();
                self.cursor += pos + 1;
                return line;
            }
            if started.elapsed() > DEADLINE {
                panic!(
                    "no line matches `{pattern}`, got: {:#?}",
                    &lines[self.cursor..]
                );
            }
            thread::sleep(POLL);
        }
    }

    /// Wait for an exact line.
    pub fn expect_line(&mut self, line: &str) {
        self.expect(&format!("^{}$", regex::escape(line)));
    }

    /// Assert that no line after the cursor matches a pattern during a short period.
    pub fn expect_none(&mut self, pattern: &str) {
        let re = Regex::new(pattern).unwrap();
        thread::sleep(Duration::from_millis(100));
        let lines = self.out.lines();
        let unexpected: Vec<_> = lines[self.cursor..]
            .iter()
            .filter(|l| re.is_match(l))
            .collect();
        assert!(unexpected.is_empty(), "unexpected lines: {unexpected:#?}");
    }

    /// Return all lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.out.lines()
    }

    /// Load `a.out`, set a breakpoint on main and run to it.
    pub fn run_to_main(&mut self) {
        self.send("1-file-exec-and-symbols a.out");
        self.expect_line("1^done");
        self.send("2-break-insert -f main");
        self.expect_line(r#"2^done,bkpt={number="1"}"#);
        self.send("3-exec-run");
        self.expect_line("3^running");
        self.expect_line(r#"*stopped,reason="breakpoint-hit",thread-id="1",stopped-threads="all""#);
    }
}
