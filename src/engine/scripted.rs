//! In-memory engine that simulates a tiny program:
//!
//! ```text
//! int do_loop, do_segfault, exit_code;
//! void loop_body() {}
//! int main() {
//!     if (do_segfault) *(volatile int *)0 = 0;
//!     while (do_loop) loop_body();
//!     return exit_code;
//! }
//! ```
//!
//! Global variables can be read and assigned with [`Engine::evaluate`]. External influence on
//! a "running" program (OS signals, exit, remote connection drop, library load) is simulated
//! with a [`ScriptedControl`] handle.

use crate::engine::expression::{undeclared, Expression};
use crate::engine::{
    parse_address, AffectedThreads, BreakpointInfo, Engine, EngineError, EngineEvent, EventSink, ExitStatus,
    FrameInfo, LaunchOptions, OutputStream, RawStop, StopCause, ThreadInfo,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const MAIN_ADDR: u64 = 0x401000;
const LOOP_BODY_ADDR: u64 = 0x401040;
const ENTRY_ADDR: u64 = 0x400f00;
const FAULT_ADDR: u64 = 0x401010;
const SCRIPTED_PID: u32 = 4242;

/// Text form of an invalid memory access report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStyle {
    /// `invalid address (fault address: 0x0)`
    Linux,
    /// `EXC_BAD_ACCESS (code=1, address=0x0)`
    Darwin,
}

impl FaultStyle {
    fn describe(self, addr: u64) -> String {
        match self {
            FaultStyle::Linux => format!("invalid address (fault address: {addr:#x})"),
            FaultStyle::Darwin => format!("EXC_BAD_ACCESS (code=1, address={addr:#x})"),
        }
    }
}

/// Position of a simulated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Entry,
    Main,
    LoopBody,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Process {
    None,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connection {
    Local,
    Remote,
    Lost,
}

#[derive(Debug)]
struct ScriptedBreakpoint {
    id: u32,
    location: String,
    addr: Option<u64>,
}

#[derive(Debug)]
struct Script {
    sink: Option<EventSink>,
    target: Option<PathBuf>,
    platform: Option<String>,
    connection: Connection,
    remote_reachable: bool,
    fault_style: FaultStyle,

    process: Process,
    position: Position,
    pending_signal: Option<String>,
    globals: HashMap<String, i64>,
    functions: HashMap<String, u64>,

    breakpoints: Vec<ScriptedBreakpoint>,
    next_breakpoint_id: u32,

    calls: HashMap<&'static str, usize>,
}

impl Script {
    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            if !sink.send(event) {
                log::debug!(target: "engine", "event dropped, no subscribers");
            }
        }
    }

    fn count(&mut self, call: &'static str) {
        *self.calls.entry(call).or_default() += 1;
    }

    fn check_transport(&self) -> Result<(), EngineError> {
        if self.connection == Connection::Lost {
            return Err(EngineError::TransportLost("remote connection closed".to_string()));
        }
        Ok(())
    }

    fn frame(&self) -> FrameInfo {
        let (addr, func) = match self.position {
            Position::Entry => (ENTRY_ADDR, "_start"),
            Position::Main => (MAIN_ADDR, "main"),
            Position::LoopBody => (LOOP_BODY_ADDR, "loop_body"),
            Position::Faulted => (FAULT_ADDR, "main"),
        };
        FrameInfo {
            addr,
            func: Some(func.to_string()),
        }
    }

    fn global(&self, name: &str) -> i64 {
        self.globals.get(name).copied().unwrap_or_default()
    }

    fn breakpoint_at(&self, addr: u64) -> Option<u32> {
        self.breakpoints
            .iter()
            .find(|b| b.addr == Some(addr))
            .map(|b| b.id)
    }

    fn stop(&mut self, cause: StopCause) {
        self.process = Process::Stopped;
        let frame = self.frame();
        self.emit(EngineEvent::Stopped(RawStop {
            thread: 1,
            cause,
            affected: AffectedThreads::All,
            frame: Some(frame),
        }));
    }

    fn exit(&mut self, status: ExitStatus) {
        self.process = Process::None;
        self.position = Position::Entry;
        self.pending_signal = None;
        self.emit(EngineEvent::Exited(status));
    }

    /// Run a program from current position until next stop, exit or endless loop.
    fn run(&mut self) {
        self.process = Process::Running;
        self.emit(EngineEvent::Resumed);

        if let Some(signal) = self.pending_signal.take() {
            self.exit(ExitStatus::Signal(signal));
            return;
        }

        loop {
            match self.position {
                Position::Entry => {
                    self.position = Position::Main;
                    if let Some(id) = self.breakpoint_at(MAIN_ADDR) {
                        self.stop(StopCause::Breakpoint { id });
                        return;
                    }
                }
                Position::Main | Position::LoopBody => {
                    if self.global("do_segfault") != 0 {
                        self.position = Position::Faulted;
                        self.pending_signal = Some("SIGSEGV".to_string());
                        let description = self.fault_style.describe(0);
                        self.stop(StopCause::Exception { description });
                        return;
                    }

                    if self.global("do_loop") != 0 {
                        self.position = Position::LoopBody;
                        if let Some(id) = self.breakpoint_at(LOOP_BODY_ADDR) {
                            self.stop(StopCause::Breakpoint { id });
                        }
                        // otherwise loop forever, until interrupted
                        return;
                    }

                    self.emit(EngineEvent::Output {
                        stream: OutputStream::Stdout,
                        text: "bye\n".to_string(),
                    });
                    let code = self.global("exit_code") as i32;
                    self.exit(ExitStatus::Code(code));
                    return;
                }
                Position::Faulted => {
                    self.exit(ExitStatus::Signal("SIGSEGV".to_string()));
                    return;
                }
            }
        }
    }

    fn evaluate(&mut self, expression: &str) -> Result<String, EngineError> {
        let expression = Expression::parse(expression)?;
        let snapshot = self.globals.clone();
        expression.evaluate(
            |name| snapshot.get(name).copied().ok_or_else(|| undeclared(name)),
            |name, value| match self.globals.get_mut(name) {
                Some(global) => {
                    *global = value;
                    Ok(())
                }
                None => Err(undeclared(name)),
            },
        )
    }
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deterministic engine simulation, see module level documentation.
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new(FaultStyle::Linux)
    }
}

impl ScriptedEngine {
    pub fn new(fault_style: FaultStyle) -> Self {
        let globals = ["do_loop", "do_segfault", "exit_code"]
            .into_iter()
            .map(|name| (name.to_string(), 0))
            .collect();
        let functions = [("main", MAIN_ADDR), ("loop_body", LOOP_BODY_ADDR)]
            .into_iter()
            .map(|(name, addr)| (name.to_string(), addr))
            .collect();

        Self {
            script: Arc::new(Mutex::new(Script {
                sink: None,
                target: None,
                platform: None,
                connection: Connection::Local,
                remote_reachable: true,
                fault_style,
                process: Process::None,
                position: Position::Entry,
                pending_signal: None,
                globals,
                functions,
                breakpoints: vec![],
                next_breakpoint_id: 1,
                calls: HashMap::new(),
            })),
        }
    }

    /// Return a handle for simulating external influence on the engine.
    pub fn control(&self) -> ScriptedControl {
        ScriptedControl {
            script: self.script.clone(),
        }
    }
}

impl Engine for ScriptedEngine {
    fn subscribe(&mut self, sink: EventSink) {
        lock(&self.script).sink = Some(sink);
    }

    fn create_target(&mut self, path: &Path) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("create_target");
        script.check_transport()?;
        if path.as_os_str().is_empty() {
            return Err(EngineError::TargetNotFound(path.to_path_buf()));
        }
        script.target = Some(path.to_path_buf());
        Ok(())
    }

    fn select_platform(&mut self, name: &str, _sysroot: Option<&str>) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("select_platform");
        match name {
            "host" | "remote-linux" | "remote-macosx" | "remote-gdb-server" => {
                script.platform = Some(name.to_string());
                Ok(())
            }
            _ => Err(EngineError::Unsupported("platform")),
        }
    }

    fn connect_remote(&mut self, host: &str, port: u16) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("connect_remote");
        if !script.remote_reachable {
            return Err(EngineError::Connect(
                format!("{host}:{port}"),
                "connection refused".to_string(),
            ));
        }
        script.connection = Connection::Remote;
        Ok(())
    }

    fn launch(&mut self, options: &LaunchOptions) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("launch");
        script.check_transport()?;
        if script.target.is_none() {
            return Err(EngineError::NoTarget);
        }
        if script.process != Process::None {
            return Err(EngineError::ProcessRunning);
        }

        script.position = Position::Entry;
        if options.stop_at_entry {
            script.process = Process::Running;
            script.emit(EngineEvent::Resumed);
            script.stop(StopCause::Entry);
        } else {
            script.run();
        }
        Ok(())
    }

    fn set_breakpoint(
        &mut self,
        location: &str,
        pending: bool,
    ) -> Result<BreakpointInfo, EngineError> {
        let mut script = lock(&self.script);
        script.count("set_breakpoint");
        script.check_transport()?;

        let (addr, func) = match parse_address(location) {
            Some(addr) => {
                let func = script
                    .functions
                    .iter()
                    .find(|(_, a)| **a == addr)
                    .map(|(name, _)| name.clone());
                (Some(addr), func)
            }
            None => (
                script.functions.get(location).copied(),
                Some(location.to_string()),
            ),
        };

        if addr.is_none() && !pending {
            return Err(EngineError::UnresolvedLocation(location.to_string()));
        }

        let id = script.next_breakpoint_id;
        script.next_breakpoint_id += 1;
        script.breakpoints.push(ScriptedBreakpoint {
            id,
            location: location.to_string(),
            addr,
        });

        Ok(BreakpointInfo {
            id,
            resolved: addr.is_some(),
            addr,
            func: func.filter(|_| addr.is_some()),
        })
    }

    fn remove_breakpoint(&mut self, id: u32) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("remove_breakpoint");
        script.breakpoints.retain(|b| b.id != id);
        Ok(())
    }

    fn evaluate(&mut self, expression: &str) -> Result<String, EngineError> {
        let mut script = lock(&self.script);
        script.count("evaluate");
        script.check_transport()?;
        if script.process == Process::Running {
            return Err(EngineError::ProcessRunning);
        }
        script.evaluate(expression)
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("resume");
        script.check_transport()?;
        match script.process {
            Process::Stopped => {
                script.run();
                Ok(())
            }
            Process::Running => Err(EngineError::ProcessRunning),
            Process::None => Err(EngineError::ProcessNotRunning),
        }
    }

    fn interrupt(&mut self) -> Result<(), EngineError> {
        let mut script = lock(&self.script);
        script.count("interrupt");
        script.check_transport()?;
        if script.process != Process::Running {
            return Err(EngineError::ProcessNotRunning);
        }
        script.stop(StopCause::Interrupted);
        Ok(())
    }

    fn threads(&mut self) -> Result<Vec<ThreadInfo>, EngineError> {
        let script = lock(&self.script);
        script.check_transport()?;
        if script.process == Process::None {
            return Ok(vec![]);
        }
        Ok(vec![ThreadInfo {
            id: 1,
            target_id: format!("Thread {SCRIPTED_PID}"),
            frame: (script.process == Process::Stopped).then(|| script.frame()),
            stopped: script.process == Process::Stopped,
        }])
    }

    fn execute_command(&mut self, line: &str) -> Result<String, EngineError> {
        let mut script = lock(&self.script);
        script.count("execute_command");
        script.check_transport()?;

        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        match command {
            "version" => Ok("scripted engine 1.0\n".to_string()),
            "expression" | "expr" | "print" | "p" => {
                let value = script.evaluate(rest)?;
                Ok(format!("{} = {value}\n", rest.trim()))
            }
            "breakpoint" if rest.trim() == "list" => Ok(script
                .breakpoints
                .iter()
                .map(|b| format!("{}: {}\n", b.id, b.location))
                .collect()),
            _ => Err(EngineError::UnknownCommand(line.trim().to_string())),
        }
    }

    fn shutdown(&mut self) {
        let mut script = lock(&self.script);
        script.count("shutdown");
        script.process = Process::None;
        script.sink = None;
    }
}

/// Handle for simulating things that happen outside of the interpreter control.
#[derive(Clone)]
pub struct ScriptedControl {
    script: Arc<Mutex<Script>>,
}

impl ScriptedControl {
    /// Deliver an OS signal into a running process. Return false if there is no running process.
    pub fn raise(&self, signal: &str) -> bool {
        let mut script = lock(&self.script);
        if script.process != Process::Running {
            return false;
        }
        if signal == "SIGKILL" {
            script.exit(ExitStatus::Signal(signal.to_string()));
        } else {
            script.stop(StopCause::Signal {
                name: signal.to_string(),
            });
        }
        true
    }

    /// Terminate a process with exit code. Return false if there is no process.
    pub fn exit(&self, code: i32) -> bool {
        let mut script = lock(&self.script);
        if script.process == Process::None {
            return false;
        }
        script.exit(ExitStatus::Code(code));
        true
    }

    /// Make remote connections succeed or fail.
    pub fn set_remote_reachable(&self, reachable: bool) {
        lock(&self.script).remote_reachable = reachable;
    }

    /// Drop a remote connection.
    pub fn drop_connection(&self, reason: &str) {
        let mut script = lock(&self.script);
        script.connection = Connection::Lost;
        script.process = Process::None;
        script.emit(EngineEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Simulate a shared library load that brings new functions in,
    /// pending breakpoints on those functions become resolved.
    pub fn load_library(&self, functions: &[(&str, u64)]) {
        let mut script = lock(&self.script);
        for (name, addr) in functions {
            script.functions.insert(name.to_string(), *addr);
        }

        let mut resolved = vec![];
        for brkpt in script.breakpoints.iter_mut().filter(|b| b.addr.is_none()) {
            if let Some((name, addr)) = functions.iter().find(|(name, _)| *name == brkpt.location)
            {
                brkpt.addr = Some(*addr);
                resolved.push(BreakpointInfo {
                    id: brkpt.id,
                    resolved: true,
                    addr: Some(*addr),
                    func: Some(name.to_string()),
                });
            }
        }
        for info in resolved {
            script.emit(EngineEvent::BreakpointResolved(info));
        }
    }

    /// Push an arbitrary event, as if it came from the engine.
    pub fn emit(&self, event: EngineEvent) {
        lock(&self.script).emit(event);
    }

    /// Return a number of times engine method was called.
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.script).calls.get(method).copied().unwrap_or_default()
    }
}
