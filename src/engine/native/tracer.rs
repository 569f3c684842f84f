//! Tracer thread. Linux accepts ptrace requests only from the thread that attached a tracee,
//! so a debugged process is owned by a dedicated thread that serves [`Request`]s and watches
//! the process with non-blocking `waitpid`.

use crate::engine::native::breakpoint::Breakpoint;
use crate::engine::native::process::Template;
use crate::engine::native::symbol::SymbolTable;
use crate::engine::native::thread::{ThreadCtl, TraceeStatus};
use crate::engine::{
    AffectedThreads, EngineError, EngineEvent, EventSink, ExitStatus, FrameInfo, LaunchOptions,
    RawStop, StopCause, ThreadInfo,
};
use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::libc::{self, c_void, pid_t};
use nix::sys;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TRAP_BRKPT: i32 = 0x1;
const TRAP_TRACE: i32 = 0x2;
const SI_KERNEL: i32 = 0x80;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const IDLE_INTERVAL: Duration = Duration::from_millis(50);

pub type Reply<T> = mpsc::Sender<Result<T, EngineError>>;

pub enum Request {
    Resume(Reply<()>),
    Interrupt(Reply<()>),
    /// Set breakpoint at link time address, reply with a runtime address
    /// (or a link time one if process image not loaded yet).
    SetBreakpoint {
        id: u32,
        addr: u64,
        reply: Reply<u64>,
    },
    RemoveBreakpoint {
        id: u32,
        reply: Reply<()>,
    },
    ReadMemory {
        addr: u64,
        size: usize,
        reply: Reply<i64>,
    },
    WriteMemory {
        addr: u64,
        size: usize,
        value: i64,
        reply: Reply<()>,
    },
    Threads(Reply<Vec<ThreadInfo>>),
    Kill,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    /// Process forked, but program image not executed yet.
    Starting,
    Running,
    Stopped,
    Exited,
}

/// Launch parameters of a traced process.
pub struct Spawn {
    pub program: PathBuf,
    pub options: LaunchOptions,
    pub symbols: Arc<SymbolTable>,
    /// Engine breakpoint id and link time address pairs.
    pub breakpoints: Vec<(u32, u64)>,
    pub sink: Option<EventSink>,
}

/// Engine side of a tracer thread.
pub struct TracerHandle {
    requests: mpsc::Sender<Request>,
    thread: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl TracerHandle {
    /// Start a tracer thread and a debugged process in it.
    pub fn spawn(spawn: Spawn, timeout: Duration) -> Result<Self, EngineError> {
        let (requests_tx, requests_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("tracer".to_string())
            .spawn(move || {
                let mut tracer = match Tracer::install(spawn) {
                    Ok(tracer) => tracer,
                    Err(e) => {
                        _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                _ = ready_tx.send(Ok(()));
                tracer.run(requests_rx);
            })?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(Self {
                requests: requests_tx,
                thread: Some(thread),
                timeout,
            }),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(timeout.as_millis())),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::EngineGone),
        }
    }

    /// True while traced process exists.
    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Send a request and wait for a reply no longer than a configured timeout.
    pub fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T, EngineError> {
        let (tx, rx) = mpsc::channel();
        self.requests
            .send(make(tx))
            .map_err(|_| EngineError::ProcessNotRunning)?;
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(self.timeout.as_millis())),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::ProcessNotRunning),
        }
    }

    /// Kill a traced process and wait for the tracer thread.
    pub fn kill(mut self) {
        _ = self.requests.send(Request::Kill);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(target: "tracer", "tracer thread panicked");
            }
        }
    }
}

struct Tracer {
    program: PathBuf,
    pid: Pid,
    threads: ThreadCtl,
    symbols: Arc<SymbolTable>,
    load_bias: u64,
    breakpoints: Vec<Breakpoint>,
    /// Breakpoints waiting for program image.
    deferred: Vec<(u32, u64)>,
    sink: Option<EventSink>,
    stop_at_entry: bool,
    state: State,
    interrupt_requested: bool,
}

impl Tracer {
    fn install(spawn: Spawn) -> Result<Self, EngineError> {
        let template = Template::new(&spawn.program, &spawn.options, spawn.sink.clone())?;
        let pid = template.install()?;
        debug!(target: "tracer", "process {pid} installed");

        let mut tracer = Tracer {
            program: spawn.program,
            pid,
            threads: ThreadCtl::new(pid),
            symbols: spawn.symbols,
            load_bias: 0,
            breakpoints: vec![],
            deferred: spawn.breakpoints,
            sink: spawn.sink,
            stop_at_entry: spawn.options.stop_at_entry,
            state: State::Starting,
            interrupt_requested: false,
        };

        if let Err(e) = tracer.threads.cont_stopped() {
            tracer.kill();
            return Err(EngineError::Ptrace(e));
        }
        tracer.emit(EngineEvent::Resumed);
        Ok(tracer)
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            if !sink.send(event) {
                debug!(target: "tracer", "event dropped, no subscribers");
            }
        }
    }

    fn is_running(&self) -> bool {
        matches!(self.state, State::Starting | State::Running)
    }

    fn run(mut self, requests: Receiver<Request>) {
        loop {
            let wait = if self.is_running() {
                POLL_INTERVAL
            } else {
                IDLE_INTERVAL
            };

            match requests.recv_timeout(wait) {
                Ok(Request::Kill) | Err(RecvTimeoutError::Disconnected) => {
                    self.kill();
                    return;
                }
                Ok(request) => self.handle(request),
                Err(RecvTimeoutError::Timeout) => {}
            }

            if self.is_running() {
                if let Err(e) = self.poll() {
                    warn!(target: "tracer", "{e:#}");
                }
            }

            if self.state == State::Exited {
                debug!(target: "tracer", "process {} exited, tracer stopped", self.pid);
                return;
            }
        }
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Resume(reply) => _ = reply.send(self.resume()),
            Request::Interrupt(reply) => _ = reply.send(self.interrupt()),
            Request::SetBreakpoint { id, addr, reply } => {
                _ = reply.send(self.set_breakpoint(id, addr))
            }
            Request::RemoveBreakpoint { id, reply } => _ = reply.send(self.remove_breakpoint(id)),
            Request::ReadMemory { addr, size, reply } => _ = reply.send(self.read(addr, size)),
            Request::WriteMemory {
                addr,
                size,
                value,
                reply,
            } => _ = reply.send(self.write(addr, size, value)),
            Request::Threads(reply) => _ = reply.send(Ok(self.threads_info())),
            Request::Kill => self.kill(),
        }
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        match self.state {
            State::Stopped => {}
            State::Starting | State::Running => return Err(EngineError::ProcessRunning),
            State::Exited => return Err(EngineError::ProcessNotRunning),
        }

        self.step_over_breakpoints()?;
        self.threads.cont_stopped().map_err(EngineError::Ptrace)?;
        self.state = State::Running;
        self.emit(EngineEvent::Resumed);
        Ok(())
    }

    fn interrupt(&mut self) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::ProcessNotRunning);
        }
        if self.interrupt_requested {
            return Ok(());
        }

        let target = self
            .threads
            .snapshot()
            .into_iter()
            .find(|t| t.status == TraceeStatus::Running)
            .map(|t| t.tid)
            .unwrap_or(self.pid);
        sys::ptrace::interrupt(target).map_err(EngineError::Ptrace)?;
        self.interrupt_requested = true;
        Ok(())
    }

    /// Continue a single thread, inject its pending signal.
    fn cont(&mut self, tid: Pid) -> Result<(), EngineError> {
        let signal = self.threads.take_pending_signal(tid);
        match sys::ptrace::cont(tid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {
                self.threads.set_running_status(tid);
                Ok(())
            }
            Err(e) => Err(EngineError::Ptrace(e)),
        }
    }

    fn poll(&mut self) -> Result<(), EngineError> {
        loop {
            let flags = WaitPidFlag::WNOHANG | WaitPidFlag::__WALL;
            let status = match waitpid(Pid::from_raw(-1), Some(flags)) {
                Ok(WaitStatus::StillAlive) => return Ok(()),
                Ok(status) => status,
                Err(Errno::ECHILD) => {
                    warn!(target: "tracer", "process {} vanished", self.pid);
                    self.finish(ExitStatus::Signal(Signal::SIGKILL.as_str().to_string()));
                    return Ok(());
                }
                Err(e) => return Err(EngineError::Waitpid(e)),
            };
            trace!(target: "tracer", "wait status: {status:?}");

            if let Some((tid, cause)) = self.on_status(status)? {
                return self.report(tid, cause);
            }
            if self.state == State::Exited {
                return Ok(());
            }
        }
    }

    fn on_status(&mut self, status: WaitStatus) -> Result<Option<(Pid, StopCause)>, EngineError> {
        match status {
            WaitStatus::Exited(pid, code) => {
                if pid == self.pid {
                    self.finish(ExitStatus::Code(code));
                } else {
                    self.threads.remove(pid);
                }
            }
            WaitStatus::Signaled(pid, signal, _) => {
                if pid == self.pid {
                    self.finish(ExitStatus::Signal(signal.as_str().to_string()));
                } else {
                    self.threads.remove(pid);
                }
            }
            WaitStatus::PtraceEvent(pid, _, code) => {
                if self.threads.status(pid) == TraceeStatus::OutOfReach {
                    // initial stop of a new thread may come before the clone event of its parent
                    self.threads.register(pid);
                }
                self.threads.set_stop_status(pid);

                match code {
                    libc::PTRACE_EVENT_EXEC => {
                        self.on_exec()?;
                        if self.stop_at_entry {
                            return Ok(Some((pid, StopCause::Entry)));
                        }
                    }
                    libc::PTRACE_EVENT_CLONE => {
                        let tid = sys::ptrace::getevent(pid).map_err(EngineError::Ptrace)?;
                        let tid = Pid::from_raw(tid as pid_t);
                        if self.threads.status(tid) == TraceeStatus::OutOfReach {
                            self.threads.register(tid);
                        }
                    }
                    libc::PTRACE_EVENT_STOP => {
                        if self.interrupt_requested {
                            return Ok(Some((pid, StopCause::Interrupted)));
                        }
                        // initial stop of a new thread or a late interrupt trap
                    }
                    libc::PTRACE_EVENT_EXIT => {}
                    _ => {
                        warn!(target: "tracer", "unsupported ptrace event, code: {code}");
                    }
                }
                self.cont(pid)?;
            }
            WaitStatus::Stopped(pid, signal) => {
                self.threads.set_stop_status(pid);
                return self.on_signal(pid, signal);
            }
            _ => {
                warn!(target: "tracer", "unexpected wait status: {status:?}");
            }
        }

        Ok(None)
    }

    fn on_signal(
        &mut self,
        pid: Pid,
        signal: Signal,
    ) -> Result<Option<(Pid, StopCause)>, EngineError> {
        let cause = match signal {
            Signal::SIGTRAP => {
                let info = sys::ptrace::getsiginfo(pid).map_err(EngineError::Ptrace)?;
                match info.si_code {
                    TRAP_BRKPT | SI_KERNEL => match rewind_breakpoint(&self.breakpoints, pid) {
                        Some(id) => StopCause::Breakpoint { id },
                        None => signal_cause(signal),
                    },
                    TRAP_TRACE => {
                        self.cont(pid)?;
                        return Ok(None);
                    }
                    _ => signal_cause(signal),
                }
            }
            Signal::SIGSEGV | Signal::SIGBUS | Signal::SIGILL | Signal::SIGFPE => {
                let info = sys::ptrace::getsiginfo(pid).map_err(EngineError::Ptrace)?;
                let addr = unsafe { info.si_addr() } as u64;
                self.threads.set_pending_signal(pid, signal);
                StopCause::Exception {
                    description: describe_fault(signal, addr),
                }
            }
            Signal::SIGINT | Signal::SIGSTOP => signal_cause(signal),
            Signal::SIGCHLD
            | Signal::SIGWINCH
            | Signal::SIGALRM
            | Signal::SIGURG
            | Signal::SIGPROF
            | Signal::SIGIO
            | Signal::SIGVTALRM => {
                // pass silently
                self.threads.set_pending_signal(pid, signal);
                self.cont(pid)?;
                return Ok(None);
            }
            _ => {
                self.threads.set_pending_signal(pid, signal);
                signal_cause(signal)
            }
        };

        Ok(Some((pid, cause)))
    }

    /// Stop all threads and report a stop.
    fn report(&mut self, tid: Pid, cause: StopCause) -> Result<(), EngineError> {
        self.threads.set_thread_to_focus(tid);
        let breakpoints = &self.breakpoints;
        self.threads
            .interrupt_running(|t| rewind_breakpoint(breakpoints, t).is_some())
            .map_err(EngineError::Ptrace)?;

        self.interrupt_requested = false;
        self.state = State::Stopped;

        let frame = self.frame(tid);
        self.emit(EngineEvent::Stopped(RawStop {
            thread: self.threads.number(tid),
            cause,
            affected: AffectedThreads::All,
            frame,
        }));
        Ok(())
    }

    fn finish(&mut self, status: ExitStatus) {
        debug!(target: "tracer", "process {} finished: {status:?}", self.pid);
        self.state = State::Exited;
        self.breakpoints.clear();
        self.emit(EngineEvent::Exited(status));
    }

    fn on_exec(&mut self) -> Result<(), EngineError> {
        self.load_bias = if self.symbols.is_pie() {
            self.mapping_addr()?
        } else {
            0
        };
        debug!(target: "tracer", "program image loaded, load bias: {:#x}", self.load_bias);

        for (id, addr) in std::mem::take(&mut self.deferred) {
            if let Err(e) = self.insert_breakpoint(id, addr) {
                warn!(target: "tracer", "breakpoint {id} at {addr:#x} not installed: {e:#}");
            }
        }
        self.state = State::Running;
        Ok(())
    }

    fn mapping_addr(&self) -> Result<u64, EngineError> {
        let program = self.program.canonicalize()?;
        proc_maps::get_process_maps(self.pid.as_raw())?
            .into_iter()
            .filter(|map| map.filename() == Some(program.as_path()))
            .map(|map| map.start() as u64)
            .min()
            .ok_or_else(|| {
                EngineError::InvalidTarget(self.program.clone(), "mapping not found".to_string())
            })
    }

    fn frame(&self, tid: Pid) -> Option<FrameInfo> {
        let regs = crate::muted_error!(sys::ptrace::getregs(tid))?;
        let func = self
            .symbols
            .function_at(regs.rip.wrapping_sub(self.load_bias))
            .map(|s| s.name.clone());
        Some(FrameInfo {
            addr: regs.rip,
            func,
        })
    }

    /// Move threads that stay at enabled breakpoints one instruction forward.
    fn step_over_breakpoints(&mut self) -> Result<(), EngineError> {
        for thread in self.threads.snapshot() {
            if thread.status != TraceeStatus::Stopped {
                continue;
            }
            let Some(regs) = crate::muted_error!(sys::ptrace::getregs(thread.tid)) else {
                continue;
            };
            let Some(brkpt) = self
                .breakpoints
                .iter_mut()
                .find(|b| b.addr == regs.rip && b.is_enabled())
            else {
                continue;
            };

            brkpt.disable(thread.tid).map_err(EngineError::Ptrace)?;
            let stepped = single_step(thread.tid);
            brkpt.enable(thread.tid).map_err(EngineError::Ptrace)?;

            match stepped? {
                StepResult::Done => {}
                StepResult::Signal(signal) => self.threads.set_pending_signal(thread.tid, signal),
                StepResult::Gone => self.threads.remove(thread.tid),
            }
        }
        Ok(())
    }

    fn insert_breakpoint(&mut self, id: u32, addr: u64) -> Result<u64, EngineError> {
        let addr = addr + self.load_bias;
        let mut brkpt = Breakpoint::new(id, addr);
        brkpt.enable(self.pid).map_err(EngineError::Ptrace)?;
        self.breakpoints.push(brkpt);
        Ok(addr)
    }

    /// Run `f` while all threads of a running process are stopped.
    fn with_stopped_world<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let breakpoints = &self.breakpoints;
        self.threads
            .interrupt_running(|t| rewind_breakpoint(breakpoints, t).is_some())
            .map_err(EngineError::Ptrace)?;
        let result = f(self);
        self.threads.cont_stopped().map_err(EngineError::Ptrace)?;
        result
    }

    fn set_breakpoint(&mut self, id: u32, addr: u64) -> Result<u64, EngineError> {
        match self.state {
            State::Starting => {
                self.deferred.push((id, addr));
                Ok(addr)
            }
            State::Stopped => self.insert_breakpoint(id, addr),
            State::Running => self.with_stopped_world(|t| t.insert_breakpoint(id, addr)),
            State::Exited => Err(EngineError::ProcessNotRunning),
        }
    }

    fn remove_breakpoint(&mut self, id: u32) -> Result<(), EngineError> {
        self.deferred.retain(|(deferred_id, _)| *deferred_id != id);
        let Some(idx) = self.breakpoints.iter().position(|b| b.id == id) else {
            return Ok(());
        };

        let pid = self.pid;
        match self.state {
            State::Stopped => self.breakpoints[idx]
                .disable(pid)
                .map_err(EngineError::Ptrace)?,
            State::Running | State::Starting => self.with_stopped_world(|t| {
                t.breakpoints[idx].disable(pid).map_err(EngineError::Ptrace)
            })?,
            State::Exited => {}
        }
        self.breakpoints.remove(idx);
        Ok(())
    }

    fn read(&self, addr: u64, size: usize) -> Result<i64, EngineError> {
        if self.state != State::Stopped {
            return Err(EngineError::ProcessRunning);
        }
        let addr = (addr + self.load_bias) as usize as *mut c_void;
        let word = sys::ptrace::read(self.pid, addr).map_err(EngineError::Ptrace)? as i64;
        let shift = 64 - (size.clamp(1, 8) * 8) as u32;
        Ok(word.wrapping_shl(shift).wrapping_shr(shift))
    }

    fn write(&self, addr: u64, size: usize, value: i64) -> Result<(), EngineError> {
        if self.state != State::Stopped {
            return Err(EngineError::ProcessRunning);
        }
        let addr = (addr + self.load_bias) as usize as *mut c_void;
        let word = sys::ptrace::read(self.pid, addr).map_err(EngineError::Ptrace)? as u64;
        let mask = match size {
            8.. => u64::MAX,
            size => (1u64 << (size.max(1) * 8)) - 1,
        };
        let data = (word & !mask) | (value as u64 & mask);
        unsafe {
            sys::ptrace::write(self.pid, addr, data as *mut c_void).map_err(EngineError::Ptrace)?;
        }
        Ok(())
    }

    fn threads_info(&self) -> Vec<ThreadInfo> {
        self.threads
            .snapshot()
            .into_iter()
            .map(|t| {
                let stopped = t.status == TraceeStatus::Stopped;
                ThreadInfo {
                    id: t.number,
                    target_id: format!("Thread {}", t.tid),
                    frame: if stopped { self.frame(t.tid) } else { None },
                    stopped,
                }
            })
            .collect()
    }

    fn kill(&mut self) {
        if self.state == State::Exited {
            return;
        }
        if let Err(e) = sys::signal::kill(self.pid, Signal::SIGKILL) {
            warn!(target: "tracer", "kill process {}: {e}", self.pid);
        }
        loop {
            match waitpid(self.pid, Some(WaitPidFlag::__WALL)) {
                Ok(WaitStatus::Exited(_, _)) | Ok(WaitStatus::Signaled(_, _, _)) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        self.state = State::Exited;
        debug!(target: "tracer", "process {} killed", self.pid);
    }
}

enum StepResult {
    Done,
    Signal(Signal),
    Gone,
}

fn single_step(tid: Pid) -> Result<StepResult, EngineError> {
    // a late interrupt trap may fire before an instruction executes, retry in this case
    for _ in 0..3 {
        sys::ptrace::step(tid, None).map_err(EngineError::Ptrace)?;
        match waitpid(tid, Some(WaitPidFlag::__WALL)).map_err(EngineError::Waitpid)? {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => return Ok(StepResult::Done),
            WaitStatus::PtraceEvent(_, _, libc::PTRACE_EVENT_STOP) => continue,
            WaitStatus::Stopped(_, signal) => return Ok(StepResult::Signal(signal)),
            WaitStatus::Exited(_, _) | WaitStatus::Signaled(_, _, _) => {
                return Ok(StepResult::Gone)
            }
            _ => return Ok(StepResult::Done),
        }
    }
    Ok(StepResult::Done)
}

/// If thread stays right after an int3 of known breakpoint, move it back to breakpoint address.
fn rewind_breakpoint(breakpoints: &[Breakpoint], tid: Pid) -> Option<u32> {
    let mut regs = crate::muted_error!(sys::ptrace::getregs(tid))?;
    let pc = regs.rip.wrapping_sub(1);
    let brkpt = breakpoints
        .iter()
        .find(|b| b.addr == pc && b.is_enabled())?;
    regs.rip = pc;
    crate::weak_error!(sys::ptrace::setregs(tid, regs), "rewind breakpoint:")?;
    Some(brkpt.id)
}

fn signal_cause(signal: Signal) -> StopCause {
    StopCause::Signal {
        name: signal.as_str().to_string(),
    }
}

fn describe_fault(signal: Signal, addr: u64) -> String {
    let kind = match signal {
        Signal::SIGSEGV => "invalid address",
        Signal::SIGBUS => "bus error",
        Signal::SIGILL => "illegal instruction",
        _ => "arithmetic exception",
    };
    format!("{kind} (fault address: {addr:#x})")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_describe_fault() {
        assert_eq!(
            describe_fault(Signal::SIGSEGV, 0),
            "invalid address (fault address: 0x0)"
        );
        assert_eq!(
            describe_fault(Signal::SIGBUS, 0x1000),
            "bus error (fault address: 0x1000)"
        );
    }
}
