//! Event classifier: maps raw engine stops and exits into a canonical stop vocabulary
//! and renders `*stopped` records.

use crate::engine::{AffectedThreads, ExitStatus, FrameInfo, RawStop, StopCause, ThreadId};
use crate::mi_tuple;
use crate::ui::mi::record::{MiResult, Record, Value};
use strum_macros::{Display, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum StopReason {
    BreakpointHit,
    EndSteppingRange,
    SignalReceived,
    ExceptionReceived,
    ExitedNormally,
    /// Exited with non-zero code.
    Exited,
    ExitedSignalled,
}

/// Breakpoint disposition after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Disposition {
    Keep,
    Del,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointHit {
    pub number: u32,
    pub disposition: Disposition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    /// Stopped thread, none for process exit.
    pub thread_id: Option<ThreadId>,
    pub reason: StopReason,
    pub signal_name: Option<String>,
    pub signal_meaning: Option<String>,
    /// Platform text of a hardware fault, as is.
    pub exception: Option<String>,
    pub affected: AffectedThreads,
    pub breakpoint: Option<BreakpointHit>,
    pub frame: Option<FrameInfo>,
    pub exit_code: Option<i32>,
}

impl StopEvent {
    fn new(reason: StopReason, thread_id: Option<ThreadId>) -> Self {
        Self {
            thread_id,
            reason,
            signal_name: None,
            signal_meaning: None,
            exception: None,
            affected: AffectedThreads::All,
            breakpoint: None,
            frame: None,
            exit_code: None,
        }
    }

    fn with_signal(mut self, name: &str) -> Self {
        self.signal_meaning = Some(signal_meaning(name).to_string());
        self.signal_name = Some(name.to_string());
        self
    }

    pub fn is_exit(&self) -> bool {
        matches!(
            self.reason,
            StopReason::ExitedNormally | StopReason::Exited | StopReason::ExitedSignalled
        )
    }

    /// Render `*stopped` record. In `detailed` mode breakpoint disposition, number and
    /// a frame are added, like gdb does.
    pub fn record(&self, detailed: bool) -> Record {
        let reason: &'static str = self.reason.into();
        let mut results = vec![MiResult::new("reason", reason)];

        if detailed {
            if let Some(hit) = &self.breakpoint {
                results.push(MiResult::new("disp", hit.disposition.to_string()));
                results.push(MiResult::new("bkptno", hit.number.to_string()));
            }
        }
        if let (Some(name), Some(meaning)) = (&self.signal_name, &self.signal_meaning) {
            results.push(MiResult::new("signal-name", name.as_str()));
            results.push(MiResult::new("signal-meaning", meaning.as_str()));
        }
        if let Some(exception) = &self.exception {
            results.push(MiResult::new("exception", exception.as_str()));
        }
        if let Some(code) = self.exit_code {
            results.push(MiResult::new("exit-code", code.to_string()));
        }
        if detailed {
            if let Some(frame) = &self.frame {
                results.push(MiResult::new("frame", frame_value(frame)));
            }
        }

        if let Some(thread_id) = self.thread_id {
            results.push(MiResult::new("thread-id", thread_id.to_string()));
            let stopped = match &self.affected {
                AffectedThreads::All => Value::from("all"),
                AffectedThreads::Set(ids) => {
                    Value::List(ids.iter().map(|id| Value::from(id.to_string())).collect())
                }
            };
            results.push(MiResult::new("stopped-threads", stopped));
        }

        Record::ExecAsync {
            class: "stopped",
            results,
        }
    }
}

pub fn frame_value(frame: &FrameInfo) -> Value {
    mi_tuple!(
        "addr" => format!("{:#018x}", frame.addr),
        "func" => frame.func.as_deref().unwrap_or("??"),
        "args" => Value::List(vec![]),
    )
}

/// Classify an engine stop. `breakpoint` is a hit user breakpoint, if any.
pub fn classify(stop: RawStop, breakpoint: Option<BreakpointHit>) -> StopEvent {
    let thread = Some(stop.thread);
    let mut event = match stop.cause {
        StopCause::Breakpoint { .. } => {
            let mut event = StopEvent::new(StopReason::BreakpointHit, thread);
            event.breakpoint = breakpoint;
            event
        }
        StopCause::Trace | StopCause::Entry => {
            StopEvent::new(StopReason::EndSteppingRange, thread)
        }
        StopCause::Signal { name } => {
            StopEvent::new(StopReason::SignalReceived, thread).with_signal(&name)
        }
        StopCause::Exception { description } => {
            let mut event = StopEvent::new(StopReason::ExceptionReceived, thread);
            event.exception = Some(description);
            event
        }
        StopCause::Interrupted => {
            let mut event = StopEvent::new(StopReason::SignalReceived, thread).with_signal("SIGINT");
            event.affected = AffectedThreads::All;
            event.frame = stop.frame;
            return event;
        }
    };
    event.affected = stop.affected;
    event.frame = stop.frame;
    event
}

pub fn classify_exit(status: ExitStatus) -> StopEvent {
    match status {
        ExitStatus::Code(0) => StopEvent::new(StopReason::ExitedNormally, None),
        ExitStatus::Code(code) => {
            let mut event = StopEvent::new(StopReason::Exited, None);
            event.exit_code = Some(code);
            event
        }
        ExitStatus::Signal(name) => {
            StopEvent::new(StopReason::ExitedSignalled, None).with_signal(&name)
        }
    }
}

/// Conventional description of a signal, a signal name itself for unknown signals.
pub fn signal_meaning(name: &str) -> &str {
    match name {
        "SIGHUP" => "Hangup",
        "SIGINT" => "Interrupt",
        "SIGQUIT" => "Quit",
        "SIGILL" => "Illegal instruction",
        "SIGTRAP" => "Trace/breakpoint trap",
        "SIGABRT" => "Aborted",
        "SIGBUS" => "Bus error",
        "SIGFPE" => "Arithmetic exception",
        "SIGKILL" => "Killed",
        "SIGUSR1" => "User defined signal 1",
        "SIGSEGV" => "Segmentation fault",
        "SIGUSR2" => "User defined signal 2",
        "SIGPIPE" => "Broken pipe",
        "SIGALRM" => "Alarm clock",
        "SIGTERM" => "Terminated",
        "SIGSTKFLT" => "Stack fault",
        "SIGCHLD" => "Child status changed",
        "SIGCONT" => "Continued",
        "SIGSTOP" => "Stopped (signal)",
        "SIGTSTP" => "Stopped (user)",
        "SIGTTIN" => "Stopped (tty input)",
        "SIGTTOU" => "Stopped (tty output)",
        "SIGURG" => "Urgent I/O condition",
        "SIGXCPU" => "CPU time limit exceeded",
        "SIGXFSZ" => "File size limit exceeded",
        "SIGVTALRM" => "Virtual timer expired",
        "SIGPROF" => "Profiling timer expired",
        "SIGWINCH" => "Window size changed",
        "SIGIO" => "I/O possible",
        "SIGPWR" => "Power fail/restart",
        "SIGSYS" => "Bad system call",
        _ => name,
    }
}
