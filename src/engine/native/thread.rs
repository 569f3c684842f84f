use crate::engine::ThreadId;
use itertools::Itertools;
use log::warn;
use nix::errno::Errno;
use nix::libc;
use nix::sys;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::BTreeMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceeStatus {
    /// Known by PTRACE_EVENT_CLONE, but initial stop not observed yet.
    Created,
    Stopped,
    Running,
    OutOfReach,
}

#[derive(Clone, Debug)]
pub struct Tracee {
    pub tid: Pid,
    /// Sequential thread number, main thread is 1.
    pub number: ThreadId,
    pub status: TraceeStatus,
    /// Signal that will be injected at next resume.
    pub pending_signal: Option<Signal>,
}

/// Threads of a debugged process.
pub struct ThreadCtl {
    process_pid: Pid,
    in_focus_tid: Pid,
    threads: BTreeMap<Pid, Tracee>,
    next_number: ThreadId,
}

impl ThreadCtl {
    pub fn new(proc_pid: Pid) -> ThreadCtl {
        Self {
            process_pid: proc_pid,
            in_focus_tid: proc_pid,
            threads: BTreeMap::from([(
                proc_pid,
                Tracee {
                    tid: proc_pid,
                    number: 1,
                    status: TraceeStatus::Stopped,
                    pending_signal: None,
                },
            )]),
            next_number: 2,
        }
    }

    /// Return pid of debugged process main thread.
    pub fn proc_pid(&self) -> Pid {
        self.process_pid
    }

    pub fn set_thread_to_focus(&mut self, tid: Pid) {
        self.in_focus_tid = tid
    }

    pub fn thread_in_focus(&self) -> Pid {
        self.in_focus_tid
    }

    /// Add thread in `created` status.
    pub fn register(&mut self, tid: Pid) {
        let number = self.next_number;
        self.next_number += 1;
        self.threads.insert(
            tid,
            Tracee {
                tid,
                number,
                status: TraceeStatus::Created,
                pending_signal: None,
            },
        );
    }

    pub fn remove(&mut self, tid: Pid) {
        self.threads.remove(&tid);
        if self.in_focus_tid == tid {
            self.in_focus_tid = self.process_pid;
        }
    }

    pub fn set_stop_status(&mut self, tid: Pid) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.status = TraceeStatus::Stopped
        }
    }

    pub fn set_running_status(&mut self, tid: Pid) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.status = TraceeStatus::Running
        }
    }

    pub fn set_pending_signal(&mut self, tid: Pid, signal: Signal) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.pending_signal = Some(signal)
        }
    }

    pub fn take_pending_signal(&mut self, tid: Pid) -> Option<Signal> {
        self.threads
            .get_mut(&tid)
            .and_then(|t| t.pending_signal.take())
    }

    /// Return thread status, [`TraceeStatus::OutOfReach`] if thread is unknown.
    pub fn status(&self, tid: Pid) -> TraceeStatus {
        self.threads
            .get(&tid)
            .map(|t| t.status)
            .unwrap_or(TraceeStatus::OutOfReach)
    }

    pub fn number(&self, tid: Pid) -> ThreadId {
        self.threads.get(&tid).map(|t| t.number).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Tracee> {
        self.threads
            .values()
            .cloned()
            .sorted_by_key(|t| t.number)
            .collect()
    }

    /// Continue all stopped threads, inject pending signals.
    pub fn cont_stopped(&mut self) -> nix::Result<()> {
        let mut errors = vec![];

        self.threads.values_mut().for_each(|thread| {
            if thread.status != TraceeStatus::Stopped {
                return;
            }
            let signal = thread.pending_signal.take();
            if let Err(e) = sys::ptrace::cont(thread.tid, signal) {
                // no such process - thread will be removed later, at exit event
                if Errno::ESRCH == e {
                    warn!(target: "tracer", "thread {} not found, ESRCH", thread.tid);
                    return;
                }
                errors.push((thread.tid, e));
            } else {
                thread.status = TraceeStatus::Running
            }
        });

        match errors.first() {
            None => Ok(()),
            Some((_, err)) => {
                warn!(
                    target: "tracer",
                    "continue threads: {}",
                    errors.iter().map(|(tid, e)| format!("{tid}: {e}")).join(";")
                );
                Err(*err)
            }
        }
    }

    /// Interrupt all running threads and wait until they stop.
    ///
    /// A thread may stop by another reason before an interrupt is delivered, such signals
    /// are saved for re-injection, breakpoint traps are rewound with `rewind`, and will
    /// fire again after resume.
    pub fn interrupt_running(&mut self, mut rewind: impl FnMut(Pid) -> bool) -> nix::Result<()> {
        let running: Vec<Pid> = self
            .threads
            .values()
            .filter(|t| t.status == TraceeStatus::Running)
            .map(|t| t.tid)
            .collect();

        let mut interrupted = vec![];
        for tid in running {
            match sys::ptrace::interrupt(tid) {
                Ok(()) => interrupted.push(tid),
                Err(Errno::ESRCH) => {
                    warn!(target: "tracer", "thread {tid} not found, ESRCH");
                }
                Err(e) => return Err(e),
            }
        }

        for tid in interrupted {
            loop {
                let status = match waitpid(tid, Some(WaitPidFlag::__WALL)) {
                    Ok(status) => status,
                    Err(Errno::ECHILD) => {
                        self.remove(tid);
                        break;
                    }
                    Err(e) => return Err(e),
                };

                match status {
                    WaitStatus::PtraceEvent(_, _, libc::PTRACE_EVENT_STOP) => {
                        self.set_stop_status(tid);
                        break;
                    }
                    WaitStatus::PtraceEvent(_, _, libc::PTRACE_EVENT_CLONE) => {
                        let new_tid = Pid::from_raw(sys::ptrace::getevent(tid)? as libc::pid_t);
                        self.register(new_tid);
                        self.set_stop_status(tid);
                        break;
                    }
                    WaitStatus::PtraceEvent(_, _, _) => {
                        self.set_stop_status(tid);
                        break;
                    }
                    WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                        if !rewind(tid) {
                            self.set_pending_signal(tid, Signal::SIGTRAP);
                        }
                        self.set_stop_status(tid);
                        break;
                    }
                    WaitStatus::Stopped(_, Signal::SIGSTOP) => {
                        self.set_stop_status(tid);
                        break;
                    }
                    WaitStatus::Stopped(_, signal) => {
                        self.set_pending_signal(tid, signal);
                        self.set_stop_status(tid);
                        break;
                    }
                    WaitStatus::Exited(_, _) | WaitStatus::Signaled(_, _, _) => {
                        self.remove(tid);
                        break;
                    }
                    _ => continue,
                }
            }
        }

        Ok(())
    }
}
