use crate::engine::{EngineError, EngineEvent, EventSink, LaunchOptions, OutputStream};
use nix::sys;
use nix::sys::personality::Persona;
use nix::sys::ptrace::Options;
use nix::sys::signal::SIGSTOP;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{fork, setpgid, ForkResult, Pid};
use nix::libc;
use os_pipe::{PipeReader, PipeWriter};
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

/// Process prepared for instantiation by a `fork` call.
pub struct Template {
    program: PathBuf,
    options: LaunchOptions,
    stdout: PipeWriter,
    stderr: PipeWriter,
}

impl Template {
    /// Create new process template and start forwarding its output into the event sink.
    pub fn new(
        program: impl Into<PathBuf>,
        options: &LaunchOptions,
        sink: Option<EventSink>,
    ) -> Result<Self, EngineError> {
        let (stdout_reader, stdout) = os_pipe::pipe()?;
        let (stderr_reader, stderr) = os_pipe::pipe()?;

        forward_output(stdout_reader, OutputStream::Stdout, sink.clone());
        forward_output(stderr_reader, OutputStream::Stderr, sink);

        Ok(Self {
            program: program.into(),
            options: options.clone(),
            stdout,
            stderr,
        })
    }

    /// Instantiate process by `fork()` system call with caller as a tracer.
    /// After installation child process stopped by `SIGSTOP` signal and seized with ptrace,
    /// program image is not executed yet.
    pub fn install(self) -> Result<Pid, EngineError> {
        let mut debugee_cmd = Command::new(&self.program);
        let debugee_cmd = debugee_cmd
            .args(&self.options.args)
            .envs(self.options.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(self.stdout.try_clone()?)
            .stderr(self.stderr.try_clone()?);

        if let Some(cwd) = self.options.cwd.as_deref() {
            debugee_cmd.current_dir(cwd);
        }

        unsafe {
            debugee_cmd.pre_exec(move || {
                // keep terminal interrupts for the debugger only
                setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
                sys::personality::set(Persona::ADDR_NO_RANDOMIZE)?;
                Ok(())
            });
        }

        match unsafe { fork() }.map_err(|e| EngineError::Syscall("fork", e))? {
            ForkResult::Parent { child: pid } => {
                waitpid(pid, Some(WaitPidFlag::WSTOPPED)).map_err(EngineError::Waitpid)?;
                sys::ptrace::seize(
                    pid,
                    Options::PTRACE_O_TRACECLONE
                        .union(Options::PTRACE_O_TRACEEXEC)
                        .union(Options::PTRACE_O_TRACEEXIT)
                        .union(Options::PTRACE_O_EXITKILL),
                )
                .map_err(EngineError::Ptrace)?;

                Ok(pid)
            }
            ForkResult::Child => {
                _ = sys::signal::raise(SIGSTOP);
                _ = debugee_cmd.exec();
                unsafe { libc::_exit(127) }
            }
        }
    }
}

fn forward_output(mut reader: PipeReader, stream: OutputStream, sink: Option<EventSink>) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]).to_string();
                    let delivered = sink
                        .as_ref()
                        .map(|sink| sink.send(EngineEvent::Output { stream, text }))
                        .unwrap_or(false);
                    if !delivered {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!(target: "tracer", "read program {stream:?}: {e}");
                    break;
                }
            }
        }
    });
}
