//! GDB/MI interpreter.
//!
//! Reads commands line by line, executes them against an engine and writes result, asynchronous
//! and stream records. Engine events are handled on a separate thread, both command and event
//! paths are serialized by a single core lock.

pub mod breakpoint;
pub mod classifier;
pub mod dispatch;
pub mod hook;
pub mod interrupt;
pub mod output;
pub mod record;
pub mod session;

use crate::engine::{Engine, EngineError, EventSink};
use crate::ui::command::parser::{leading_token, parse_line};
use crate::ui::command::{file, CommandError, CommandResult, Outcome};
use crate::ui::mi::dispatch::{dispatch, Core};
use crate::ui::mi::hook::{spawn_event_pump, MiHook};
use crate::ui::mi::interrupt::Decision;
use crate::ui::mi::output::Output;
use crate::ui::mi::record::{Record, ResultClass};
use log::{debug, info, warn};
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

fn lock(core: &Mutex<Core>) -> MutexGuard<'_, Core> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MiApplication {
    core: Arc<Mutex<Core>>,
    output: Output,
}

impl MiApplication {
    /// Create an interpreter over an engine, engine events are handled from now on.
    pub fn new(
        mut engine: Box<dyn Engine>,
        output: Output,
        detailed_records: bool,
    ) -> anyhow::Result<Self> {
        let (sink, events) = EventSink::channel();
        engine.subscribe(sink);

        let core = Arc::new(Mutex::new(Core::new(engine, detailed_records)));
        spawn_event_pump(core.clone(), MiHook::new(output.clone()), events)?;

        Ok(Self { core, output })
    }

    /// Load an executable before any command, like `-file-exec-and-symbols` does.
    pub fn load_executable(&self, path: &Path) -> CommandResult<()> {
        let mut core = lock(&self.core);
        core.session.check_open()?;
        file::Handler::new(&mut core).handle(path)
    }

    /// Execute a single input line. Return [`ControlFlow::Break`] when interpreter must exit.
    pub fn handle_line(&self, line: &str) -> ControlFlow<()> {
        debug!(target: "mi", "-> {line}");
        let cmd = match parse_line(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return ControlFlow::Continue(()),
            Err(e) => {
                self.output
                    .emit(&Record::error(leading_token(line), e.to_string(), e.code()));
                return ControlFlow::Continue(());
            }
        };

        // lock is held until records are written, so that asynchronous records caused
        // by the command come after its result record
        let mut core = lock(&self.core);
        let result = dispatch(&mut core, &cmd);
        if let Err(CommandError::Engine(e)) = &result {
            if e.is_fatal() {
                warn!(target: "mi", "fatal engine error: {e}");
                mark_engine_failure(&mut core, e);
            }
        }

        let token = cmd.token;
        let (records, flow) = match result {
            Ok(Outcome::Done(results)) => (
                vec![Record::done(token, results)],
                ControlFlow::Continue(()),
            ),
            Ok(Outcome::Console(text)) => (
                vec![Record::console(text), Record::done(token, vec![])],
                ControlFlow::Continue(()),
            ),
            Ok(Outcome::Running) => (
                vec![Record::result(token, ResultClass::Running, vec![])],
                ControlFlow::Continue(()),
            ),
            Ok(Outcome::Connected) => (
                vec![Record::result(token, ResultClass::Connected, vec![])],
                ControlFlow::Continue(()),
            ),
            Ok(Outcome::Exit) => (
                vec![Record::result(token, ResultClass::Exit, vec![])],
                ControlFlow::Break(()),
            ),
            Err(e) => (
                vec![Record::error(token, e.to_string(), e.code())],
                ControlFlow::Continue(()),
            ),
        };

        if let Err(e) = self.output.write_all(&records) {
            warn!(target: "mi", "output closed: {e}");
            dispatch::exit(&mut core);
            return ControlFlow::Break(());
        }
        flow
    }

    /// Read and execute commands until `-gdb-exit` or end of input.
    pub fn run(&self, input: impl BufRead) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line?;
            if self.handle_line(&line).is_break() {
                info!(target: "mi", "exit requested");
                return Ok(());
            }
        }

        info!(target: "mi", "end of input");
        dispatch::exit(&mut lock(&self.core));
        Ok(())
    }

    /// Return a handle that interrupts a running process from outside the command loop.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            core: self.core.clone(),
            output: self.output.clone(),
        }
    }

    /// Install a SIGINT handler that interrupts a running process.
    pub fn install_ctrlc(&self) -> anyhow::Result<()> {
        let interrupter = self.interrupter();
        let (tx, rx) = mpsc::channel::<()>();
        let requested = Arc::new(AtomicBool::new(false));

        let flag = requested.clone();
        ctrlc::set_handler(move || {
            // a burst of signals makes a single request
            if !flag.swap(true, Ordering::SeqCst) {
                _ = tx.send(());
            }
        })?;

        thread::Builder::new()
            .name("mi-sigint".to_string())
            .spawn(move || {
                for () in rx {
                    requested.store(false, Ordering::SeqCst);
                    interrupter.interrupt();
                }
            })?;
        Ok(())
    }
}

/// Engine can't serve requests anymore, treat it like a lost connection.
fn mark_engine_failure(core: &mut Core, e: &EngineError) {
    core.session.transport_lost(&e.to_string());
    core.interrupts.cancel();
    core.complete_operation();
}

/// Interrupts a running process on an external request (SIGINT).
#[derive(Clone)]
pub struct Interrupter {
    core: Arc<Mutex<Core>>,
    output: Output,
}

impl Interrupter {
    pub fn interrupt(&self) {
        let mut core = lock(&self.core);
        if core.session.is_closed() {
            return;
        }
        let state = core.session.interrupt_state();
        match core.interrupts.request(state) {
            Decision::Issue => match core.engine.interrupt() {
                Ok(()) | Err(EngineError::ProcessNotRunning) => {
                    debug!(target: "mi", "interrupt issued by signal")
                }
                Err(e) => {
                    core.interrupts.cancel();
                    self.output
                        .emit(&Record::log(format!("failed to interrupt: {e}\n")));
                }
            },
            Decision::Coalesced => debug!(target: "mi", "interrupt already requested"),
            Decision::NotRunning => self
                .output
                .emit(&Record::log("The program is not being run.\n")),
        }
    }
}
