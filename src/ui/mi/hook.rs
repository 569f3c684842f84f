//! Engine event hook: turns engine events into asynchronous and stream records.

use crate::engine::{EngineEvent, ExitStatus, RawStop, StopCause};
use crate::ui::mi::breakpoint::HitAction;
use crate::ui::mi::classifier::{classify, classify_exit, BreakpointHit, Disposition};
use crate::ui::mi::dispatch::Core;
use crate::ui::mi::output::Output;
use crate::ui::mi::record::{MiResult, Record};
use crate::weak_error;
use log::{debug, warn};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::thread::JoinHandle;

/// Handles engine events one by one, each under a core lock.
pub struct MiHook {
    output: Output,
}

impl MiHook {
    pub fn new(output: Output) -> Self {
        Self { output }
    }

    pub fn on_event(&self, core: &mut Core, event: EngineEvent) {
        match event {
            EngineEvent::Resumed => self.on_resumed(core),
            EngineEvent::Stopped(stop) => self.on_stop(core, stop),
            EngineEvent::Exited(status) => self.on_exit(core, status),
            EngineEvent::Output { text, .. } => self.output.emit(&Record::target(text)),
            EngineEvent::BreakpointResolved(info) => {
                if let Some(brkpt) = core.breakpoints.resolve(&info) {
                    self.output.emit(&Record::NotifyAsync {
                        class: "breakpoint-modified",
                        results: vec![MiResult::new("bkpt", brkpt.tuple())],
                    });
                }
            }
            EngineEvent::Disconnected { reason } => {
                warn!(target: "mi", "connection lost: {reason}");
                core.session.transport_lost(&reason);
                core.interrupts.cancel();
                core.complete_operation();
                self.output
                    .emit(&Record::log(format!("connection lost: {reason}\n")));
            }
        }
    }

    fn on_resumed(&self, core: &mut Core) {
        if core.silent_resumes > 0 {
            core.silent_resumes -= 1;
            return;
        }
        if core.session.is_running() {
            self.output.emit(&Record::running_all());
        }
    }

    fn on_stop(&self, core: &mut Core, mut stop: RawStop) {
        if !core.session.is_running() {
            debug!(target: "mi", "stop in {} state ignored: {stop:?}", core.session.state());
            return;
        }
        let interrupted = core.interrupts.take_for_stop();

        let mut hit = None;
        if let StopCause::Breakpoint { id } = stop.cause {
            match self.breakpoint_action(core, id, &stop) {
                Some(h) => hit = Some(h),
                None if interrupted => stop.cause = StopCause::Interrupted,
                None => {
                    self.resume_silently(core);
                    return;
                }
            }
        }

        if let Some(BreakpointHit {
            number,
            disposition: Disposition::Del,
        }) = hit
        {
            if let Some(brkpt) = core.breakpoints.remove(number) {
                weak_error!(
                    core.engine.remove_breakpoint(brkpt.engine_id),
                    "remove temporary breakpoint:"
                );
            }
        }

        weak_error!(core.session.stopped(), "session:");
        core.current_thread = Some(stop.thread);
        core.complete_operation();

        let event = classify(stop, hit);
        self.output.emit(&event.record(core.detailed_records));
    }

    /// Decide whether a breakpoint hit is a stop. Return `None` if a hit must be skipped.
    fn breakpoint_action(
        &self,
        core: &mut Core,
        engine_id: u32,
        stop: &RawStop,
    ) -> Option<BreakpointHit> {
        match core.breakpoints.hit(engine_id, stop.thread) {
            HitAction::Stop(hit) => Some(hit),
            HitAction::Skip => None,
            HitAction::Check { hit, condition } => match core.engine.evaluate(&condition) {
                Ok(value) if value.trim() == "0" => None,
                Ok(_) => {
                    core.breakpoints.confirm_hit(hit.number);
                    Some(hit)
                }
                Err(e) => {
                    self.output.emit(&Record::log(format!(
                        "Error in testing condition for breakpoint {}: {e}\n",
                        hit.number
                    )));
                    core.breakpoints.confirm_hit(hit.number);
                    Some(hit)
                }
            },
        }
    }

    fn resume_silently(&self, core: &mut Core) {
        core.silent_resumes += 1;
        if let Err(e) = core.engine.resume() {
            core.silent_resumes -= 1;
            warn!(target: "mi", "resume after skipped breakpoint: {e}");
            self.output.emit(&Record::log(format!("{e}\n")));
        }
    }

    fn on_exit(&self, core: &mut Core, status: ExitStatus) {
        if !core.session.has_process() {
            debug!(target: "mi", "exit in {} state ignored", core.session.state());
            return;
        }
        core.interrupts.take_for_stop();
        core.silent_resumes = 0;
        core.complete_operation();
        core.current_thread = None;
        weak_error!(core.session.process_exited(), "session:");

        let event = classify_exit(status);
        self.output.emit(&event.record(core.detailed_records));
    }
}

/// Spawn a thread that passes engine events into a hook until the engine drops its sink.
pub fn spawn_event_pump(
    core: Arc<Mutex<Core>>,
    hook: MiHook,
    events: Receiver<EngineEvent>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("mi-events".to_string())
        .spawn(move || {
            for event in events {
                let mut core = core.lock().unwrap_or_else(PoisonError::into_inner);
                hook.on_event(&mut core, event);
            }
            debug!(target: "mi", "event pump finished");
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::scripted::{ScriptedControl, ScriptedEngine};
    use crate::engine::{AffectedThreads, Engine, EventSink};
    use crate::ui::command::parser::parse_line;
    use crate::ui::command::{CommandError, CommandResult, Outcome};
    use crate::ui::mi::dispatch::dispatch;
    use crate::ui::mi::output::test::Buffer;
    use crate::ui::mi::session::SessionState;

    const SIGINT_STOP: &str = r#"*stopped,reason="signal-received",signal-name="SIGINT",signal-meaning="Interrupt",thread-id="1",stopped-threads="all""#;
    const RUNNING: &str = r#"*running,thread-id="all""#;

    /// Core without an event thread, events are handled by hand.
    struct Fixture {
        core: Core,
        hook: MiHook,
        events: Receiver<EngineEvent>,
        control: ScriptedControl,
        out: Buffer,
    }

    impl Fixture {
        fn new() -> Self {
            let mut engine = ScriptedEngine::default();
            let control = engine.control();
            let (sink, events) = EventSink::channel();
            engine.subscribe(sink);
            let out = Buffer::default();
            Self {
                core: Core::new(Box::new(engine), false),
                hook: MiHook::new(Output::new(out.clone(), false)),
                events,
                control,
                out,
            }
        }

        fn exec(&mut self, line: &str) -> CommandResult<Outcome> {
            let cmd = parse_line(line).unwrap().unwrap();
            dispatch(&mut self.core, &cmd)
        }

        fn drain(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.hook.on_event(&mut self.core, event);
            }
        }
    }

    #[test]
    fn test_interrupt_coalescing() {
        let mut fx = Fixture::new();
        fx.exec("-file-exec-and-symbols a.out").unwrap();
        fx.exec("-data-evaluate-expression do_loop=1").unwrap();
        assert_eq!(fx.exec("-exec-run").unwrap(), Outcome::Running);

        assert_eq!(fx.exec("-exec-interrupt").unwrap(), Outcome::Done(vec![]));
        assert_eq!(fx.exec("-exec-interrupt").unwrap(), Outcome::Done(vec![]));
        assert_eq!(fx.control.calls("interrupt"), 1);

        fx.drain();
        assert_eq!(fx.out.lines(), vec![RUNNING, SIGINT_STOP]);
        assert_eq!(fx.core.session.state(), SessionState::Stopped);
        assert!(matches!(
            fx.exec("-exec-interrupt"),
            Err(CommandError::NotRunning)
        ));
    }

    #[test]
    fn test_interrupt_races_with_natural_stop() {
        let mut fx = Fixture::new();
        fx.exec("-file-exec-and-symbols a.out").unwrap();
        fx.exec("-data-evaluate-expression do_loop=1").unwrap();
        fx.exec("-exec-run").unwrap();

        // process stops by itself, the stop event is not handled yet
        assert!(fx.control.raise("SIGUSR1"));
        assert_eq!(fx.exec("-exec-interrupt").unwrap(), Outcome::Done(vec![]));
        assert!(fx.core.interrupts.is_pending());

        fx.drain();
        assert!(!fx.core.interrupts.is_pending());
        assert_eq!(
            fx.out.lines(),
            vec![
                RUNNING,
                r#"*stopped,reason="signal-received",signal-name="SIGUSR1",signal-meaning="User defined signal 1",thread-id="1",stopped-threads="all""#,
            ]
        );
    }

    #[test]
    fn test_skipped_hit_reported_as_interrupt() {
        let mut fx = Fixture::new();
        fx.exec("-file-exec-and-symbols a.out").unwrap();
        fx.exec("-break-insert -i 1 main").unwrap();
        fx.exec("-exec-run").unwrap();
        assert_eq!(
            fx.core.interrupts.request(SessionState::Running),
            crate::ui::mi::interrupt::Decision::Issue
        );

        fx.drain();
        assert_eq!(fx.out.lines(), vec![RUNNING, SIGINT_STOP]);
        assert_eq!(fx.control.calls("resume"), 0);
    }

    #[test]
    fn test_stop_without_process_ignored() {
        let mut fx = Fixture::new();
        fx.exec("-file-exec-and-symbols a.out").unwrap();
        fx.control.emit(EngineEvent::Stopped(RawStop {
            thread: 1,
            cause: StopCause::Interrupted,
            affected: AffectedThreads::All,
            frame: None,
        }));
        fx.control.emit(EngineEvent::Exited(ExitStatus::Code(0)));

        fx.drain();
        assert!(fx.out.lines().is_empty());
        assert_eq!(fx.core.session.state(), SessionState::ConnectedLocal);
    }

    #[test]
    fn test_temporary_breakpoint_removed_after_hit() {
        let mut fx = Fixture::new();
        fx.exec("-file-exec-and-symbols a.out").unwrap();
        fx.exec("-break-insert -t main").unwrap();
        fx.exec("-exec-run").unwrap();

        fx.drain();
        assert_eq!(fx.control.calls("remove_breakpoint"), 1);
        assert!(fx.core.breakpoints.get(1).is_none());
        assert_eq!(fx.core.current_thread, Some(1));
    }
}
