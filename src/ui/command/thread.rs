use crate::ui::command::CommandResult;
use crate::ui::mi::classifier::frame_value;
use crate::ui::mi::dispatch::Core;
use crate::ui::mi::record::{MiResult, Value};

pub struct Handler<'a> {
    core: &'a mut Core,
}

impl<'a> Handler<'a> {
    pub fn new(core: &'a mut Core) -> Self {
        Self { core }
    }

    /// Return `threads=[..],current-thread-id=".."` results.
    pub fn handle(&mut self) -> CommandResult<Vec<MiResult>> {
        let threads = self.core.engine.threads()?;

        let list = threads
            .iter()
            .map(|t| {
                let mut results = vec![
                    MiResult::new("id", t.id.to_string()),
                    MiResult::new("target-id", t.target_id.as_str()),
                ];
                if let Some(frame) = &t.frame {
                    results.push(MiResult::new("frame", frame_value(frame)));
                }
                results.push(MiResult::new(
                    "state",
                    if t.stopped { "stopped" } else { "running" },
                ));
                Value::Tuple(results)
            })
            .collect();

        let mut results = vec![MiResult::new("threads", Value::List(list))];
        let current = self
            .core
            .current_thread
            .filter(|id| threads.iter().any(|t| t.id == *id))
            .or_else(|| threads.first().map(|t| t.id));
        if let Some(current) = current {
            results.push(MiResult::new("current-thread-id", current.to_string()));
        }
        Ok(results)
    }
}
