//! MI breakpoint table. MI numbers are assigned sequentially from 1 and never reused,
//! they are independent of engine breakpoint ids.

use crate::engine::{BreakpointInfo, ThreadId};
use crate::mi_tuple;
use crate::ui::mi::classifier::{BreakpointHit, Disposition};
use crate::ui::mi::record::{MiResult, Value};

/// Breakpoint insertion options (`-break-insert` flags).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOptions {
    pub location: String,
    /// `-f`, allow unresolved location.
    pub pending: bool,
    /// `-t`, delete after first hit.
    pub temporary: bool,
    /// `-d`, create disabled.
    pub disabled: bool,
    /// `-c`
    pub condition: Option<String>,
    /// `-i`
    pub ignore_count: u32,
    /// `-p`
    pub thread: Option<ThreadId>,
}

#[derive(Debug, Clone)]
pub struct MiBreakpoint {
    pub number: u32,
    pub engine_id: u32,
    pub options: InsertOptions,
    pub resolved: bool,
    pub addr: Option<u64>,
    pub func: Option<String>,
    /// Number of hits that stopped (or would stop) a process.
    pub hits: u32,
    ignore_left: u32,
}

impl MiBreakpoint {
    pub fn disposition(&self) -> Disposition {
        if self.options.temporary {
            Disposition::Del
        } else {
            Disposition::Keep
        }
    }

    /// Full gdb style breakpoint tuple.
    pub fn tuple(&self) -> Value {
        let mut results = vec![
            MiResult::new("number", self.number.to_string()),
            MiResult::new("type", "breakpoint"),
            MiResult::new("disp", self.disposition().to_string()),
            MiResult::new("enabled", if self.options.disabled { "n" } else { "y" }),
        ];
        let mut push = |name: &str, value: Value| results.push(MiResult::new(name, value));
        match self.addr {
            Some(addr) if self.resolved => push("addr", format!("{addr:#018x}").into()),
            _ => push("addr", "<PENDING>".into()),
        }
        if let Some(func) = &self.func {
            push("func", func.as_str().into());
        }
        if let Some(thread) = self.options.thread {
            push("thread", thread.to_string().into());
        }
        if let Some(cond) = &self.options.condition {
            push("cond", cond.as_str().into());
        }
        if self.ignore_left > 0 {
            push("ignore", self.ignore_left.to_string().into());
        }
        push("times", self.hits.to_string().into());
        push("original-location", self.options.location.as_str().into());

        Value::Tuple(results)
    }

    /// Short tuple with a number only.
    pub fn short_tuple(&self) -> Value {
        mi_tuple!("number" => self.number.to_string())
    }
}

/// What to do after a breakpoint hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitAction {
    /// Report a stop.
    Stop(BreakpointHit),
    /// Evaluate a condition, stop if it is not zero.
    Check { hit: BreakpointHit, condition: String },
    /// Continue silently.
    Skip,
}

#[derive(Debug)]
pub struct BreakpointTable {
    breakpoints: Vec<MiBreakpoint>,
    next_number: u32,
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self {
            breakpoints: vec![],
            next_number: 1,
        }
    }
}

impl BreakpointTable {
    /// Add a breakpoint that engine accepted, assign next number to it.
    pub fn insert(&mut self, info: BreakpointInfo, options: InsertOptions) -> &MiBreakpoint {
        let number = self.next_number;
        self.next_number += 1;
        let ignore_left = options.ignore_count;
        self.breakpoints.push(MiBreakpoint {
            number,
            engine_id: info.id,
            options,
            resolved: info.resolved,
            addr: info.addr,
            func: info.func,
            hits: 0,
            ignore_left,
        });
        &self.breakpoints[self.breakpoints.len() - 1]
    }

    pub fn get(&self, number: u32) -> Option<&MiBreakpoint> {
        self.breakpoints.iter().find(|b| b.number == number)
    }

    pub fn remove(&mut self, number: u32) -> Option<MiBreakpoint> {
        let idx = self.breakpoints.iter().position(|b| b.number == number)?;
        Some(self.breakpoints.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MiBreakpoint> {
        self.breakpoints.iter()
    }

    /// Update breakpoint after engine resolves its location.
    pub fn resolve(&mut self, info: &BreakpointInfo) -> Option<&MiBreakpoint> {
        let brkpt = self
            .breakpoints
            .iter_mut()
            .find(|b| b.engine_id == info.id)?;
        brkpt.resolved = info.resolved;
        brkpt.addr = info.addr;
        if info.func.is_some() {
            brkpt.func = info.func.clone();
        }
        Some(brkpt)
    }

    /// Register a hit of engine breakpoint by a thread.
    pub fn hit(&mut self, engine_id: u32, thread: ThreadId) -> HitAction {
        let Some(brkpt) = self
            .breakpoints
            .iter_mut()
            .find(|b| b.engine_id == engine_id)
        else {
            return HitAction::Skip;
        };

        if brkpt.options.disabled {
            return HitAction::Skip;
        }
        if brkpt.options.thread.is_some_and(|t| t != thread) {
            return HitAction::Skip;
        }
        if brkpt.ignore_left > 0 {
            brkpt.ignore_left -= 1;
            return HitAction::Skip;
        }

        let hit = BreakpointHit {
            number: brkpt.number,
            disposition: brkpt.disposition(),
        };
        match &brkpt.options.condition {
            Some(condition) => HitAction::Check {
                hit,
                condition: condition.clone(),
            },
            None => {
                brkpt.hits += 1;
                HitAction::Stop(hit)
            }
        }
    }

    /// Enable or disable breakpoints. All numbers are checked before any change is made,
    /// return the first unknown number on failure.
    pub fn set_enabled(&mut self, numbers: &[u32], enabled: bool) -> Result<(), u32> {
        if let Some(unknown) = numbers.iter().find(|n| self.get(**n).is_none()) {
            return Err(*unknown);
        }
        for brkpt in self
            .breakpoints
            .iter_mut()
            .filter(|b| numbers.contains(&b.number))
        {
            brkpt.options.disabled = !enabled;
        }
        Ok(())
    }

    /// Condition of a breakpoint is true, count a hit.
    pub fn confirm_hit(&mut self, number: u32) {
        if let Some(brkpt) = self.breakpoints.iter_mut().find(|b| b.number == number) {
            brkpt.hits += 1;
        }
    }
}
