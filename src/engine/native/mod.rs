//! Ptrace based engine for local linux targets.

mod breakpoint;
mod process;
pub mod symbol;
mod thread;
mod tracer;

use crate::engine::native::symbol::SymbolTable;
use crate::engine::native::tracer::{Request, Spawn, TracerHandle};
use crate::engine::expression::{undeclared, Expression};
use crate::engine::{
    parse_address, BreakpointInfo, Engine, EngineError, EngineEvent, EventSink, LaunchOptions,
    ThreadInfo,
};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Size of a data symbol if an object file does not know it.
const DEFAULT_VARIABLE_SIZE: usize = 4;

#[derive(Debug)]
struct UserBreakpoint {
    id: u32,
    location: String,
    /// Link time address, none if location not resolved yet.
    addr: Option<u64>,
}

pub struct NativeEngine {
    target: Option<PathBuf>,
    symbols: Option<Arc<SymbolTable>>,
    sink: Option<EventSink>,
    breakpoints: Vec<UserBreakpoint>,
    next_breakpoint_id: u32,
    tracer: Option<TracerHandle>,
    timeout: Duration,
}

impl NativeEngine {
    /// Create an engine, `timeout` limits a wait of any single tracer request.
    pub fn new(timeout: Duration) -> Self {
        Self {
            target: None,
            symbols: None,
            sink: None,
            breakpoints: vec![],
            next_breakpoint_id: 1,
            tracer: None,
            timeout,
        }
    }

    fn alive_tracer(&self) -> Option<&TracerHandle> {
        self.tracer.as_ref().filter(|t| t.is_alive())
    }

    fn tracer(&self) -> Result<&TracerHandle, EngineError> {
        self.alive_tracer().ok_or(EngineError::ProcessNotRunning)
    }

    fn resolve(&self, location: &str) -> Option<(u64, Option<String>)> {
        let symbols = self.symbols.as_ref()?;
        match parse_address(location) {
            Some(addr) => Some((addr, symbols.function_at(addr).map(|s| s.name.clone()))),
            None => symbols
                .find_function(location)
                .map(|s| (s.addr, Some(s.name.clone()))),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            sink.send(event);
        }
    }

    fn variable(&self, name: &str) -> Result<(u64, usize), EngineError> {
        let symbols = self.symbols.as_ref().ok_or(EngineError::NoTarget)?;
        let symbol = symbols.find_data(name).ok_or_else(|| undeclared(name))?;
        let size = match symbol.size {
            0 => DEFAULT_VARIABLE_SIZE,
            size => size as usize,
        };
        Ok((symbol.addr, size))
    }
}

impl Engine for NativeEngine {
    fn subscribe(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn create_target(&mut self, path: &Path) -> Result<(), EngineError> {
        if self.alive_tracer().is_some() {
            return Err(EngineError::ProcessRunning);
        }

        let symbols = SymbolTable::load(path)?;
        info!(target: "engine", "target created: {path:?}");
        self.target = Some(path.to_path_buf());
        self.symbols = Some(Arc::new(symbols));

        // locations may be resolved in a new executable
        let mut resolved = vec![];
        for idx in 0..self.breakpoints.len() {
            if self.breakpoints[idx].addr.is_some() {
                continue;
            }
            if let Some((addr, func)) = self.resolve(&self.breakpoints[idx].location) {
                self.breakpoints[idx].addr = Some(addr);
                resolved.push(BreakpointInfo {
                    id: self.breakpoints[idx].id,
                    resolved: true,
                    addr: Some(addr),
                    func,
                });
            }
        }
        for info in resolved {
            self.emit(EngineEvent::BreakpointResolved(info));
        }
        Ok(())
    }

    fn select_platform(&mut self, name: &str, _sysroot: Option<&str>) -> Result<(), EngineError> {
        match name {
            "host" => Ok(()),
            _ => Err(EngineError::Unsupported("platform")),
        }
    }

    fn connect_remote(&mut self, _host: &str, _port: u16) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("remote connection"))
    }

    fn launch(&mut self, options: &LaunchOptions) -> Result<(), EngineError> {
        if self.alive_tracer().is_some() {
            return Err(EngineError::ProcessRunning);
        }
        let program = self.target.clone().ok_or(EngineError::NoTarget)?;
        let symbols = self.symbols.clone().ok_or(EngineError::NoTarget)?;

        let breakpoints = self
            .breakpoints
            .iter()
            .filter_map(|b| b.addr.map(|addr| (b.id, addr)))
            .collect();

        let tracer = TracerHandle::spawn(
            Spawn {
                program,
                options: options.clone(),
                symbols,
                breakpoints,
                sink: self.sink.clone(),
            },
            self.timeout,
        )?;
        self.tracer = Some(tracer);
        Ok(())
    }

    fn set_breakpoint(
        &mut self,
        location: &str,
        pending: bool,
    ) -> Result<BreakpointInfo, EngineError> {
        let resolved = self.resolve(location);
        if resolved.is_none() && !pending {
            return Err(EngineError::UnresolvedLocation(location.to_string()));
        }

        let id = self.next_breakpoint_id;
        if let (Some((addr, _)), Some(tracer)) = (&resolved, self.alive_tracer()) {
            let addr = *addr;
            tracer.request(|reply| Request::SetBreakpoint { id, addr, reply })?;
        }
        self.next_breakpoint_id += 1;

        let (addr, func) = resolved.unzip();
        self.breakpoints.push(UserBreakpoint {
            id,
            location: location.to_string(),
            addr,
        });
        debug!(target: "engine", "breakpoint {id} set at {location}");

        Ok(BreakpointInfo {
            id,
            resolved: addr.is_some(),
            addr,
            func: func.flatten(),
        })
    }

    fn remove_breakpoint(&mut self, id: u32) -> Result<(), EngineError> {
        if let Some(tracer) = self.alive_tracer() {
            tracer.request(|reply| Request::RemoveBreakpoint { id, reply })?;
        }
        self.breakpoints.retain(|b| b.id != id);
        Ok(())
    }

    fn evaluate(&mut self, expression: &str) -> Result<String, EngineError> {
        let expression = Expression::parse(expression)?;
        let tracer = self.tracer()?;
        expression.evaluate(
            |name| {
                let (addr, size) = self.variable(name)?;
                tracer.request(|reply| Request::ReadMemory { addr, size, reply })
            },
            |name, value| {
                let (addr, size) = self.variable(name)?;
                tracer.request(|reply| Request::WriteMemory {
                    addr,
                    size,
                    value,
                    reply,
                })
            },
        )
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.tracer()?.request(Request::Resume)
    }

    fn interrupt(&mut self) -> Result<(), EngineError> {
        self.tracer()?.request(Request::Interrupt)
    }

    fn threads(&mut self) -> Result<Vec<ThreadInfo>, EngineError> {
        match self.alive_tracer() {
            None => Ok(vec![]),
            Some(tracer) => tracer.request(Request::Threads),
        }
    }

    fn execute_command(&mut self, line: &str) -> Result<String, EngineError> {
        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        match command {
            "version" => Ok(format!(
                "{} {} (ptrace engine)\n",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            )),
            "expression" | "expr" | "print" | "p" => {
                let value = self.evaluate(rest)?;
                Ok(format!("{} = {value}\n", rest.trim()))
            }
            "breakpoint" if rest.trim() == "list" => Ok(self
                .breakpoints
                .iter()
                .map(|b| match b.addr {
                    Some(addr) => format!("{}: {} at {addr:#x}\n", b.id, b.location),
                    None => format!("{}: {} (pending)\n", b.id, b.location),
                })
                .collect()),
            _ => Err(EngineError::UnknownCommand(line.trim().to_string())),
        }
    }

    fn shutdown(&mut self) {
        if let Some(tracer) = self.tracer.take() {
            tracer.kill();
        }
        self.sink = None;
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        if let Some(tracer) = self.tracer.take() {
            tracer.kill();
        }
    }
}
