use crate::engine::native::NativeEngine;
use crate::engine::scripted::{FaultStyle, ScriptedEngine};
use crate::engine::Engine;
use crate::ui::config::{EngineKind, MiConfig};
use crate::ui::mi::output::Output;
use crate::ui::mi::record::Record;
use crate::ui::mi::MiApplication;
use anyhow::Context;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

/// Executable to load at startup.
pub struct DebugeeSource<'a> {
    pub path: &'a str,
}

impl DebugeeSource<'_> {
    /// Return a path to an executable, search in `PATH` if it is not a path to existing file.
    pub fn resolve(&self) -> anyhow::Result<PathBuf> {
        let path = Path::new(self.path);
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        which::which(self.path).with_context(|| format!("executable {} not found", self.path))
    }
}

/// Supervisor wires the interpreter with an engine and standard streams.
pub struct Supervisor;

impl Supervisor {
    fn engine(config: &MiConfig) -> Box<dyn Engine> {
        match config.engine {
            EngineKind::Native => Box::new(NativeEngine::new(config.engine_timeout)),
            EngineKind::Scripted => Box::new(ScriptedEngine::new(FaultStyle::Linux)),
        }
    }

    /// Run an interpreter over stdin and stdout until exit.
    pub fn run(config: &MiConfig, source: Option<DebugeeSource>) -> anyhow::Result<()> {
        let output = Output::new(io::stdout(), config.prompt);
        info!(target: "mi", "{} engine", config.engine);
        let app = MiApplication::new(Self::engine(config), output.clone(), config.detailed_records)
            .context("build interpreter")?;
        app.install_ctrlc().context("install SIGINT handler")?;

        if let Some(source) = source {
            let path = source.resolve()?;
            info!(target: "mi", "load {path:?}");
            if let Err(e) = app.load_executable(&path) {
                output.emit(&Record::log(format!("{}: {e}\n", path.display())));
            }
        }

        app.run(io::stdin().lock())
    }
}
