//! Interpreter configuration: defaults, an optional TOML file and command line overrides.

use crate::weak_error;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum_macros::{Display, EnumString};

const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine behind the interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EngineKind {
    /// Debug local processes with ptrace.
    #[default]
    Native,
    /// Simulated program, for protocol dry runs of a frontend.
    Scripted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiConfig {
    pub engine: EngineKind,
    /// Write `(gdb)` after each result record.
    pub prompt: bool,
    /// Render breakpoints and stops with all gdb fields.
    pub detailed_records: bool,
    /// Longest wait for a synchronous engine reply.
    pub engine_timeout: Duration,
    pub log_file: Option<PathBuf>,
}

impl Default for MiConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Native,
            prompt: true,
            detailed_records: false,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            log_file: None,
        }
    }
}

/// Configuration file representation, every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileConfig {
    engine: Option<EngineKind>,
    prompt: Option<bool>,
    detailed_records: Option<bool>,
    engine_timeout_ms: Option<u64>,
    log_file: Option<PathBuf>,
}

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub engine: Option<EngineKind>,
    pub no_prompt: bool,
    pub detailed_records: bool,
    pub engine_timeout_ms: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl MiConfig {
    const DEFAULT_PATH: &'static str = ".config/bs/mi.toml";

    /// Load a configuration. An explicitly given file must exist, a default one
    /// (`~/.config/bs/mi.toml`) is used only if present.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => {
                let data = read_to_string(path)
                    .with_context(|| format!("read configuration file {path:?}"))?;
                parse(&data).with_context(|| format!("configuration file {path:?}"))?
            }
            None => {
                let default = home::home_dir().map(|home| home.join(Self::DEFAULT_PATH));
                match default.and_then(|path| read_to_string(path).ok()) {
                    Some(data) => weak_error!(parse(&data), "default configuration:")
                        .unwrap_or_default(),
                    None => FileConfig::default(),
                }
            }
        };

        Ok(Self::default().merge(file, overrides))
    }

    fn merge(self, file: FileConfig, overrides: Overrides) -> Self {
        Self {
            engine: overrides.engine.or(file.engine).unwrap_or(self.engine),
            prompt: !overrides.no_prompt && file.prompt.unwrap_or(self.prompt),
            detailed_records: overrides.detailed_records
                || file.detailed_records.unwrap_or(self.detailed_records),
            engine_timeout: overrides
                .engine_timeout_ms
                .or(file.engine_timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(self.engine_timeout),
            log_file: overrides.log_file.or(file.log_file).or(self.log_file),
        }
    }
}

fn parse(data: &str) -> anyhow::Result<FileConfig> {
    let file: FileConfig = toml::from_str(data)?;
    if file.engine_timeout_ms == Some(0) {
        bail!("engine-timeout-ms must be greater than zero");
    }
    Ok(file)
}
