use bugstalker_mi::ui::config::{EngineKind, MiConfig, Overrides};
use bugstalker_mi::ui::supervisor::{DebugeeSource, Supervisor};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file, `~/.config/bs/mi.toml` is used if exists
    #[arg(long, env = "BS_MI_CONFIG")]
    config: Option<PathBuf>,

    /// Debugging engine: `native` or `scripted` (simulated program, for protocol dry runs)
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Write logs into a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not write `(gdb)` prompt after result records
    #[arg(long)]
    no_prompt: bool,

    /// Render breakpoints and stops with all gdb fields
    #[arg(long)]
    detailed_records: bool,

    /// Timeout for a synchronous engine reply, in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    engine_timeout_ms: Option<u64>,

    /// Executable file to debug
    executable: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MiConfig::load(
        args.config.as_deref(),
        Overrides {
            engine: args.engine,
            no_prompt: args.no_prompt,
            detailed_records: args.detailed_records,
            engine_timeout_ms: args.engine_timeout_ms,
            log_file: args.log_file,
        },
    )?;
    bugstalker_mi::log::init(config.log_file.as_deref())?;

    let source = args
        .executable
        .as_deref()
        .map(|path| DebugeeSource { path });
    Supervisor::run(&config, source)
}
