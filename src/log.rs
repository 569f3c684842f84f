use anyhow::Context;
use env_logger::{Env, Target};
use std::fs::OpenOptions;
use std::path::Path;

/// Initialize a logger. Standard output belongs to the protocol, so logs go into a file if
/// one is given, into stderr otherwise. Filter is taken from `RUST_LOG`, `warn` by default.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {path:?}"))?;
        builder.target(Target::Pipe(Box::new(file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder.try_init().context("logger initialization")
}
