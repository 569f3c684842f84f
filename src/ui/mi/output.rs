use crate::ui::mi::record::Record;
use log::trace;
use std::io;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

pub const PROMPT: &str = "(gdb)";

/// Output serializer. The only place where protocol bytes are written,
/// each record written and flushed under a single lock acquisition.
#[derive(Clone)]
pub struct Output {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    prompt: bool,
}

impl Output {
    /// Create serializer over a writer. If `prompt` is true, write a `(gdb)` line after
    /// each result record.
    pub fn new(writer: impl Write + Send + 'static, prompt: bool) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            prompt,
        }
    }

    pub fn write(&self, record: &Record) -> io::Result<()> {
        trace!(target: "mi", "<- {record}");
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{record}")?;
        if self.prompt && record.is_result() {
            writeln!(writer, "{PROMPT}")?;
        }
        writer.flush()
    }

    /// Write a sequence of records without interleaving with other writers.
    pub fn write_all(&self, records: &[Record]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for record in records {
            trace!(target: "mi", "<- {record}");
            writeln!(writer, "{record}")?;
            if self.prompt && record.is_result() {
                writeln!(writer, "{PROMPT}")?;
            }
        }
        writer.flush()
    }

    /// Write a record, log an error if it fails. Used where no one can handle a write error.
    pub fn emit(&self, record: &Record) {
        if let Err(e) = self.write(record) {
            log::error!(target: "mi", "write record: {e}");
        }
    }
}
