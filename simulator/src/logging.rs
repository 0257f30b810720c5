use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Sends log lines to stderr and, when a path is given, to a log file too.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<LineWriter<File>>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = path
            .map(|path| File::create(path).map(|f| Arc::new(Mutex::new(LineWriter::new(f)))))
            .transpose()?;
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<LineWriter<File>>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

impl LogWriterGuard {
    fn with_file(&self, f: impl FnOnce(&mut LineWriter<File>) -> io::Result<()>) -> io::Result<()> {
        match &self.file {
            // A panic mid-write leaves at worst a partial line; keep logging.
            Some(file) => f(&mut file.lock().unwrap_or_else(PoisonError::into_inner)),
            None => Ok(()),
        }
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().lock().write_all(buf)?;
        self.with_file(|file| file.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.with_file(|file| file.flush())
    }
}
