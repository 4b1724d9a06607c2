use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Tees formatted log lines to stdout and, optionally, a file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(Arc::new(Mutex::new(File::create(path)?))),
            None => None,
        };
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = &self.file {
            file.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &self.file {
            file.lock().unwrap_or_else(PoisonError::into_inner).flush()?;
        }
        Ok(())
    }
}

/// Keeps the first few and the most recent batch outcomes so a failure can be
/// reported with context without logging every round.
pub(crate) struct EventLog {
    head: Vec<String>,
    head_limit: usize,
    tail: VecDeque<String>,
    tail_limit: usize,
    dropped: u64,
}

impl EventLog {
    pub(crate) fn new(head_limit: usize, tail_limit: usize) -> Self {
        Self {
            head: Vec::with_capacity(head_limit),
            head_limit,
            tail: VecDeque::with_capacity(tail_limit),
            tail_limit,
            dropped: 0,
        }
    }

    pub(crate) fn record(&mut self, event: String) {
        tracing::debug!("{}", event);
        if self.head.len() < self.head_limit {
            self.head.push(event);
            return;
        }
        if self.tail_limit == 0 {
            self.dropped += 1;
            return;
        }
        if self.tail.len() == self.tail_limit {
            self.tail.pop_front();
            self.dropped += 1;
        }
        self.tail.push_back(event);
    }

    pub(crate) fn dump_failure(&self, reason: &str) {
        tracing::error!("failure: {}", reason);
        for event in &self.head {
            tracing::error!("  {}", event);
        }
        if self.dropped > 0 {
            tracing::error!("  ... {} events omitted ...", self.dropped);
        }
        for event in &self.tail {
            tracing::error!("  {}", event);
        }
    }

    #[cfg(test)]
    fn retained(&self) -> Vec<&str> {
        self.head
            .iter()
            .chain(self.tail.iter())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_head_and_recent_tail() {
        let mut log = EventLog::new(2, 2);
        for n in 0..6 {
            log.record(format!("e{n}"));
        }
        assert_eq!(log.retained(), vec!["e0", "e1", "e4", "e5"]);
        assert_eq!(log.dropped, 2);
    }
}
