use std::io::{self, Write};

use tracing::warn;

use crate::error::{ParseFailure, WriteError};
use crate::ingest::{ContactBatch, ContactId};

/// Destination for decoded contacts.
///
/// Any error returned here aborts the run; the sink is expected to leave no
/// partially committed state behind in that case.
pub trait ChannelSink {
    /// Discards previously stored data. Called once before the first insert.
    fn reset(&mut self) -> Result<(), WriteError> {
        Ok(())
    }

    fn insert(&mut self, batch: &ContactBatch) -> Result<(), WriteError>;

    /// Makes the run's inserts durable. Called once after the last insert.
    fn finish(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

/// A rejected line together with the contact id it consumed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LineFailure {
    pub contact_id: ContactId,
    pub failure: ParseFailure,
}

/// Receives rejected lines for operator visibility. Reporting is
/// fire-and-forget: implementations swallow their own errors.
pub trait FailureSink {
    fn on_failure(&mut self, failure: LineFailure);
}

impl FailureSink for Vec<LineFailure> {
    fn on_failure(&mut self, failure: LineFailure) {
        self.push(failure);
    }
}

/// Keeps every batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<ContactBatch>,
    pub resets: usize,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelSink for MemorySink {
    fn reset(&mut self) -> Result<(), WriteError> {
        self.batches.clear();
        self.resets += 1;
        self.finished = false;
        Ok(())
    }

    fn insert(&mut self, batch: &ContactBatch) -> Result<(), WriteError> {
        self.batches.push(batch.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        self.finished = true;
        Ok(())
    }
}

/// Accepts and drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ChannelSink for NullSink {
    fn insert(&mut self, _batch: &ContactBatch) -> Result<(), WriteError> {
        Ok(())
    }
}

/// Writes one rejected line per output line. Lines whose text was not kept
/// (oversized input) are written as their failure reason instead.
pub struct WriterFailureSink<W: Write> {
    writer: W,
    warned: bool,
}

impl<W: Write> WriterFailureSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            warned: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_failure(&mut self, failure: &ParseFailure) -> io::Result<()> {
        if failure.line.is_empty() {
            writeln!(self.writer, "{}", failure.reason)
        } else {
            writeln!(self.writer, "{}", failure.line)
        }
    }
}

impl<W: Write> FailureSink for WriterFailureSink<W> {
    fn on_failure(&mut self, failure: LineFailure) {
        if let Err(err) = self.write_failure(&failure.failure) {
            if !self.warned {
                warn!(error = %err, "failed to report rejected line");
                self.warned = true;
            }
        }
    }
}

pub type StderrFailureSink = WriterFailureSink<io::Stderr>;

impl StderrFailureSink {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;

    fn failure(line: &str, reason: FailureReason) -> LineFailure {
        LineFailure {
            contact_id: ContactId::FIRST,
            failure: ParseFailure {
                line: line.to_string(),
                reason,
            },
        }
    }

    #[test]
    fn writer_sink_prints_line_text_or_reason() {
        let mut sink = WriterFailureSink::new(Vec::new());
        sink.on_failure(failure("X:oops", FailureReason::UnknownPrefix { offset: 0 }));
        sink.on_failure(failure(
            "",
            FailureReason::LineTooLong {
                observed_bytes: 70000,
                max_line_bytes: 65536,
            },
        ));
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "X:oops\nline too long (observed_bytes=70000, max_line_bytes=65536)\n"
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_sink_swallows_write_errors() {
        let mut sink = WriterFailureSink::new(BrokenPipe);
        sink.on_failure(failure("a", FailureReason::UnknownPrefix { offset: 0 }));
        sink.on_failure(failure("b", FailureReason::UnknownPrefix { offset: 0 }));
    }
}
