use std::{
    fmt,
    io::{BufReader, Read},
};

use tracing::{debug, info};

use crate::channel::ChannelName;
use crate::config::IngestLimits;
use crate::error::{FailureReason, IngestError, ParseFailure};
use crate::reader::{LineSplitter, RawLine};
use crate::registry::Registry;
use crate::sink::{ChannelSink, FailureSink, LineFailure};
use crate::tokenizer::{tokenize, ParseOutcome};

/// Sequential 1-based contact identifier. Every input line consumes one,
/// whether or not it parses.
#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ContactId(u64);

impl ContactId {
    pub const FIRST: ContactId = ContactId(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored `(contact id, channel name, value)` triple.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Channel {
    pub contact_id: ContactId,
    pub name: ChannelName,
    pub value: String,
}

/// All channels decoded from one line, handed to the sink in a single call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContactBatch {
    pub contact_id: ContactId,
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContactRecord {
    pub contact_id: ContactId,
    pub outcome: ParseOutcome,
}

impl ContactRecord {
    /// Converts a successful record into the batch stored for it.
    pub fn into_batch(self) -> Result<ContactBatch, LineFailure> {
        let contact_id = self.contact_id;
        match self.outcome {
            ParseOutcome::Success(values) => Ok(ContactBatch {
                contact_id,
                channels: values
                    .into_iter()
                    .map(|value| Channel {
                        contact_id,
                        name: value.name,
                        value: value.value,
                    })
                    .collect(),
            }),
            ParseOutcome::Failure(failure) => Err(LineFailure {
                contact_id,
                failure,
            }),
        }
    }
}

/// Pulls lines from a byte source and tokenizes each one.
///
/// Yields one record per line in input order. A read error, or running out
/// of contact ids, is yielded once as `Err` and ends the iteration.
pub struct ContactIngestor<'r, R: Read> {
    lines: LineSplitter<BufReader<R>>,
    registry: &'r Registry,
    next_id: Option<ContactId>,
    max_line_bytes: usize,
    stopped: bool,
}

impl<'r, R: Read> ContactIngestor<'r, R> {
    pub fn new(source: R, registry: &'r Registry, limits: IngestLimits) -> Self {
        Self::starting_at(source, registry, limits, ContactId::FIRST)
    }

    pub fn starting_at(
        source: R,
        registry: &'r Registry,
        limits: IngestLimits,
        first_id: ContactId,
    ) -> Self {
        Self {
            lines: LineSplitter::new(BufReader::new(source), limits.max_line_bytes),
            registry,
            next_id: Some(first_id),
            max_line_bytes: limits.max_line_bytes,
            stopped: false,
        }
    }

    /// Identifier the next line will receive, or `None` once the id space is
    /// used up.
    pub fn next_id(&self) -> Option<ContactId> {
        self.next_id
    }

    fn take_id(&mut self) -> Result<ContactId, IngestError> {
        let line_number = self.lines.lines_read();
        let id = self.next_id.ok_or(IngestError::IdsExhausted { line_number })?;
        self.next_id = id.next();
        Ok(id)
    }

    fn decode(&self, line: RawLine) -> ParseOutcome {
        let bytes = match line {
            RawLine::Bytes(bytes) => bytes,
            RawLine::TooLong { observed_bytes } => {
                return ParseOutcome::Failure(ParseFailure {
                    line: String::new(),
                    reason: FailureReason::LineTooLong {
                        observed_bytes,
                        max_line_bytes: self.max_line_bytes,
                    },
                });
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => tokenize(text.trim(), self.registry),
            Err(err) => ParseOutcome::Failure(ParseFailure {
                line: String::from_utf8_lossy(err.as_bytes()).trim().to_string(),
                reason: FailureReason::InvalidUtf8,
            }),
        }
    }

    fn next_record(&mut self) -> Result<Option<ContactRecord>, IngestError> {
        let line = match self.lines.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(None),
            Err(source) => {
                let line_number = self.lines.lines_read() + 1;
                return Err(IngestError::Io {
                    line_number,
                    source,
                });
            }
        };
        let contact_id = self.take_id()?;
        let outcome = self.decode(line);
        Ok(Some(ContactRecord {
            contact_id,
            outcome,
        }))
    }
}

impl<R: Read> Iterator for ContactIngestor<'_, R> {
    type Item = Result<ContactRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }
        let result = self.next_record().transpose();
        if matches!(result, None | Some(Err(_))) {
            self.stopped = true;
        }
        result
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct IngestSummary {
    /// Lines read, equal to the number of contact ids consumed.
    pub lines: u64,
    /// Lines that decoded and were stored.
    pub contacts: u64,
    pub channels: u64,
    pub failures: u64,
}

/// Runs a complete ingest: resets the sink, stores every decoded line as one
/// batch, reports every failed line, and finalizes the sink at end of input.
///
/// Parse failures never stop the run. A read error, exhausted contact ids, or
/// any sink error aborts it, and `finish` is then not called.
pub fn process<R, S, F>(
    source: R,
    registry: &Registry,
    limits: IngestLimits,
    sink: &mut S,
    failures: &mut F,
) -> Result<IngestSummary, IngestError>
where
    R: Read,
    S: ChannelSink + ?Sized,
    F: FailureSink + ?Sized,
{
    sink.reset().map_err(IngestError::Reset)?;

    let mut summary = IngestSummary::default();
    for record in ContactIngestor::new(source, registry, limits) {
        let record = record?;
        summary.lines += 1;

        match record.into_batch() {
            Ok(batch) => {
                sink.insert(&batch).map_err(|source| IngestError::Write {
                    contact_id: batch.contact_id,
                    source,
                })?;
                summary.contacts += 1;
                summary.channels += batch.channels.len() as u64;
            }
            Err(failure) => {
                debug!(
                    contact_id = failure.contact_id.get(),
                    reason = %failure.failure.reason,
                    "rejecting unparseable line"
                );
                summary.failures += 1;
                failures.on_failure(failure);
            }
        }
    }

    sink.finish().map_err(IngestError::Finish)?;
    info!(
        lines = summary.lines,
        contacts = summary.contacts,
        channels = summary.channels,
        failures = summary.failures,
        "ingest complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefinitionSet, RawDefinition};
    use std::io::Cursor;

    fn registry() -> Registry {
        Registry::load(&DefinitionSet::new(vec![
            RawDefinition::new("tel", "T:", "[0-9]+"),
            RawDefinition::new("mail", "M:", "[a-z@.]+"),
        ]))
        .unwrap()
    }

    fn records(input: &[u8], limits: IngestLimits) -> Vec<ContactRecord> {
        let reg = registry();
        ContactIngestor::new(Cursor::new(input.to_vec()), &reg, limits)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn ids_advance_once_per_line_regardless_of_outcome() {
        let recs = records(b"T:1\nX:bad\n\nM:a@b\n", IngestLimits::default());
        let ids: Vec<_> = recs.iter().map(|r| r.contact_id.get()).collect();
        assert_eq!(ids, [1, 2, 3, 4]);
        let ok: Vec<_> = recs.iter().map(|r| r.outcome.is_success()).collect();
        assert_eq!(ok, [true, false, true, true]);
    }

    #[test]
    fn surrounding_whitespace_and_crlf_are_trimmed() {
        let recs = records(b"  T:1M:x@y \r\n", IngestLimits::default());
        let batch = recs.into_iter().next().unwrap().into_batch().unwrap();
        let values: Vec<_> = batch.channels.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, ["1", "x@y"]);
        assert!(batch.channels.iter().all(|c| c.contact_id == ContactId::FIRST));
    }

    #[test]
    fn failure_keeps_trimmed_line_text() {
        let recs = records(b"  X:oops  \n", IngestLimits::default());
        let failure = recs.into_iter().next().unwrap().into_batch().unwrap_err();
        assert_eq!(failure.failure.line, "X:oops");
    }

    #[test]
    fn oversized_and_invalid_utf8_lines_consume_ids() {
        let mut input = b"T:1\n".to_vec();
        input.extend_from_slice(&[b'9'; 40]);
        input.extend_from_slice(b"\nT:\xff\nT:2\n");
        let recs = records(&input, IngestLimits { max_line_bytes: 16 });

        assert_eq!(recs.len(), 4);
        assert!(matches!(
            &recs[1].outcome,
            ParseOutcome::Failure(ParseFailure {
                reason: FailureReason::LineTooLong { observed_bytes: 40, .. },
                ..
            })
        ));
        assert!(matches!(
            &recs[2].outcome,
            ParseOutcome::Failure(ParseFailure {
                reason: FailureReason::InvalidUtf8,
                ..
            })
        ));
        assert_eq!(recs[3].contact_id.get(), 4);
        assert!(recs[3].outcome.is_success());
    }

    #[test]
    fn starting_id_is_caller_supplied() {
        let reg = registry();
        let ids: Vec<_> = ContactIngestor::starting_at(
            Cursor::new(b"T:1\nT:2\n".to_vec()),
            &reg,
            IngestLimits::default(),
            ContactId::new(10),
        )
        .map(|r| r.unwrap().contact_id.get())
        .collect();
        assert_eq!(ids, [10, 11]);
    }

    #[test]
    fn last_contact_id_is_never_reused() {
        let reg = registry();
        let mut ingestor = ContactIngestor::starting_at(
            Cursor::new(b"T:1\nT:2\nT:3\n".to_vec()),
            &reg,
            IngestLimits::default(),
            ContactId::new(u64::MAX),
        );

        let first = ingestor.next().unwrap().unwrap();
        assert_eq!(first.contact_id.get(), u64::MAX);
        assert_eq!(ingestor.next_id(), None);
        assert!(matches!(
            ingestor.next(),
            Some(Err(IngestError::IdsExhausted { line_number: 2 }))
        ));
        assert!(ingestor.next().is_none());
    }
}
