use std::{io, path::PathBuf};

use thiserror::Error;

use crate::ingest::ContactId;

/// Errors raised while loading channel definitions. Always fatal: no line is
/// processed against a registry that failed to load.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read channel definitions from `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse JSON channel definitions: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML channel definitions: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no channel definitions configured")]
    NoDefinitions,
    #[error("channel definition #{index} has an invalid name `{name}`")]
    InvalidName { index: usize, name: String },
    #[error("channel definition #{index} (`{name}`) has an empty prefix")]
    EmptyPrefix { index: usize, name: String },
    #[error("channel definition #{index} (`{name}`) has an invalid pattern: {source}")]
    Pattern {
        index: usize,
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Why a single line could not be decomposed into channels.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FailureReason {
    #[error("no channel prefix matches at byte {offset}")]
    UnknownPrefix { offset: usize },
    #[error("no value for channel `{channel}` after byte {offset}")]
    MissingValue { channel: String, offset: usize },
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// A line that did not fully decompose. Carries the line text so it can be
/// reported verbatim; none of its channels are ever emitted.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("unparseable line ({reason}): {line}")]
pub struct ParseFailure {
    pub line: String,
    pub reason: FailureReason,
}

/// Failure reported by a [`ChannelSink`](crate::ChannelSink).
#[derive(Debug, Error)]
pub enum WriteError {
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Errors that abort an ingest run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read line {line_number} from the input stream: {source}")]
    Io {
        line_number: usize,
        #[source]
        source: io::Error,
    },
    #[error("contact ids exhausted at line {line_number}")]
    IdsExhausted { line_number: usize },
    #[error("failed to reset the channel store: {0}")]
    Reset(#[source] WriteError),
    #[error("failed to store channels of contact {contact_id}: {source}")]
    Write {
        contact_id: ContactId,
        #[source]
        source: WriteError,
    },
    #[error("failed to finalize the channel store: {0}")]
    Finish(#[source] WriteError),
}
