#![forbid(unsafe_code)]
//! Decoding of newline-delimited contact streams into channel triples.
//!
//! Each input line describes one contact as a run of `prefix + value`
//! segments (`T:12345M:a@b.com`). This crate provides:
//! - A [`Registry`] of channel definitions (name, literal prefix, value
//!   pattern) loaded from JSON or TOML.
//! - [`tokenize`], which decomposes one line into `(channel, value)` pairs or
//!   rejects the whole line.
//! - A bounded-memory ingest loop ([`ContactIngestor`], [`process`]) that
//!   numbers lines as contacts, routes decoded contacts to a [`ChannelSink`]
//!   and rejected lines to a [`FailureSink`].
//! - A SQLite sink behind the `sqlite` feature.

mod channel;
mod config;
mod error;
mod ingest;
mod reader;
mod registry;
mod sink;
#[cfg(feature = "sqlite")]
mod sqlite;
mod tokenizer;

pub use channel::ChannelName;
pub use config::{DefinitionSet, IngestLimits, RawDefinition, ValueMatch};
pub use error::{ConfigurationError, FailureReason, IngestError, ParseFailure, WriteError};
pub use ingest::{
    process, Channel, ContactBatch, ContactId, ContactIngestor, ContactRecord, IngestSummary,
};
pub use registry::{ChannelDefinition, Registry};
pub use sink::{
    ChannelSink, FailureSink, LineFailure, MemorySink, NullSink, StderrFailureSink,
    WriterFailureSink,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSink;
pub use tokenizer::{tokenize, ChannelValue, ParseOutcome};
