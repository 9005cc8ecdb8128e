use std::{
    env,
    fs::File,
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use channel_ingest::{
    process, ChannelSink, ConfigurationError, DefinitionSet, FailureSink, IngestError,
    IngestLimits, NullSink, Registry, SqliteSink, StderrFailureSink, ValueMatch, WriteError,
    WriterFailureSink,
};
use clap::Parser;
use thiserror::Error;
use tracing::info;

use crate::stream::StreamSource;

const DEFAULT_PROGRAM_NAME: &str = "contact-ingest";

/// Decode a newline-delimited contact stream into a SQLite `contacts` table.
///
/// Lines that do not decode are written to stderr (or `--rejects`) and skipped.
#[derive(Debug, Parser)]
#[command(name = "contact-ingest", version)]
pub struct Args {
    /// Stream to ingest: an http(s) URL, a file path (optionally `file://`), or `-` for stdin.
    pub uri: String,

    /// Channel definitions file (JSON, or TOML with a `.toml` extension). Defaults to `<program>.json`.
    #[arg(long)]
    pub conf: Option<PathBuf>,

    /// SQLite database to (re)create. Defaults to `<program>.sqlite`.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Require each value to start right after its prefix instead of anywhere in the rest of the line.
    #[arg(long)]
    pub anchored: bool,

    /// Longest accepted line in bytes; longer lines are rejected.
    #[arg(long, default_value_t = IngestLimits::default().max_line_bytes)]
    pub max_line_bytes: usize,

    /// Write rejected lines to this file instead of stderr.
    #[arg(long)]
    pub rejects: Option<PathBuf>,

    /// Decode and report rejects without touching the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Log at debug level when `RUST_LOG` is unset.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot load configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("cannot open database `{path}`: {source}")]
    OpenDatabase {
        path: PathBuf,
        #[source]
        source: WriteError,
    },
    #[error("cannot fetch stream `{url}`: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot open stream `{path}`: {source}")]
    OpenStream {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot create rejects file `{path}`: {source}")]
    Rejects {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

fn program_name() -> String {
    env::args()
        .next()
        .filter(|arg| !arg.is_empty())
        .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string())
}

fn default_path(explicit: Option<PathBuf>, extension: &str) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(format!("{}.{extension}", program_name())))
}

fn load_registry(path: &Path, force_anchored: bool) -> Result<Registry, ConfigurationError> {
    let mut set = DefinitionSet::from_path(path)?;
    if force_anchored {
        set.value_match = ValueMatch::Anchored;
    }
    Registry::load(&set)
}

pub fn run(args: Args) -> Result<(), Error> {
    let conf_path = default_path(args.conf, "json");
    let registry = load_registry(&conf_path, args.anchored)?;
    info!(
        path = %conf_path.display(),
        channels = registry.len(),
        value_match = ?registry.value_match(),
        "loaded channel definitions"
    );

    let mut sink: Box<dyn ChannelSink> = if args.dry_run {
        Box::new(NullSink)
    } else {
        let db_path = default_path(args.db, "sqlite");
        let sink = SqliteSink::open(&db_path).map_err(|source| Error::OpenDatabase {
            path: db_path.clone(),
            source,
        })?;
        info!(path = %db_path.display(), "opened database");
        Box::new(sink)
    };

    let mut failures: Box<dyn FailureSink> = match &args.rejects {
        Some(path) => {
            let file = File::create(path).map_err(|source| Error::Rejects {
                path: path.clone(),
                source,
            })?;
            Box::new(WriterFailureSink::new(BufWriter::new(file)))
        }
        None => Box::new(StderrFailureSink::stderr()),
    };

    let source = StreamSource::parse(&args.uri).open()?;
    let limits = IngestLimits {
        max_line_bytes: args.max_line_bytes,
    };

    let summary = process(source, &registry, limits, sink.as_mut(), failures.as_mut())?;
    if summary.failures > 0 {
        info!(
            rejected = summary.failures,
            lines = summary.lines,
            "some lines were rejected"
        );
    }
    Ok(())
}
