use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::WriteError;
use crate::ingest::ContactBatch;
use crate::sink::ChannelSink;

const RESET_SQL: &str = "
DROP TABLE IF EXISTS contacts;
CREATE TABLE contacts (
    id    INTEGER NOT NULL,
    name  TEXT    NOT NULL,
    value TEXT    NOT NULL
);
";
const INSERT_SQL: &str = "INSERT INTO contacts(id, name, value) VALUES (?1, ?2, ?3)";

/// Stores channels in a SQLite `contacts(id, name, value)` table.
///
/// A run is a single transaction opened by `reset` and committed by
/// `finish`, so the table is only replaced once a run completes. If the sink
/// is dropped in between, SQLite rolls the whole run back, reset included.
pub struct SqliteSink {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WriteError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, WriteError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ChannelSink for SqliteSink {
    fn reset(&mut self) -> Result<(), WriteError> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        self.conn.execute_batch("BEGIN")?;
        self.in_transaction = true;
        self.conn.execute_batch(RESET_SQL)?;
        Ok(())
    }

    fn insert(&mut self, batch: &ContactBatch) -> Result<(), WriteError> {
        let id = i64::try_from(batch.contact_id.get()).map_err(|_| {
            WriteError::Rejected(format!(
                "contact id {} does not fit an INTEGER column",
                batch.contact_id
            ))
        })?;
        let mut stmt = self.conn.prepare_cached(INSERT_SQL)?;
        for channel in &batch.channels {
            stmt.execute(params![id, channel.name.as_str(), channel.value])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}
