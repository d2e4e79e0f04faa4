//! SQLite storage bootstrap, migrations and schema verification.
//!
//! # Responsibility
//! - Open connections with the pragmas the registry relies on.
//! - Bring the `borrowers` table to the latest schema version.
//! - Refuse connections whose schema cannot hold borrower rows.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - Borrower data is never read or written on an unverified connection.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::verify_schema;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage bootstrap and schema failure.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Database was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection has not been migrated to the version this build expects.
    SchemaVersionMismatch { expected: u32, actual: u32 },
    MissingTable(&'static str),
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::SchemaVersionMismatch { expected, actual } => write!(
                f,
                "borrower storage requires schema version {expected}, got {actual}"
            ),
            Self::MissingTable(table) => write!(f, "borrower storage requires table `{table}`"),
            Self::MissingColumn { table, column } => write!(
                f,
                "borrower storage requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
