//! Borrower schema migrations and verification.
//!
//! # Responsibility
//! - Apply pending schema steps in version order, all in one transaction.
//! - Check that a connection exposes the `borrowers` table the registry reads.
//!
//! # Invariants
//! - Versions are strictly increasing; `user_version` mirrors the last step.
//! - A database newer than this build is rejected, never downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// Table holding borrower records.
pub const BORROWERS_TABLE: &str = "borrowers";

/// Columns every registry query touches.
pub const BORROWER_COLUMNS: [&str; 5] = ["card_id", "name", "address", "phone", "ssn"];

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "borrowers",
    sql: include_str!("0001_borrowers.sql"),
}];

/// Schema version this build writes and expects.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the connection up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;
    Ok(())
}

/// Checks version, table and columns before borrower data is touched.
///
/// # Errors
/// - `SchemaVersionMismatch` when the connection was not migrated by this build.
/// - `MissingTable` / `MissingColumn` when the table shape is incomplete.
pub fn verify_schema(conn: &Connection) -> DbResult<()> {
    let expected = latest_version();
    let actual = current_user_version(conn)?;
    if actual != expected {
        return Err(DbError::SchemaVersionMismatch { expected, actual });
    }

    let columns = borrower_columns(conn)?;
    if columns.is_empty() {
        return Err(DbError::MissingTable(BORROWERS_TABLE));
    }
    if let Some(column) = BORROWER_COLUMNS
        .into_iter()
        .find(|required| !columns.iter().any(|present| present == required))
    {
        return Err(DbError::MissingColumn {
            table: BORROWERS_TABLE,
            column,
        });
    }
    Ok(())
}

/// Reads `PRAGMA user_version` from the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Column names of the borrowers table; empty when the table is absent.
fn borrower_columns(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({BORROWERS_TABLE});"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}
