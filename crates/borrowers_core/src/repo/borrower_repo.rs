//! Borrower repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Allocate card ids from the current table maximum.
//! - Persist and load borrower rows inside the core persistence boundary.
//! - Translate store constraint violations into semantic errors.
//!
//! # Invariants
//! - Allocation and insert share one `IMMEDIATE` transaction.
//! - A failed insert leaves no row behind (transaction rolls back on drop).
//! - Read paths reject invalid persisted card ids instead of masking them.

use crate::db::{verify_schema, DbError};
use crate::model::borrower::{Borrower, BorrowerValidationError, CardId, NewBorrower};
use log::{debug, warn};
use rusqlite::{ffi, params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BORROWER_SELECT_SQL: &str = "SELECT
    card_id,
    name,
    address,
    phone,
    ssn
FROM borrowers";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for borrower persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(BorrowerValidationError),
    Db(DbError),
    /// `ssn` already belongs to another borrower.
    DuplicateSsn(String),
    /// Allocated card id was taken by a concurrent writer. Safe to retry.
    CardIdConflict(CardId),
    /// Table has rows but none carries a well-formed card id.
    CorruptCardIdSequence { rows: u64 },
    /// Store failed before the insert ran: write lock or maximum lookup.
    Allocation(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateSsn(ssn) => write!(f, "a borrower with SSN '{ssn}' already exists"),
            Self::CardIdConflict(card_id) => {
                write!(f, "card id {card_id} was allocated concurrently")
            }
            Self::CorruptCardIdSequence { rows } => write!(
                f,
                "borrowers table has {rows} row(s) but no card id matches `ID` + digits"
            ),
            Self::Allocation(err) => write!(f, "card id allocation failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted borrower data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) | Self::Allocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BorrowerValidationError> for RepoError {
    fn from(value: BorrowerValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for borrower records.
pub trait BorrowerRepository {
    /// Computes the card id the next insert would receive.
    fn next_card_id(&self) -> RepoResult<CardId>;
    /// Finds the borrower holding `ssn`, if any.
    fn find_by_ssn(&self, ssn: &str) -> RepoResult<Option<Borrower>>;
    /// Allocates a card id and inserts the borrower atomically.
    fn insert_borrower(&self, input: &NewBorrower) -> RepoResult<Borrower>;
    /// Exact-match lookup. Unknown ids yield `None`.
    fn get_borrower(&self, card_id: &str) -> RepoResult<Option<Borrower>>;
    fn count_borrowers(&self) -> RepoResult<u64>;
}

/// SQLite-backed borrower repository.
pub struct SqliteBorrowerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBorrowerRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        verify_schema(conn)?;
        Ok(Self { conn })
    }
}

impl BorrowerRepository for SqliteBorrowerRepository<'_> {
    fn next_card_id(&self) -> RepoResult<CardId> {
        allocate_card_id(self.conn)
    }

    fn find_by_ssn(&self, ssn: &str) -> RepoResult<Option<Borrower>> {
        query_one(self.conn, "ssn", ssn)
    }

    fn insert_borrower(&self, input: &NewBorrower) -> RepoResult<Borrower> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| RepoError::Allocation(DbError::Sqlite(err)))?;
        let card_id = allocate_card_id(&tx).map_err(|err| match err {
            RepoError::Db(db) => RepoError::Allocation(db),
            other => other,
        })?;

        tx.execute(
            "INSERT INTO borrowers (
                card_id,
                name,
                address,
                phone,
                ssn
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                card_id.as_str(),
                input.name(),
                input.address(),
                input.phone(),
                input.ssn(),
            ],
        )
        .map_err(|err| classify_insert_error(err, &card_id, input.ssn()))?;

        tx.commit()?;
        Ok(input.clone().into_borrower(card_id))
    }

    fn get_borrower(&self, card_id: &str) -> RepoResult<Option<Borrower>> {
        query_one(self.conn, "card_id", card_id)
    }

    fn count_borrowers(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM borrowers;", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

/// Derives the next card id from the highest well-formed id in the table.
///
/// Only `ID` followed by six or more digits counts toward the maximum.
/// Numeric comparison keeps `ID1000000` above `ID999999`.
fn allocate_card_id(conn: &Connection) -> RepoResult<CardId> {
    let (total_rows, max_sequence): (i64, Option<i64>) = conn.query_row(
        "SELECT
            COUNT(*),
            MAX(
                CASE
                    WHEN card_id GLOB 'ID[0-9][0-9][0-9][0-9][0-9][0-9]*'
                     AND substr(card_id, 3) NOT GLOB '*[^0-9]*'
                    THEN CAST(substr(card_id, 3) AS INTEGER)
                END
            )
         FROM borrowers;",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let card_id = match max_sequence {
        Some(sequence) => {
            let sequence = u64::try_from(sequence).map_err(|_| {
                RepoError::InvalidData(format!("negative card id sequence `{sequence}`"))
            })?;
            let next = sequence.checked_add(1).ok_or_else(|| {
                RepoError::InvalidData(format!("card id sequence `{sequence}` is exhausted"))
            })?;
            CardId::from_sequence(next)
        }
        None if total_rows == 0 => CardId::first(),
        None => {
            warn!(
                "event=card_id_allocate module=repo status=error error_code=corrupt_sequence rows={}",
                total_rows
            );
            return Err(RepoError::CorruptCardIdSequence {
                rows: u64::try_from(total_rows).unwrap_or_default(),
            });
        }
    };

    debug!("event=card_id_allocate module=repo status=ok card_id={card_id}");
    Ok(card_id)
}

fn query_one(conn: &Connection, column: &str, value: &str) -> RepoResult<Option<Borrower>> {
    let mut stmt = conn.prepare(&format!("{BORROWER_SELECT_SQL} WHERE {column} = ?1;"))?;
    let mut rows = stmt.query([value])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_borrower_row(row)?));
    }
    Ok(None)
}

fn classify_insert_error(err: rusqlite::Error, card_id: &CardId, ssn: &str) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            let unique = failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY;
            if unique && message.contains("borrowers.ssn") {
                return RepoError::DuplicateSsn(ssn.to_string());
            }
            if unique && message.contains("borrowers.card_id") {
                return RepoError::CardIdConflict(card_id.clone());
            }
        }
    }
    RepoError::from(err)
}

fn parse_borrower_row(row: &Row<'_>) -> RepoResult<Borrower> {
    let card_id_text: String = row.get("card_id")?;
    let card_id = CardId::parse(&card_id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid card id `{card_id_text}` in borrowers.card_id"
        ))
    })?;

    Ok(Borrower {
        card_id,
        name: row.get("name")?,
        address: row.get("address")?,
        phone: row.get("phone")?,
        ssn: row.get("ssn")?,
    })
}
