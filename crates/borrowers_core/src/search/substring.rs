//! Case-insensitive substring search over borrowers.
//!
//! # Responsibility
//! - Match the term against `card_id`, `name` and `ssn`.
//! - Return full borrower records in card id order.
//!
//! # Invariants
//! - An empty term matches every row.
//! - The term is matched literally; `%` and `_` carry no wildcard meaning.
//! - Ordering is by card id sequence ascending; there is no ranking.
//! - Case folding is Unicode lowercase on both the term and the columns.

use crate::db::DbError;
use crate::model::borrower::{Borrower, CardId};
use log::{debug, error};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// SQL name of the Unicode lowercase function used for matching.
const CASEFOLD_FN: &str = "casefold";

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Substring to look for. Not trimmed.
    pub text: String,
    /// Maximum number of borrowers to return. `None` returns every match.
    pub limit: Option<u32>,
}

impl SearchQuery {
    /// Creates an unbounded query.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Returns borrowers whose card id, name or SSN contains the query text.
pub fn search_borrowers(conn: &Connection, query: &SearchQuery) -> SearchResult<Vec<Borrower>> {
    let started_at = Instant::now();
    let limit = query.limit.map_or(-1, i64::from);

    let result = register_casefold(conn).and_then(|()| run_search(conn, &query.text, limit));
    match &result {
        Ok(borrowers) => debug!(
            "event=borrower_search module=search status=ok term_len={} limit={} hits={} duration_ms={}",
            query.text.chars().count(),
            limit,
            borrowers.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=borrower_search module=search status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Installs `casefold(text)`; SQLite's own `lower()` only folds ASCII.
fn register_casefold(conn: &Connection) -> SearchResult<()> {
    conn.create_scalar_function(
        CASEFOLD_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|text| text.to_lowercase()))
        },
    )?;
    Ok(())
}

fn run_search(conn: &Connection, text: &str, limit: i64) -> SearchResult<Vec<Borrower>> {
    let mut stmt = conn.prepare(
        "SELECT
            card_id,
            name,
            address,
            phone,
            ssn
         FROM borrowers
         WHERE ?1 = ''
            OR instr(casefold(card_id), casefold(?1)) > 0
            OR instr(casefold(name), casefold(?1)) > 0
            OR instr(casefold(ssn), casefold(?1)) > 0
         ORDER BY length(card_id) ASC, card_id ASC
         LIMIT ?2;",
    )?;

    let mut rows = stmt.query(params![text, limit])?;
    let mut borrowers = Vec::new();
    while let Some(row) = rows.next()? {
        borrowers.push(parse_search_row(row)?);
    }
    Ok(borrowers)
}

fn parse_search_row(row: &Row<'_>) -> SearchResult<Borrower> {
    let card_id_text: String = row.get("card_id")?;
    let card_id = CardId::parse(&card_id_text)
        .map_err(|_| SearchError::InvalidData(format!("invalid card id `{card_id_text}`")))?;

    Ok(Borrower {
        card_id,
        name: row.get("name")?,
        address: row.get("address")?,
        phone: row.get("phone")?,
        ssn: row.get("ssn")?,
    })
}
