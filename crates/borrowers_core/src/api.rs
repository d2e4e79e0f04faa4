//! Caller-facing registry API.
//!
//! # Responsibility
//! - Expose register/get/search for CLI or UI layers.
//! - Open one connection per call and release it before returning.
//! - Turn registration outcomes into stable response envelopes.
//!
//! # Invariants
//! - No call holds a connection after it returns, on any exit path.
//! - Functions never panic; failures come back as values.

use crate::config::RegistryConfig;
use crate::db::{open_db, verify_schema, DbError};
use crate::model::borrower::{Borrower, BorrowerValidationError};
use crate::repo::borrower_repo::{RepoError, SqliteBorrowerRepository};
use crate::search::substring::{search_borrowers, SearchError, SearchQuery};
use crate::service::registration_service::{
    validate_registration, BorrowerService, RegistrationError, RegistrationErrorKind,
};
use log::{debug, error};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Failure of a read-side registry call.
#[derive(Debug)]
pub enum RegistryError {
    Db(DbError),
    Repo(RepoError),
    Search(SearchError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for RegistryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SearchError> for RegistryError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

/// Outcome envelope for a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterResponse {
    /// Whether a borrower was created.
    pub ok: bool,
    /// Human-readable outcome for display.
    pub message: String,
    /// Assigned card id, present only on success.
    pub card_id: Option<String>,
    /// Failure class, present only on failure.
    pub error_kind: Option<RegistrationErrorKind>,
}

impl RegisterResponse {
    fn success(borrower: &Borrower) -> Self {
        Self {
            ok: true,
            message: format!(
                "Successfully created new borrower. Card ID: {}",
                borrower.card_id
            ),
            card_id: Some(borrower.card_id.to_string()),
            error_kind: None,
        }
    }

    fn failure(err: &RegistrationError) -> Self {
        Self {
            ok: false,
            message: failure_message(err),
            card_id: None,
            error_kind: Some(err.kind()),
        }
    }

    /// Whether repeating the same registration may succeed.
    pub fn is_retryable(&self) -> bool {
        self.error_kind == Some(RegistrationErrorKind::Conflict)
    }
}

/// Borrower registry bound to one SQLite database file.
///
/// Holds only the path; every operation opens and drops its own connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    db_path: PathBuf,
}

impl Registry {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.db_path.clone())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Registers a borrower from raw caller input.
    pub fn register(&self, name: &str, address: &str, phone: &str, ssn: &str) -> RegisterResponse {
        let outcome = validate_registration(name, address, phone, ssn)
            .and_then(|input| self.with_service(|service| service.register_input(input)));
        match outcome {
            Ok(borrower) => RegisterResponse::success(&borrower),
            Err(err) => RegisterResponse::failure(&err),
        }
    }

    /// Looks up a borrower by exact card id. Unknown ids yield `Ok(None)`.
    pub fn get(&self, card_id: &str) -> Result<Option<Borrower>, RegistryError> {
        let found = self.with_service(|service| service.get_borrower(card_id))?;
        debug!(
            "event=borrower_get module=api status=ok found={}",
            found.is_some()
        );
        Ok(found)
    }

    /// Case-insensitive substring search over card id, name and SSN.
    pub fn search(&self, term: &str) -> Result<Vec<Borrower>, RegistryError> {
        self.search_with(&SearchQuery::new(term))
    }

    pub fn search_with(&self, query: &SearchQuery) -> Result<Vec<Borrower>, RegistryError> {
        let conn = self.open()?;
        verify_schema(&conn).map_err(RepoError::Db)?;
        Ok(search_borrowers(&conn, query)?)
    }

    /// Number of registered borrowers.
    pub fn count(&self) -> Result<u64, RegistryError> {
        Ok(self.with_service(|service| service.count_borrowers())?)
    }

    fn open(&self) -> Result<rusqlite::Connection, DbError> {
        open_db(&self.db_path).map_err(|err| {
            error!(
                "event=registry_open module=api status=error error={}",
                err
            );
            err
        })
    }

    fn with_service<T, E>(
        &self,
        f: impl FnOnce(&BorrowerService<SqliteBorrowerRepository<'_>>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        let conn = self.open().map_err(|err| E::from(RepoError::Db(err)))?;
        let repo = SqliteBorrowerRepository::try_new(&conn)?;
        let service = BorrowerService::new(repo);
        f(&service)
    }
}

fn failure_message(err: &RegistrationError) -> String {
    match err {
        RegistrationError::Validation(BorrowerValidationError::MissingField(field)) => {
            format!("Error: {} is required.", field.label())
        }
        RegistrationError::Validation(other) => format!("Error: {other}."),
        RegistrationError::DuplicateSsn(ssn) => format!(
            "Error: A borrower with SSN '{ssn}' already exists. Each borrower is allowed exactly one library card."
        ),
        RegistrationError::CardIdConflict(card_id) => format!(
            "Error: Card ID {card_id} was allocated concurrently; retry the registration."
        ),
        RegistrationError::Store(err) => format!("Database error: {err}"),
    }
}
