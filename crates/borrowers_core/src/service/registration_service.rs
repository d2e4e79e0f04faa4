//! Borrower registration use-case service.
//!
//! # Responsibility
//! - Drive registration through validate, duplicate check, allocate, insert.
//! - Classify failures into validation, duplicate, conflict and store kinds.
//!
//! # Invariants
//! - Validation completes before the repository is touched.
//! - A duplicate SSN is reported the same way whether the pre-check or the
//!   store constraint caught it.
//! - No retries happen here; every failure is terminal for the call.

use crate::model::borrower::{Borrower, BorrowerValidationError, CardId, NewBorrower};
use crate::repo::borrower_repo::{BorrowerRepository, RepoError, RepoResult};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Registration progress, used to tag log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    Validating,
    CheckingDuplicate,
    Allocating,
    Inserting,
    Committed,
}

impl RegistrationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::CheckingDuplicate => "checking_duplicate",
            Self::Allocating => "allocating",
            Self::Inserting => "inserting",
            Self::Committed => "committed",
        }
    }
}

/// Coarse failure class surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationErrorKind {
    /// Caller input is blank; fix and resubmit.
    Validation,
    /// SSN already holds a card.
    Duplicate,
    /// Card id collided with a concurrent registration; retry as-is.
    Conflict,
    Store,
}

/// Service error for borrower registration.
#[derive(Debug)]
pub enum RegistrationError {
    Validation(BorrowerValidationError),
    DuplicateSsn(String),
    CardIdConflict(CardId),
    Store(RepoError),
}

impl RegistrationError {
    pub fn kind(&self) -> RegistrationErrorKind {
        match self {
            Self::Validation(_) => RegistrationErrorKind::Validation,
            Self::DuplicateSsn(_) => RegistrationErrorKind::Duplicate,
            Self::CardIdConflict(_) => RegistrationErrorKind::Conflict,
            Self::Store(_) => RegistrationErrorKind::Store,
        }
    }

    /// Whether repeating the same registration may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CardIdConflict(_))
    }
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateSsn(ssn) => write!(
                f,
                "a borrower with SSN '{ssn}' already exists; each borrower is allowed exactly one library card"
            ),
            Self::CardIdConflict(card_id) => {
                write!(f, "card id {card_id} was allocated concurrently; retry")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::DuplicateSsn(_) | Self::CardIdConflict(_) => None,
        }
    }
}

impl From<BorrowerValidationError> for RegistrationError {
    fn from(value: BorrowerValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for RegistrationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::DuplicateSsn(ssn) => Self::DuplicateSsn(ssn),
            RepoError::CardIdConflict(card_id) => Self::CardIdConflict(card_id),
            other => Self::Store(other),
        }
    }
}

/// Borrower service facade over repository implementations.
pub struct BorrowerService<R: BorrowerRepository> {
    repo: R,
}

impl<R: BorrowerRepository> BorrowerService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new borrower and returns the persisted record.
    ///
    /// # Contract
    /// - Blank fields fail with `Validation` before any repository call.
    /// - An existing SSN fails with `DuplicateSsn`, from either the pre-check
    ///   or the insert-time constraint.
    /// - A card id collision fails with `CardIdConflict`.
    /// - Exactly one row is written on success, none on failure.
    pub fn register(
        &self,
        name: &str,
        address: &str,
        phone: &str,
        ssn: &str,
    ) -> Result<Borrower, RegistrationError> {
        let input = validate_registration(name, address, phone, ssn)?;
        self.register_input(input)
    }

    /// Registers already validated input, starting at the duplicate check.
    pub fn register_input(&self, input: NewBorrower) -> Result<Borrower, RegistrationError> {
        let started_at = Instant::now();

        let existing = self
            .repo
            .find_by_ssn(input.ssn())
            .map_err(|err| fail(RegistrationStage::CheckingDuplicate, started_at, err.into()))?;
        if existing.is_some() {
            return Err(fail(
                RegistrationStage::CheckingDuplicate,
                started_at,
                RegistrationError::DuplicateSsn(input.ssn().to_string()),
            ));
        }

        let borrower = self.repo.insert_borrower(&input).map_err(|err| {
            let stage = if matches!(
                err,
                RepoError::CorruptCardIdSequence { .. } | RepoError::Allocation(_)
            ) {
                RegistrationStage::Allocating
            } else {
                RegistrationStage::Inserting
            };
            fail(stage, started_at, err.into())
        })?;

        info!(
            "event=borrower_register module=service status=ok stage={} card_id={} duration_ms={}",
            RegistrationStage::Committed.as_str(),
            borrower.card_id,
            started_at.elapsed().as_millis()
        );
        Ok(borrower)
    }

    /// Gets one borrower by exact card id.
    pub fn get_borrower(&self, card_id: &str) -> RepoResult<Option<Borrower>> {
        self.repo.get_borrower(card_id)
    }

    /// Previews the card id the next registration would receive.
    pub fn next_card_id(&self) -> RepoResult<CardId> {
        self.repo.next_card_id()
    }

    pub fn count_borrowers(&self) -> RepoResult<u64> {
        self.repo.count_borrowers()
    }
}

/// Trims and validates raw registration input without touching storage.
pub fn validate_registration(
    name: &str,
    address: &str,
    phone: &str,
    ssn: &str,
) -> Result<NewBorrower, RegistrationError> {
    NewBorrower::new(name, address, phone, ssn)
        .map_err(|err| fail(RegistrationStage::Validating, Instant::now(), err.into()))
}

fn fail(
    stage: RegistrationStage,
    started_at: Instant,
    err: RegistrationError,
) -> RegistrationError {
    warn!(
        "event=borrower_register module=service status=error stage={} error_kind={:?} duration_ms={}",
        stage.as_str(),
        err.kind(),
        started_at.elapsed().as_millis()
    );
    err
}

#[cfg(test)]
mod tests {
    use super::{BorrowerService, RegistrationError, RegistrationErrorKind};
    use crate::db::DbError;
    use crate::model::borrower::{Borrower, BorrowerField, BorrowerValidationError, CardId, NewBorrower};
    use crate::repo::borrower_repo::{BorrowerRepository, RepoError, RepoResult};
    use std::cell::RefCell;

    /// In-memory double that records which repository calls were made.
    #[derive(Default)]
    struct RecordingRepo {
        rows: RefCell<Vec<Borrower>>,
        calls: RefCell<Vec<&'static str>>,
        insert_error: RefCell<Option<RepoError>>,
    }

    impl BorrowerRepository for &RecordingRepo {
        fn next_card_id(&self) -> RepoResult<CardId> {
            self.calls.borrow_mut().push("next_card_id");
            Ok(CardId::from_sequence(self.rows.borrow().len() as u64 + 1))
        }

        fn find_by_ssn(&self, ssn: &str) -> RepoResult<Option<Borrower>> {
            self.calls.borrow_mut().push("find_by_ssn");
            Ok(self.rows.borrow().iter().find(|row| row.ssn == ssn).cloned())
        }

        fn insert_borrower(&self, input: &NewBorrower) -> RepoResult<Borrower> {
            self.calls.borrow_mut().push("insert_borrower");
            if let Some(err) = self.insert_error.borrow_mut().take() {
                return Err(err);
            }
            let card_id = CardId::from_sequence(self.rows.borrow().len() as u64 + 1);
            let borrower = input.clone().into_borrower(card_id);
            self.rows.borrow_mut().push(borrower.clone());
            Ok(borrower)
        }

        fn get_borrower(&self, card_id: &str) -> RepoResult<Option<Borrower>> {
            self.calls.borrow_mut().push("get_borrower");
            Ok(self
                .rows
                .borrow()
                .iter()
                .find(|row| row.card_id.as_str() == card_id)
                .cloned())
        }

        fn count_borrowers(&self) -> RepoResult<u64> {
            Ok(self.rows.borrow().len() as u64)
        }
    }

    #[test]
    fn blank_field_fails_before_repository_access() {
        let repo = RecordingRepo::default();
        let service = BorrowerService::new(&repo);

        let err = service
            .register("John Doe", "123 Main St", "   ", "111-22-3333")
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::Validation(BorrowerValidationError::MissingField(
                BorrowerField::Phone
            ))
        ));
        assert_eq!(err.kind(), RegistrationErrorKind::Validation);
        assert!(repo.calls.borrow().is_empty());
    }

    #[test]
    fn duplicate_pre_check_skips_insert() {
        let repo = RecordingRepo::default();
        let service = BorrowerService::new(&repo);
        service
            .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
            .unwrap();
        repo.calls.borrow_mut().clear();

        let err = service
            .register("Jane Doe", "9 Elm St", "555-0000", " 111-22-3333 ")
            .unwrap_err();

        assert!(matches!(&err, RegistrationError::DuplicateSsn(ssn) if ssn == "111-22-3333"));
        assert_eq!(*repo.calls.borrow(), vec!["find_by_ssn"]);
        assert_eq!(repo.rows.borrow().len(), 1);
    }

    #[test]
    fn insert_time_ssn_violation_maps_to_duplicate() {
        let repo = RecordingRepo::default();
        *repo.insert_error.borrow_mut() = Some(RepoError::DuplicateSsn("111-22-3333".to_string()));
        let service = BorrowerService::new(&repo);

        let err = service
            .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
            .unwrap_err();

        assert_eq!(err.kind(), RegistrationErrorKind::Duplicate);
        assert!(!err.is_transient());
    }

    #[test]
    fn card_id_collision_is_transient_conflict() {
        let repo = RecordingRepo::default();
        *repo.insert_error.borrow_mut() = Some(RepoError::CardIdConflict(CardId::first()));
        let service = BorrowerService::new(&repo);

        let err = service
            .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
            .unwrap_err();

        assert_eq!(err.kind(), RegistrationErrorKind::Conflict);
        assert!(err.is_transient());

        let retried = service
            .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
            .unwrap();
        assert_eq!(retried.card_id, CardId::first());
    }

    #[test]
    fn other_repository_failures_are_store_errors() {
        let repo = RecordingRepo::default();
        *repo.insert_error.borrow_mut() = Some(RepoError::CorruptCardIdSequence { rows: 3 });
        let service = BorrowerService::new(&repo);

        let err = service
            .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
            .unwrap_err();

        assert_eq!(err.kind(), RegistrationErrorKind::Store);
        assert!(matches!(
            err,
            RegistrationError::Store(RepoError::CorruptCardIdSequence { rows: 3 })
        ));
    }

    #[test]
    fn allocation_failure_is_store_error_and_not_transient() {
        let repo = RecordingRepo::default();
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        *repo.insert_error.borrow_mut() = Some(RepoError::Allocation(DbError::Sqlite(busy)));
        let service = BorrowerService::new(&repo);

        let err = service
            .register("John Doe", "123 Main St", "555-1234", "111-22-3333")
            .unwrap_err();

        assert_eq!(err.kind(), RegistrationErrorKind::Store);
        assert!(!err.is_transient());
        assert!(matches!(err, RegistrationError::Store(RepoError::Allocation(_))));
        assert!(repo.rows.borrow().is_empty());
    }
}
