//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes only accept validated `NewBorrower` input.
//! - Store constraint violations surface as semantic errors
//!   (`DuplicateSsn`, `CardIdConflict`), not raw SQLite failures.

pub mod borrower_repo;
