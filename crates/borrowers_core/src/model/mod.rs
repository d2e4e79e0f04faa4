//! Borrower domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every borrower is identified by a system-generated `CardId`.
//! - Input normalization happens here, before any storage access.

pub mod borrower;
