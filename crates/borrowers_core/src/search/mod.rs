//! Borrower search entry points.
//!
//! # Responsibility
//! - Expose substring search over card id, name and SSN.
//! - Keep search result shaping inside core.

pub mod substring;
