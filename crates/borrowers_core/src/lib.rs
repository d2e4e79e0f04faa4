//! Core borrower registry for the library.
//! This crate is the single source of truth for borrower invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use api::{RegisterResponse, Registry, RegistryError};
pub use config::{ConfigError, RegistryConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::borrower::{Borrower, BorrowerField, BorrowerValidationError, CardId, NewBorrower};
pub use repo::borrower_repo::{
    BorrowerRepository, RepoError, RepoResult, SqliteBorrowerRepository,
};
pub use search::substring::{search_borrowers, SearchError, SearchQuery, SearchResult};
pub use service::registration_service::{
    validate_registration, BorrowerService, RegistrationError, RegistrationErrorKind,
    RegistrationStage,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
