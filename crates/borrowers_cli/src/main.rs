//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `borrowers_core` linkage.
//! - Report the borrower count of the configured store.

use borrowers_core::{init_logging_from_config, Registry, RegistryConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("borrowers_core ping={}", borrowers_core::ping());
    println!("borrowers_core version={}", borrowers_core::core_version());

    let config = match RegistryConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let registry = Registry::from_config(&config);
    match registry.count() {
        Ok(count) => {
            println!("borrowers_core db={} borrowers={count}", registry.db_path().display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("borrowers_core db={} error={err}", registry.db_path().display());
            ExitCode::FAILURE
        }
    }
}
