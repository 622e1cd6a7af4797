//! Command-line interface

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use crate::domain::errors::DomainError;
use crate::infrastructure::config::ConfigError;

/// Exit code for a configuration error
pub const EXIT_CONFIG: i32 = 2;

/// Exit code for a failed or cancelled pass
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for an error, by the first recognised cause in its chain
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return EXIT_CONFIG;
        }
        if cause.is::<DomainError>() {
            return EXIT_FAILURE;
        }
    }
    EXIT_FAILURE
}

/// Print an error and exit the process
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    let code = exit_code(&err);
    if json {
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "exit_code": code,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(code);
}
