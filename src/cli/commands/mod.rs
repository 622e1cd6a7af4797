//! CLI command implementations.

pub mod check;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::models::Config;
use crate::infrastructure::config::{ConfigLoader, ConfigOverrides};
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Load configuration and start logging.
///
/// The returned logger must stay alive for the rest of the command.
pub(crate) fn bootstrap(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<(Config, LoggerImpl)> {
    let config = ConfigLoader::load(path, overrides).context("invalid configuration")?;
    let log_config = LogConfig::try_from(&config.logging).map_err(anyhow::Error::msg)?;
    let logger = LoggerImpl::init(&log_config)?;
    Ok((config, logger))
}
