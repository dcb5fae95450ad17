//! Configuration management for the driver
//!
//! Resolves device addressing, verbosity and the emulator's state location
//! from the parsed command line and the environment.

use crate::{cli::ParsedArguments, error::EcletError, types::I2cAddress};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use tracing::debug;

/// Environment variable naming the directory that holds device images
pub const STATE_DIR_ENV: &str = "ECLET_STATE_DIR";

/// Bus used when none is given
pub const DEFAULT_BUS: &str = "/dev/i2c-1";

/// How much the driver says
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// No results, no diagnostics
    Silent,
    #[default]
    Normal,
    /// Debug diagnostics on stderr
    Verbose,
}

impl Verbosity {
    /// Silent wins over verbose when both are given
    pub fn from_flags(verbose: bool, silent: bool) -> Self {
        match (verbose, silent) {
            (_, true) => Self::Silent,
            (true, false) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    /// Log filter directive for this level
    pub fn filter(self) -> &'static str {
        match self {
            Self::Silent => "off",
            Self::Normal => "warn",
            Self::Verbose => "debug",
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bus the device sits on
    pub bus: String,
    /// Device address on the bus
    pub address: I2cAddress,
    /// Diagnostic level for this invocation
    pub verbosity: Verbosity,
    /// Directory holding software device images
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: DEFAULT_BUS.to_string(),
            address: I2cAddress::DEFAULT,
            verbosity: Verbosity::Normal,
            state_dir: env::temp_dir().join("eclet"),
        }
    }
}

impl Config {
    /// Create configuration from command line arguments
    pub fn from_args(args: &ParsedArguments) -> Result<Self, EcletError> {
        let mut config = Self {
            verbosity: Verbosity::from_flags(args.verbose(), args.silent()),
            ..Self::default()
        };

        if let Some(bus) = args.bus() {
            config.bus = bus.to_string();
        }
        match args.address() {
            Some(address) => config.address = address,
            None => debug!("No address given, using default {}", config.address),
        }
        if let Some(dir) = env::var_os(STATE_DIR_ENV).filter(|dir| !dir.is_empty()) {
            config.state_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), EcletError> {
        if self.bus.trim().is_empty() {
            return Err(EcletError::usage("Invalid bus: must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = ParsedArguments::builder().command("state").build().unwrap();
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.bus, DEFAULT_BUS);
        assert_eq!(config.address, I2cAddress::DEFAULT);
        assert_eq!(config.verbosity, Verbosity::Normal);
    }

    #[test]
    fn test_explicit_zero_address_is_kept() {
        let args = ParsedArguments::builder()
            .command("state")
            .bus("/dev/i2c-0")
            .address(I2cAddress::new(0))
            .build()
            .unwrap();
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.bus, "/dev/i2c-0");
        assert_eq!(config.address.value(), 0);
    }

    #[test]
    fn test_silent_overrides_verbose() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Silent);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::Verbose.filter(), "debug");
    }

    #[test]
    fn test_empty_bus_rejected() {
        let args = ParsedArguments::builder()
            .command("state")
            .bus("  ")
            .build()
            .unwrap();
        assert!(matches!(
            Config::from_args(&args),
            Err(EcletError::Usage { .. })
        ));
    }
}
