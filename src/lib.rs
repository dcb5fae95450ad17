//! # EClet
//!
//! Command line driver for an ECC secure element (Atmel ATECC108 class) on
//! an I2C bus. Options are validated into fixed-width typed values before
//! anything talks to the device, then exactly one command is dispatched.
//!
//! ## Features
//!
//! - Strict hex validation of keys, signatures, challenges and metadata
//! - Command table with per-command argument requirements
//! - On-device signing and verification, plus offline software verification
//! - Software secure element backend with persistent state
//!
//! ## Example
//!
//! ```no_run
//! use eclet::{cli::{Dispatcher, ParsedArguments}, config::Config, device::EmulatorConnector};
//!
//! let args = ParsedArguments::builder().command("serial-num").build()?;
//! let config = Config::from_args(&args)?;
//! let dispatcher = Dispatcher::new(EmulatorConnector::new(&config.state_dir), &config);
//! let serial = dispatcher.dispatch(&args, &mut std::io::empty())?;
//! println!("{serial}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod crypto;
pub mod device;
pub mod error;
pub mod types;
pub mod validate;

use anyhow::Result;
use config::Verbosity;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the requested verbosity
pub fn setup_logging(verbosity: Verbosity) -> Result<()> {
    let filter = EnvFilter::new(verbosity.filter());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
