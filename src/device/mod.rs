//! Secure element sessions
//!
//! The dispatcher talks to the device only through [`SecureElement`];
//! how a session reaches the chip is the [`Connector`]'s business.

pub mod emulator;

pub use emulator::{EmulatorConnector, SoftElement};

use crate::types::{DeviceState, Digest, KeySlot, PublicKey, Signature};
use thiserror::Error;

/// Errors reported by a device session
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No device could be reached on the bus
    #[error("cannot open device on {bus} at address 0x{address:02x}")]
    Open {
        bus: String,
        address: u8,
        #[source]
        source: std::io::Error,
    },

    /// The device refused to run a command in its current state
    #[error("{operation} failed: {reason}")]
    Execution {
        operation: &'static str,
        reason: String,
    },

    /// The slot holds no private key
    #[error("key slot {0} holds no private key")]
    EmptySlot(KeySlot),

    /// The device answered with something unusable
    #[error("unexpected response: {0}")]
    Response(String),

    /// Transport level failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Create a new execution error
    pub fn execution(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Execution {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for device operations
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// An open session with an ECC secure element
pub trait SecureElement {
    /// 32 random bytes, optionally refreshing the device's seed first
    fn read_random(&mut self, update_seed: bool) -> DeviceResult<[u8; 32]>;

    /// Device serial number
    fn read_serial(&mut self) -> DeviceResult<Vec<u8>>;

    /// Whole configuration zone
    fn read_config_zone(&mut self) -> DeviceResult<Vec<u8>>;

    /// Whole OTP zone
    fn read_otp_zone(&mut self) -> DeviceResult<Vec<u8>>;

    fn read_state(&mut self) -> DeviceResult<DeviceState>;

    /// Generate a new P-256 private key in `slot` and return its public key
    fn generate_key(&mut self, slot: KeySlot) -> DeviceResult<PublicKey>;

    fn get_public_key(&mut self, slot: KeySlot) -> DeviceResult<PublicKey>;

    /// Sign a pre-computed digest with the key in `slot`
    fn sign(&mut self, slot: KeySlot, digest: &Digest) -> DeviceResult<Signature>;

    /// Check `signature` over `digest` against an external public key.
    ///
    /// A signature that does not match is `Ok(false)`, not an error.
    fn verify(
        &mut self,
        pub_key: &PublicKey,
        digest: &Digest,
        signature: &Signature,
    ) -> DeviceResult<bool>;

    /// Run the one-time provisioning sequence
    fn personalize(&mut self) -> DeviceResult<()>;
}

/// Opens sessions with a device identified by bus and address
pub trait Connector {
    fn open(&self, bus: &str, address: u8) -> DeviceResult<Box<dyn SecureElement>>;
}
