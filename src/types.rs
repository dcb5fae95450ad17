//! Validated value types shared by the command line, dispatcher and device layers

use crate::validate::{ArgumentError, decode_fixed};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag byte of an uncompressed elliptic-curve point
pub const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Number of key slots on the device
pub const KEY_SLOT_COUNT: u8 = 16;

/// Defines a newtype over a fixed-size byte array that parses from exact-length hex.
macro_rules! fixed_hex_value {
    ($(#[$meta:meta])* $name:ident, $len:literal, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes
            pub const LEN: usize = $len;

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ArgumentError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                decode_fixed::<{ $len }>(value, $what).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

fixed_hex_value!(
    /// 32 bytes to write into a slot
    WriteData, 32, "Data"
);
fixed_hex_value!(
    /// 32 byte MAC challenge
    Challenge, 32, "Challenge"
);
fixed_hex_value!(
    /// 32 byte MAC challenge response
    ChallengeResponse, 32, "Challenge Response"
);
fixed_hex_value!(
    /// 13 bytes of MAC meta data
    MetaData, 13, "Meta Data"
);
fixed_hex_value!(
    /// ECDSA P-256 signature, `R || S`
    Signature, 64, "P256 Signature"
);
fixed_hex_value!(
    /// SHA-256 digest of the message being signed or verified
    Digest, 32, "Digest"
);

impl Signature {
    /// Wrap raw `R || S` bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

impl Digest {
    /// Wrap a raw 32 byte digest
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Uncompressed P-256 public key: `04 || X || Y`
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; 65]);

impl PublicKey {
    /// Length in bytes
    pub const LEN: usize = 65;

    /// Wrap raw bytes, rejecting anything without the uncompressed tag
    pub fn from_bytes(bytes: [u8; 65]) -> Result<Self, ArgumentError> {
        if bytes[0] != UNCOMPRESSED_POINT_TAG {
            return Err(ArgumentError::MissingUncompressedTag);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// The X coordinate
    pub fn x(&self) -> &[u8] {
        &self.0[1..33]
    }

    /// The Y coordinate
    pub fn y(&self) -> &[u8] {
        &self.0[33..]
    }
}

impl FromStr for PublicKey {
    type Err = ArgumentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(decode_fixed::<65>(value, "P256 Public Key")?)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

/// One of the device's 16 key storage slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct KeySlot(u8);

impl KeySlot {
    /// Slot used when none is given on the command line
    pub const DEFAULT: KeySlot = KeySlot(0);

    pub fn new(slot: u8) -> Result<Self, ArgumentError> {
        if slot >= KEY_SLOT_COUNT {
            return Err(ArgumentError::KeySlotOutOfRange(i64::from(slot)));
        }
        Ok(Self(slot))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Every slot, in order
    pub fn all() -> impl Iterator<Item = KeySlot> {
        (0..KEY_SLOT_COUNT).map(KeySlot)
    }
}

impl Default for KeySlot {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for KeySlot {
    type Err = ArgumentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let slot: i64 = value
            .parse()
            .map_err(|_| ArgumentError::InvalidKeySlot(value.to_string()))?;
        if !(0..i64::from(KEY_SLOT_COUNT)).contains(&slot) {
            return Err(ArgumentError::KeySlotOutOfRange(slot));
        }
        Ok(Self(slot as u8))
    }
}

impl TryFrom<u8> for KeySlot {
    type Error = ArgumentError;

    fn try_from(slot: u8) -> Result<Self, Self::Error> {
        Self::new(slot)
    }
}

impl From<KeySlot> for u8 {
    fn from(slot: KeySlot) -> Self {
        slot.0
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bus address of the device, given in hex on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cAddress(u8);

impl I2cAddress {
    /// Factory address of the ATECC108
    pub const DEFAULT: I2cAddress = I2cAddress(0x60);

    pub fn new(address: u8) -> Self {
        Self(address)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for I2cAddress {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for I2cAddress {
    type Err = ArgumentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        if digits.is_empty()
            || digits.len() > 2
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(ArgumentError::InvalidAddress(value.to_string()));
        }
        u8::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ArgumentError::InvalidAddress(value.to_string()))
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Lock state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Nothing locked; random numbers are a fixed test pattern
    Factory,
    /// Configuration locked, keys may be written
    Initialized,
    /// Keys loaded and memory locked
    Personalized,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Factory => "Factory",
            DeviceState::Initialized => "Initialized",
            DeviceState::Personalized => "Personalized",
        };
        f.write_str(name)
    }
}
