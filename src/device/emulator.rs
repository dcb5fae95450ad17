//! Software secure element
//!
//! Behaves like an ATECC108 from the driver's point of view: lock states,
//! sixteen key slots, a configuration zone and an OTP zone. Its image is
//! kept as JSON in a state directory so successive invocations see the same
//! device.

use super::{Connector, DeviceError, DeviceResult, SecureElement};
use crate::crypto;
use crate::types::{DeviceState, Digest, KeySlot, PublicKey, Signature};
use chrono::{DateTime, Utc};
use p256::ecdsa::SigningKey;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

const SERIAL_LEN: usize = 9;
const CONFIG_ZONE_LEN: usize = 128;
const OTP_ZONE_LEN: usize = 64;

/// Revision bytes reported in the configuration zone
const REVISION: [u8; 4] = [0x00, 0x00, 0x10, 0x00];
const I2C_ENABLE_OFFSET: usize = 14;
const I2C_ADDRESS_OFFSET: usize = 16;
const LOCK_VALUE_OFFSET: usize = 86;
const LOCK_CONFIG_OFFSET: usize = 87;
const UNLOCKED: u8 = 0x55;
const LOCKED: u8 = 0x00;

/// What an unlocked chip hands out instead of random data
const FACTORY_RANDOM_PATTERN: [u8; 4] = [0xFF, 0xFF, 0x00, 0x00];

/// Opens software secure elements stored under a state directory
#[derive(Debug, Clone)]
pub struct EmulatorConnector {
    state_dir: PathBuf,
}

impl EmulatorConnector {
    pub fn new<P: Into<PathBuf>>(state_dir: P) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// File holding the image of the device at `bus`/`address`.
    ///
    /// Bytes of the bus name other than ASCII alphanumerics and `-` are written
    /// as `_` plus two hex digits, so distinct buses never share a file.
    pub fn image_path(&self, bus: &str, address: u8) -> PathBuf {
        let mut name = String::with_capacity(bus.len() + 8);
        for byte in bus.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push('_');
                name.push_str(&hex::encode([byte]));
            }
        }
        self.state_dir.join(format!("{name}-{address:02x}.json"))
    }
}

impl Connector for EmulatorConnector {
    fn open(&self, bus: &str, address: u8) -> DeviceResult<Box<dyn SecureElement>> {
        let path = self.image_path(bus, address);
        let element = SoftElement::open(&path, address).map_err(|e| match e {
            DeviceError::Io(source) => DeviceError::Open {
                bus: bus.to_string(),
                address,
                source,
            },
            other => other,
        })?;
        Ok(Box::new(element))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotRecord {
    slot: KeySlot,
    #[serde(with = "hex")]
    private_key: Vec<u8>,
}

/// Persisted device image
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ElementImage {
    #[serde(with = "hex")]
    serial: Vec<u8>,
    state: DeviceState,
    #[serde(with = "hex")]
    otp: Vec<u8>,
    slots: Vec<SlotRecord>,
    seed_updates: u64,
    personalized_at: Option<DateTime<Utc>>,
}

impl ElementImage {
    /// Reject images whose zones do not have the chip's fixed sizes
    fn check(&self) -> Result<(), String> {
        if self.serial.len() != SERIAL_LEN {
            return Err(format!(
                "serial number is {} bytes, expected {SERIAL_LEN}",
                self.serial.len()
            ));
        }
        if self.otp.len() != OTP_ZONE_LEN {
            return Err(format!(
                "OTP zone is {} bytes, expected {OTP_ZONE_LEN}",
                self.otp.len()
            ));
        }
        Ok(())
    }

    fn factory() -> Self {
        let mut serial = vec![0u8; SERIAL_LEN];
        serial[0] = 0x01;
        serial[1] = 0x23;
        OsRng.fill_bytes(&mut serial[2..SERIAL_LEN - 1]);
        serial[SERIAL_LEN - 1] = 0xEE;

        Self {
            serial,
            state: DeviceState::Factory,
            otp: vec![0u8; OTP_ZONE_LEN],
            slots: Vec::new(),
            seed_updates: 0,
            personalized_at: None,
        }
    }
}

/// A secure element emulated in software
#[derive(Debug)]
pub struct SoftElement {
    path: PathBuf,
    address: u8,
    image: ElementImage,
}

impl SoftElement {
    /// Load the image at `path`, creating a factory-fresh device if there is none
    #[instrument]
    pub fn open(path: &Path, address: u8) -> DeviceResult<Self> {
        let corrupt = |reason: String| {
            DeviceError::Response(format!("corrupt device image {}: {reason}", path.display()))
        };

        let image = match fs::read(path) {
            Ok(bytes) => {
                let image: ElementImage =
                    serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
                image.check().map_err(corrupt)?;
                image
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No device image at {}, starting from factory state", path.display());
                ElementImage::factory()
            }
            Err(e) => return Err(e.into()),
        };

        let element = Self {
            path: path.to_path_buf(),
            address,
            image,
        };
        element.save()?;
        Ok(element)
    }

    /// Write the image back, replacing the previous one in a single rename
    fn save(&self) -> DeviceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_vec_pretty(&self.image)
            .map_err(|e| DeviceError::Response(format!("cannot encode device image: {e}")))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, contents)?;
        fs::rename(&staging, &self.path)?;

        debug!("Saved device image to {}", self.path.display());
        Ok(())
    }

    fn config_locked(&self) -> bool {
        self.image.state != DeviceState::Factory
    }

    fn data_locked(&self) -> bool {
        self.image.state == DeviceState::Personalized
    }

    fn signing_key(&self, slot: KeySlot) -> DeviceResult<SigningKey> {
        let record = self
            .image
            .slots
            .iter()
            .find(|record| record.slot == slot)
            .ok_or(DeviceError::EmptySlot(slot))?;

        SigningKey::from_slice(&record.private_key)
            .map_err(|_| DeviceError::Response(format!("key in slot {slot} is unreadable")))
    }

    fn store_key(&mut self, slot: KeySlot, key: &SigningKey) {
        let private_key = key.to_bytes().to_vec();
        match self.image.slots.iter_mut().find(|record| record.slot == slot) {
            Some(record) => record.private_key = private_key,
            None => {
                self.image.slots.push(SlotRecord { slot, private_key });
                self.image.slots.sort_by_key(|record| record.slot);
            }
        }
    }

    fn public_key(key: &SigningKey) -> DeviceResult<PublicKey> {
        crypto::public_key_of(key).map_err(|e| DeviceError::Response(e.to_string()))
    }
}

impl SecureElement for SoftElement {
    #[instrument(skip(self))]
    fn read_random(&mut self, update_seed: bool) -> DeviceResult<[u8; 32]> {
        if update_seed {
            self.image.seed_updates += 1;
            self.save()?;
            debug!("Seed updated ({} updates so far)", self.image.seed_updates);
        }

        let mut random = [0u8; 32];
        if self.config_locked() {
            OsRng.fill_bytes(&mut random);
        } else {
            for chunk in random.chunks_mut(FACTORY_RANDOM_PATTERN.len()) {
                chunk.copy_from_slice(&FACTORY_RANDOM_PATTERN);
            }
        }
        Ok(random)
    }

    fn read_serial(&mut self) -> DeviceResult<Vec<u8>> {
        Ok(self.image.serial.clone())
    }

    fn read_config_zone(&mut self) -> DeviceResult<Vec<u8>> {
        let serial = &self.image.serial;
        let mut zone = vec![0u8; CONFIG_ZONE_LEN];
        zone[..4].copy_from_slice(&serial[..4]);
        zone[4..8].copy_from_slice(&REVISION);
        zone[8..13].copy_from_slice(&serial[4..]);
        zone[I2C_ENABLE_OFFSET] = 0x01;
        zone[I2C_ADDRESS_OFFSET] = self.address << 1;
        zone[LOCK_VALUE_OFFSET] = if self.data_locked() { LOCKED } else { UNLOCKED };
        zone[LOCK_CONFIG_OFFSET] = if self.config_locked() { LOCKED } else { UNLOCKED };
        Ok(zone)
    }

    fn read_otp_zone(&mut self) -> DeviceResult<Vec<u8>> {
        Ok(self.image.otp.clone())
    }

    fn read_state(&mut self) -> DeviceResult<DeviceState> {
        Ok(self.image.state)
    }

    #[instrument(skip(self))]
    fn generate_key(&mut self, slot: KeySlot) -> DeviceResult<PublicKey> {
        if !self.config_locked() {
            return Err(DeviceError::execution(
                "gen-key",
                "configuration zone is not locked, run personalize first",
            ));
        }

        let key = crypto::generate_signing_key();
        self.store_key(slot, &key);
        self.save()?;
        info!("Generated a new P-256 key in slot {}", slot);
        Self::public_key(&key)
    }

    fn get_public_key(&mut self, slot: KeySlot) -> DeviceResult<PublicKey> {
        Self::public_key(&self.signing_key(slot)?)
    }

    #[instrument(skip(self, digest))]
    fn sign(&mut self, slot: KeySlot, digest: &Digest) -> DeviceResult<Signature> {
        let key = self.signing_key(slot)?;
        crypto::sign_digest(&key, digest).map_err(|e| DeviceError::execution("sign", e.to_string()))
    }

    #[instrument(skip_all)]
    fn verify(
        &mut self,
        pub_key: &PublicKey,
        digest: &Digest,
        signature: &Signature,
    ) -> DeviceResult<bool> {
        crypto::verify_signature(pub_key, digest, signature)
            .map_err(|e| DeviceError::execution("verify", e.to_string()))
    }

    #[instrument(skip(self))]
    fn personalize(&mut self) -> DeviceResult<()> {
        if self.data_locked() {
            info!("Device is already personalized");
            return Ok(());
        }

        if !self.config_locked() {
            self.image.state = DeviceState::Initialized;
            info!("Configuration zone locked");
        }

        for slot in KeySlot::all() {
            let key = crypto::generate_signing_key();
            self.store_key(slot, &key);
        }
        debug!("Loaded keys into {} slots", self.image.slots.len());

        self.image.state = DeviceState::Personalized;
        self.image.personalized_at = Some(Utc::now());
        self.save()?;
        info!("Data zone locked, device personalized");
        Ok(())
    }
}
