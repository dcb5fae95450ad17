//! Command table and dispatch
//!
//! Each command carries its own preparation step. Preparation checks the
//! arguments the command needs and gathers its input; only once it succeeds
//! is a device session opened.

use crate::{
    cli::ParsedArguments,
    config::{Config, Verbosity},
    crypto,
    device::{Connector, SecureElement},
    error::{EcletError, ExitStatus, Result},
    types::{DeviceState, Digest, KeySlot, PublicKey, Signature},
};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use tracing::{debug, error, info, instrument};

/// Work to run against an open device session
pub type DeviceStep = Box<dyn FnOnce(&mut dyn SecureElement) -> Result<Output>>;

/// Work that never touches the device
pub type OfflineStep = Box<dyn FnOnce() -> Result<Output>>;

/// A prepared command, ready to execute
pub enum Plan {
    Device(DeviceStep),
    Offline(OfflineStep),
}

/// Checks a command's arguments, gathers its input and returns the work to run
type Prepare = fn(&ParsedArguments, &mut dyn Read) -> Result<Plan>;

/// Entry in the command table
pub struct CommandSpec {
    /// Name typed on the command line
    pub name: &'static str,
    /// Description shown in the long help; continuation lines are indented under it
    pub summary: &'static str,
    /// Optional arguments this command reads; anything else is ignored
    pub uses: &'static [&'static str],
    prepare: Prepare,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("uses", &self.uses)
            .finish()
    }
}

/// Every recognized command
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "personalize",
        summary: "You should run this command first upon receiving your EClet.",
        uses: &[],
        prepare: prepare_personalize,
    },
    CommandSpec {
        name: "random",
        summary: "Retrieves 32 bytes of random data from the device.",
        uses: &["update-seed"],
        prepare: prepare_random,
    },
    CommandSpec {
        name: "serial-num",
        summary: "Retrieves the device's serial number.",
        uses: &[],
        prepare: prepare_serial_num,
    },
    CommandSpec {
        name: "get-config",
        summary: "Dumps the configuration zone.",
        uses: &[],
        prepare: prepare_get_config,
    },
    CommandSpec {
        name: "get-otp",
        summary: "Dumps the OTP (one time programmable) zone.",
        uses: &[],
        prepare: prepare_get_otp,
    },
    CommandSpec {
        name: "state",
        summary: "Returns the device's state:
  Factory      -- random produces a fixed 0xFFFF0000 pattern
  Initialized  -- configuration is locked, keys may be written
  Personalized -- keys are loaded, memory is locked",
        uses: &[],
        prepare: prepare_state,
    },
    CommandSpec {
        name: "gen-key",
        summary: "Generates a P256 private key in the slot given with -k and\nreturns the public key (x,y) with the leading 0x04 tag.",
        uses: &["key-slot"],
        prepare: prepare_gen_key,
    },
    CommandSpec {
        name: "get-pub",
        summary: "Returns the public key of the slot given with -k.",
        uses: &["key-slot"],
        prepare: prepare_get_pub,
    },
    CommandSpec {
        name: "sign",
        summary: "ECDSA P-256 signature over the SHA-256 of the input (-f or\nstdin) using the key in the slot given with -k. Returns (R,S).",
        uses: &["key-slot"],
        prepare: prepare_sign,
    },
    CommandSpec {
        name: "verify",
        summary: "Uses the device to verify --signature against --public-key\n(including the 0x04 tag) over the SHA-256 of the input.",
        uses: &["signature", "public-key"],
        prepare: prepare_verify,
    },
    CommandSpec {
        name: "offline-verify-sign",
        summary: "Same as verify but uses a software library, not the device.",
        uses: &["signature", "public-key"],
        prepare: prepare_offline_verify,
    },
];

/// Find a command by its exact name
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Bytes(Vec<u8>),
    PublicKey(PublicKey),
    Signature(Signature),
    State(DeviceState),
    Verification(bool),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
            Output::PublicKey(key) => write!(f, "{key}"),
            Output::Signature(signature) => write!(f, "{signature}"),
            Output::State(state) => write!(f, "{state}"),
            Output::Verification(true) => f.write_str("valid"),
            Output::Verification(false) => f.write_str("invalid"),
        }
    }
}

fn device_step<F>(step: F) -> Result<Plan>
where
    F: FnOnce(&mut dyn SecureElement) -> Result<Output> + 'static,
{
    Ok(Plan::Device(Box::new(step)))
}

fn prepare_personalize(_args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    device_step(|se| {
        se.personalize()?;
        Ok(Output::State(se.read_state()?))
    })
}

fn prepare_random(args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    let update_seed = args.update_seed();
    device_step(move |se| Ok(Output::Bytes(se.read_random(update_seed)?.to_vec())))
}

fn prepare_serial_num(_args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    device_step(|se| Ok(Output::Bytes(se.read_serial()?)))
}

fn prepare_get_config(_args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    device_step(|se| Ok(Output::Bytes(se.read_config_zone()?)))
}

fn prepare_get_otp(_args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    device_step(|se| Ok(Output::Bytes(se.read_otp_zone()?)))
}

fn prepare_state(_args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    device_step(|se| Ok(Output::State(se.read_state()?)))
}

fn prepare_gen_key(args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    let slot = resolve_slot(args);
    device_step(move |se| Ok(Output::PublicKey(se.generate_key(slot)?)))
}

fn prepare_get_pub(args: &ParsedArguments, _stdin: &mut dyn Read) -> Result<Plan> {
    let slot = resolve_slot(args);
    device_step(move |se| Ok(Output::PublicKey(se.get_public_key(slot)?)))
}

fn prepare_sign(args: &ParsedArguments, stdin: &mut dyn Read) -> Result<Plan> {
    let slot = resolve_slot(args);
    let digest = hash_input(args, stdin)?;
    device_step(move |se| Ok(Output::Signature(se.sign(slot, &digest)?)))
}

fn prepare_verify(args: &ParsedArguments, stdin: &mut dyn Read) -> Result<Plan> {
    let (pub_key, signature) = require_verify_arguments(args)?;
    let digest = hash_input(args, stdin)?;
    device_step(move |se| Ok(Output::Verification(se.verify(&pub_key, &digest, &signature)?)))
}

fn prepare_offline_verify(args: &ParsedArguments, stdin: &mut dyn Read) -> Result<Plan> {
    let (pub_key, signature) = require_verify_arguments(args)?;
    let digest = hash_input(args, stdin)?;
    Ok(Plan::Offline(Box::new(move || {
        crypto::verify_signature(&pub_key, &digest, &signature).map(Output::Verification)
    })))
}

/// Explicit slot, or the device's default slot when none was given
fn resolve_slot(args: &ParsedArguments) -> KeySlot {
    args.key_slot().unwrap_or_else(|| {
        debug!("No key slot given, using slot {}", KeySlot::DEFAULT);
        KeySlot::DEFAULT
    })
}

fn require_verify_arguments(args: &ParsedArguments) -> Result<(PublicKey, Signature)> {
    let pub_key = args.pub_key().copied().ok_or_else(|| {
        EcletError::usage(format!("{} requires --public-key", args.command()))
    })?;
    let signature = args.signature().copied().ok_or_else(|| {
        EcletError::usage(format!("{} requires --signature", args.command()))
    })?;
    Ok((pub_key, signature))
}

/// SHA-256 of the input file, or of standard input when no file was given
fn hash_input(args: &ParsedArguments, stdin: &mut dyn Read) -> Result<Digest> {
    let mut message = Vec::new();
    match args.input_file() {
        Some(path) => {
            let mut file = File::open(path).map_err(|e| EcletError::input("open", path, e))?;
            file.read_to_end(&mut message)
                .map_err(|e| EcletError::input("read", path, e))?;
        }
        None => {
            stdin
                .read_to_end(&mut message)
                .map_err(|e| EcletError::input("read", "<stdin>", e))?;
        }
    }

    debug!("Hashing {} bytes of input", message.len());
    Ok(crypto::sha256(&message))
}

/// Write `err` to `stderr`, followed by the usage line for usage errors
pub fn report(stderr: &mut dyn Write, err: &EcletError) -> io::Result<()> {
    writeln!(stderr, "{err}")?;
    if err.exit_status() == ExitStatus::Usage {
        writeln!(stderr, "{}", super::args::usage())?;
    }
    Ok(())
}

/// Maps a command name plus its arguments onto exactly one handler
pub struct Dispatcher<C: Connector> {
    connector: C,
    bus: String,
    address: u8,
    verbosity: Verbosity,
}

impl<C: Connector> Dispatcher<C> {
    pub fn new(connector: C, config: &Config) -> Self {
        Self {
            connector,
            bus: config.bus.clone(),
            address: config.address.value(),
            verbosity: config.verbosity,
        }
    }

    /// Validate and run the command named in `args`
    #[instrument(skip_all, fields(command = args.command()))]
    pub fn dispatch(&self, args: &ParsedArguments, stdin: &mut dyn Read) -> Result<Output> {
        let spec = lookup(args.command()).ok_or_else(|| {
            EcletError::usage(format!("unrecognized command '{}'", args.command()))
        })?;

        for option in args.supplied_options() {
            if !spec.uses.contains(&option) {
                debug!("--{} is ignored by {}", option, spec.name);
            }
        }

        match (spec.prepare)(args, stdin)? {
            Plan::Device(step) => {
                debug!("Opening device on {} at 0x{:02x}", self.bus, self.address);
                let mut session = self.connector.open(&self.bus, self.address)?;
                step(session.as_mut())
            }
            Plan::Offline(step) => step(),
        }
    }

    /// Dispatch, print the result and turn the outcome into an exit status.
    ///
    /// Silent mode hides the result only; errors always reach `stderr`.
    pub fn run(
        &self,
        args: &ParsedArguments,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> ExitStatus {
        let silent = self.verbosity == Verbosity::Silent;

        match self.dispatch(args, stdin) {
            Ok(output) => {
                info!("{} succeeded", args.command());
                if !silent {
                    if let Err(e) = writeln!(stdout, "{output}") {
                        error!("Failed to write result: {}", e);
                    }
                }
                ExitStatus::Success
            }
            Err(err) => {
                let status = err.exit_status();
                debug!("{} failed: {:?}", args.command(), err);
                if let Err(e) = report(stderr, &err) {
                    error!("Failed to write error: {}", e);
                }
                status
            }
        }
    }
}
