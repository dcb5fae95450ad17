//! Command-line argument parsing and validation

use crate::cli::COMMANDS;
use crate::error::{EcletError, Result};
use crate::types::{
    Challenge, ChallengeResponse, I2cAddress, KeySlot, MetaData, PublicKey, Signature, WriteData,
};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::path::{Path, PathBuf};

const ABOUT_HEADER: &str = "\
EClet is a program to interface to the Cryptotronix EClet which contains
an Atmel ATECC108.

Currently implemented commands:
";

/// Width of the command-name column in the long help
const NAME_COLUMN: usize = 21;

/// Command line driver for the EClet secure element
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(name = "eclet")]
pub struct Args {
    /// Produce verbose output
    #[arg(short, long, help_heading = "Global Options")]
    pub verbose: bool,

    /// Don't print results or logs; errors are still reported
    #[arg(
        short = 'q',
        long = "quiet",
        visible_short_alias = 's',
        visible_alias = "silent",
        help_heading = "Global Options"
    )]
    pub quiet: bool,

    /// I2C bus: defaults to /dev/i2c-1
    #[arg(short, long, value_name = "BUS", help_heading = "Global Options")]
    pub bus: Option<String>,

    /// I2C address for the device (in hex)
    #[arg(short, long, value_name = "ADDRESS", help_heading = "Global Options")]
    pub address: Option<I2cAddress>,

    /// Read from FILE vs. stdin
    #[arg(short, long, value_name = "FILE", help_heading = "Global Options")]
    pub file: Option<PathBuf>,

    /// The signature to be verified (128 hex characters)
    #[arg(long, value_name = "SIGNATURE", help_heading = "Sign and Verify Operations")]
    pub signature: Option<Signature>,

    /// The public key that produced the signature (130 hex characters, starting with 04)
    #[arg(
        long = "public-key",
        value_name = "PUBLIC_KEY",
        help_heading = "Sign and Verify Operations"
    )]
    pub public_key: Option<PublicKey>,

    /// Updates the random seed. Only applicable to certain commands
    #[arg(long = "update-seed", help_heading = "Random Command Options")]
    pub update_seed: bool,

    /// The internal key slot to use (0-15)
    #[arg(
        short = 'k',
        long = "key-slot",
        value_name = "SLOT",
        allow_negative_numbers = true,
        help_heading = "Key related command options"
    )]
    pub key_slot: Option<KeySlot>,

    /// The 32 byte data to write to a slot (64 hex characters)
    #[arg(
        short = 'w',
        long = "write",
        value_name = "WRITE",
        help_heading = "Key related command options"
    )]
    pub write: Option<WriteData>,

    /// The 32 byte challenge (64 hex characters)
    #[arg(
        short = 'c',
        long,
        value_name = "CHALLENGE",
        help_heading = "Check and Offline-Verify Mac Options"
    )]
    pub challenge: Option<Challenge>,

    /// The 32 byte challenge response (64 hex characters)
    #[arg(
        short = 'r',
        long = "challenge-response",
        value_name = "CHALLENGE_RESPONSE",
        help_heading = "Check and Offline-Verify Mac Options"
    )]
    pub challenge_response: Option<ChallengeResponse>,

    /// The 13 byte meta data associated with the mac (26 hex characters)
    #[arg(
        short = 'm',
        long = "meta-data",
        value_name = "META",
        help_heading = "Check and Offline-Verify Mac Options"
    )]
    pub meta_data: Option<MetaData>,

    /// Command to run
    #[arg(value_name = "COMMAND")]
    pub command: String,
}

/// Long help text listing every command in the command table
fn long_about() -> String {
    let mut text = String::from(ABOUT_HEADER);
    for spec in COMMANDS {
        let mut lines = spec.summary.lines();
        let first = lines.next().unwrap_or_default();
        text.push_str(&format!("\n{:<NAME_COLUMN$}{first}", spec.name));
        for line in lines {
            text.push_str(&format!("\n{:NAME_COLUMN$}{line}", ""));
        }
    }
    text
}

/// The clap command, with the long help built from the command table
pub fn command() -> clap::Command {
    Args::command().long_about(long_about())
}

/// Parse command line arguments
pub fn parse_args() -> std::result::Result<Args, clap::Error> {
    let matches = command().try_get_matches()?;
    Args::from_arg_matches(&matches)
}

/// Usage line printed alongside usage errors
pub fn usage() -> String {
    command().render_usage().to_string()
}

/// Fully validated arguments for one invocation.
///
/// Built once through [`ParsedArgumentsBuilder`] and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ParsedArguments {
    command: String,
    bus: Option<String>,
    address: Option<I2cAddress>,
    verbose: bool,
    silent: bool,
    input_file: Option<PathBuf>,
    key_slot: Option<KeySlot>,
    update_seed: bool,
    write_data: Option<WriteData>,
    challenge: Option<Challenge>,
    challenge_response: Option<ChallengeResponse>,
    meta: Option<MetaData>,
    signature: Option<Signature>,
    pub_key: Option<PublicKey>,
}

impl ParsedArguments {
    pub fn builder() -> ParsedArgumentsBuilder {
        ParsedArgumentsBuilder::default()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn bus(&self) -> Option<&str> {
        self.bus.as_deref()
    }

    pub fn address(&self) -> Option<I2cAddress> {
        self.address
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    pub fn key_slot(&self) -> Option<KeySlot> {
        self.key_slot
    }

    pub fn update_seed(&self) -> bool {
        self.update_seed
    }

    pub fn write_data(&self) -> Option<&WriteData> {
        self.write_data.as_ref()
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn challenge_response(&self) -> Option<&ChallengeResponse> {
        self.challenge_response.as_ref()
    }

    pub fn meta(&self) -> Option<&MetaData> {
        self.meta.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn pub_key(&self) -> Option<&PublicKey> {
        self.pub_key.as_ref()
    }

    /// Long names of the optional, command-specific arguments that were given
    pub fn supplied_options(&self) -> Vec<&'static str> {
        [
            ("key-slot", self.key_slot.is_some()),
            ("update-seed", self.update_seed),
            ("write", self.write_data.is_some()),
            ("challenge", self.challenge.is_some()),
            ("challenge-response", self.challenge_response.is_some()),
            ("meta-data", self.meta.is_some()),
            ("signature", self.signature.is_some()),
            ("public-key", self.pub_key.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

impl TryFrom<Args> for ParsedArguments {
    type Error = EcletError;

    fn try_from(args: Args) -> Result<Self> {
        let mut builder = ParsedArguments::builder()
            .command(args.command)
            .verbose(args.verbose)
            .silent(args.quiet)
            .update_seed(args.update_seed);

        if let Some(bus) = args.bus {
            builder = builder.bus(bus);
        }
        if let Some(address) = args.address {
            builder = builder.address(address);
        }
        if let Some(file) = args.file {
            builder = builder.input_file(file);
        }
        if let Some(slot) = args.key_slot {
            builder = builder.key_slot(slot);
        }
        if let Some(data) = args.write {
            builder = builder.write_data(data);
        }
        if let Some(challenge) = args.challenge {
            builder = builder.challenge(challenge);
        }
        if let Some(response) = args.challenge_response {
            builder = builder.challenge_response(response);
        }
        if let Some(meta) = args.meta_data {
            builder = builder.meta(meta);
        }
        if let Some(signature) = args.signature {
            builder = builder.signature(signature);
        }
        if let Some(pub_key) = args.public_key {
            builder = builder.pub_key(pub_key);
        }

        builder.build()
    }
}

/// Accumulates arguments while the command line is read
#[derive(Debug, Clone, Default)]
pub struct ParsedArgumentsBuilder {
    command: Option<String>,
    bus: Option<String>,
    address: Option<I2cAddress>,
    verbose: bool,
    silent: bool,
    input_file: Option<PathBuf>,
    key_slot: Option<KeySlot>,
    update_seed: bool,
    write_data: Option<WriteData>,
    challenge: Option<Challenge>,
    challenge_response: Option<ChallengeResponse>,
    meta: Option<MetaData>,
    signature: Option<Signature>,
    pub_key: Option<PublicKey>,
}

impl ParsedArgumentsBuilder {
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn bus(mut self, bus: impl Into<String>) -> Self {
        self.bus = Some(bus.into());
        self
    }

    pub fn address(mut self, address: I2cAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = Some(path.into());
        self
    }

    pub fn key_slot(mut self, slot: KeySlot) -> Self {
        self.key_slot = Some(slot);
        self
    }

    pub fn update_seed(mut self, update_seed: bool) -> Self {
        self.update_seed = update_seed;
        self
    }

    pub fn write_data(mut self, data: WriteData) -> Self {
        self.write_data = Some(data);
        self
    }

    pub fn challenge(mut self, challenge: Challenge) -> Self {
        self.challenge = Some(challenge);
        self
    }

    pub fn challenge_response(mut self, response: ChallengeResponse) -> Self {
        self.challenge_response = Some(response);
        self
    }

    pub fn meta(mut self, meta: MetaData) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn pub_key(mut self, pub_key: PublicKey) -> Self {
        self.pub_key = Some(pub_key);
        self
    }

    /// Freeze the accumulated arguments
    pub fn build(self) -> Result<ParsedArguments> {
        let command = self
            .command
            .filter(|command| !command.is_empty())
            .ok_or_else(|| EcletError::usage("a command is required"))?;

        Ok(ParsedArguments {
            command,
            bus: self.bus,
            address: self.address,
            verbose: self.verbose,
            silent: self.silent,
            input_file: self.input_file,
            key_slot: self.key_slot,
            update_seed: self.update_seed,
            write_data: self.write_data,
            challenge: self.challenge,
            challenge_response: self.challenge_response,
            meta: self.meta,
            signature: self.signature,
            pub_key: self.pub_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(argv: &[&str]) -> std::result::Result<ParsedArguments, clap::Error> {
        let args = Args::try_parse_from(argv)?;
        Ok(ParsedArguments::try_from(args).unwrap())
    }

    #[test]
    fn test_parse_basic_args() {
        let args = parse(&["eclet", "serial-num"]).unwrap();
        assert_eq!(args.command(), "serial-num");
        assert!(!args.verbose());
        assert!(!args.silent());
        assert!(args.bus().is_none());
        assert!(args.address().is_none());
        assert!(args.supplied_options().is_empty());
    }

    #[test]
    fn test_parse_global_options() {
        let args = parse(&[
            "eclet", "-v", "-b", "/dev/i2c-2", "-a", "0x64", "-f", "msg.txt", "sign",
        ])
        .unwrap();
        assert!(args.verbose());
        assert_eq!(args.bus(), Some("/dev/i2c-2"));
        assert_eq!(args.address(), Some(I2cAddress::new(0x64)));
        assert_eq!(args.input_file(), Some(Path::new("msg.txt")));
    }

    #[test]
    fn test_quiet_aliases() {
        for flag in ["-q", "-s", "--quiet", "--silent"] {
            let args = parse(&["eclet", flag, "state"]).unwrap();
            assert!(args.silent(), "{flag} should set silent");
        }
    }

    #[test]
    fn test_key_slot_bounds() {
        let args = parse(&["eclet", "-k", "0", "get-pub"]).unwrap();
        assert_eq!(args.key_slot(), Some(KeySlot::DEFAULT));
        let args = parse(&["eclet", "-k", "15", "get-pub"]).unwrap();
        assert_eq!(args.key_slot().map(KeySlot::index), Some(15));

        for slot in ["-1", "16", "x"] {
            let err = parse(&["eclet", "-k", slot, "get-pub"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "slot {slot}");
        }
    }

    #[test]
    fn test_hex_options_validated_at_parse_time() {
        let signature = "ab".repeat(64);
        let public_key = format!("04{}", "cd".repeat(64));
        let args = parse(&[
            "eclet",
            "--signature",
            signature.as_str(),
            "--public-key",
            public_key.as_str(),
            "verify",
        ])
        .unwrap();
        assert_eq!(args.signature().unwrap().to_string(), signature);
        assert_eq!(args.pub_key().unwrap().to_string(), public_key);
        assert_eq!(args.supplied_options(), vec!["signature", "public-key"]);

        let short = &signature[..127];
        let err = parse(&["eclet", "--signature", short, "verify"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("--signature"));

        let wrong_tag = format!("05{}", "cd".repeat(64));
        let err = parse(&["eclet", "--public-key", wrong_tag.as_str(), "verify"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_mac_options() {
        let thirty_two = "11".repeat(32);
        let meta = "22".repeat(13);
        let args = parse(&[
            "eclet",
            "-c",
            thirty_two.as_str(),
            "-r",
            thirty_two.as_str(),
            "-m",
            meta.as_str(),
            "-w",
            thirty_two.as_str(),
            "state",
        ])
        .unwrap();
        assert!(args.challenge().is_some());
        assert!(args.challenge_response().is_some());
        assert!(args.meta().is_some());
        assert!(args.write_data().is_some());

        assert!(parse(&["eclet", "-m", thirty_two.as_str(), "state"]).is_err());
        assert!(parse(&["eclet", "-c", meta.as_str(), "state"]).is_err());
    }

    #[test]
    fn test_exactly_one_command() {
        let err = parse(&["eclet"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = parse(&["eclet", "random", "state"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let err = parse(&["eclet", "-a", "zz", "state"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let args = parse(&["eclet", "-a", "0", "state"]).unwrap();
        assert_eq!(args.address(), Some(I2cAddress::new(0)));
    }

    #[test]
    fn test_builder_requires_command() {
        let err = ParsedArguments::builder().build().unwrap_err();
        assert!(matches!(err, EcletError::Usage { .. }));

        let args = ParsedArguments::builder()
            .command("random")
            .update_seed(true)
            .build()
            .unwrap();
        assert!(args.update_seed());
        assert_eq!(args.supplied_options(), vec!["update-seed"]);
    }

    #[test]
    fn test_long_help_lists_command_table() {
        command().debug_assert();
        let help = command().render_long_help().to_string();

        for spec in COMMANDS {
            assert!(help.contains(spec.name), "{} missing from help", spec.name);
            for line in spec.summary.lines() {
                assert!(help.contains(line.trim()), "{line:?} missing from help");
            }
        }
        assert!(help.contains("gen-key              Generates a P256 private key"));
    }
}
