use clap::error::ErrorKind;
use eclet::{
    cli::{self, Dispatcher, ParsedArguments},
    config::Config,
    device::EmulatorConnector,
    error::ExitStatus,
    setup_logging,
};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Parse command line arguments
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
                _ => ExitStatus::Usage,
            }
            .into();
        }
    };

    let parsed = match ParsedArguments::try_from(args).and_then(|args| {
        let config = Config::from_args(&args)?;
        Ok((args, config))
    }) {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = cli::report(&mut io::stderr().lock(), &e);
            return e.exit_status().into();
        }
    };
    let (args, config) = parsed;

    if let Err(e) = setup_logging(config.verbosity) {
        eprintln!("{e:#}");
    }

    let dispatcher = Dispatcher::new(EmulatorConnector::new(&config.state_dir), &config);
    dispatcher
        .run(
            &args,
            &mut io::stdin().lock(),
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
        )
        .into()
}
