use slog::Drain;
#[macro_use]
extern crate slog;

use std::convert::TryFrom;

pub mod commands;
pub mod helper;
pub enum CLIError {
    IOError(String, std::io::Error),
    Clap(clap::Error),
    SerdeJSON(serde_json::Error),
    OtherMessage(String),
    Other(Box<dyn std::error::Error>),
}

fn main() {
    let app = clap::App::new("Bluetooth Mesh CLI")
        .version(clap::crate_version!())
        .about("Encode and decode Bluetooth Mesh proxy PDUs and derive mesh keys")
        .arg(
            clap::Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .max_values(5)
                .help("Set the amount of logging from level 0 up to level 5"),
        )
        .arg(
            clap::Arg::with_name("network_state")
                .short("s")
                .long("network_state")
                .value_name("FILE")
                .help("Specifies network state .json file"),
        )
        .subcommand(commands::crypto::sub_command())
        .subcommand(commands::pdu::sub_command());
    let matches = app.get_matches();

    let log_level = slog::Level::from_usize(
        1 + usize::try_from(matches.occurrences_of("verbose")).unwrap_or(usize::max_value()),
    )
    .unwrap_or(slog::Level::Trace);
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let root = slog::Logger::root(
        slog_term::FullFormat::new(decorator)
            .build()
            .filter_level(log_level)
            .fuse(),
        slog::o!(),
    );
    trace!(root, "main");
    let sub_cmd = matches.subcommand().0;
    let get_network_state_path = || -> &str {
        match matches.value_of("network_state") {
            Some(path) => path,
            None => clap::Error::with_description(
                "missing 'network_state.json` path",
                clap::ErrorKind::ArgumentNotFound,
            )
            .exit(),
        }
    };
    debug!(root, "arg_match"; "sub_command" => sub_cmd);
    if let Err(e) = (|| -> Result<(), CLIError> {
        match matches.subcommand() {
            ("", None) => error!(root, "no command given"),
            ("crypto", Some(crypto_matches)) => {
                commands::crypto::crypto_matches(&root, crypto_matches)?
            }
            ("pdu", Some(pdu_matches)) => {
                commands::pdu::pdu_matches(&root, get_network_state_path(), pdu_matches)?
            }
            _ => unreachable!("unhandled sub_command"),
        }
        debug!(root, "matches_done");
        Ok(())
    })() {
        match e {
            CLIError::IOError(path, error) => {
                eprintln!("io error {:?} with path '{}'", error, path)
            }
            CLIError::Clap(error) => eprintln!("{}", &error.message),
            CLIError::SerdeJSON(error) => eprintln!("json error {}", error),
            CLIError::OtherMessage(msg) => eprintln!("error: {}", &msg),
            CLIError::Other(e) => eprintln!("error: {}", e),
        };
        std::process::exit(1);
    }
}
