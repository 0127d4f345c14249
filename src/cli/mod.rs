pub mod config;

use clap::{Arg, ArgMatches, Command};

fn command() -> Command {
    Command::new("modsim")
        .about("Modbus TCP and RTU-over-TCP slave simulator")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON file describing connections, slaves and registers")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .short('b')
                .help("Interface to bind listeners to (overrides bind_host in the config)")
                .value_name("HOST"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write logs to this file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Print the validated, normalized configuration as JSON and exit")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    command().get_matches()
}
