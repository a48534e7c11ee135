use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgMatches;
use server::config::{self, Config};

pub async fn run(matches: &ArgMatches) -> ExitCode {
    println!("drywall starting up...");

    let config = match Config::from_env() {
        Ok(c) => apply_overrides(c, matches),
        Err(e) => {
            println!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Command line values win over the environment.
fn apply_overrides(mut config: Config, matches: &ArgMatches) -> Config {
    if let Some(root) = matches.get_one::<String>("root") {
        config.root = PathBuf::from(root);
    }
    if let Some(database) = matches.get_one::<String>("database") {
        config.database = config::database_path(database);
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.host.clone_from(host);
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    config
}
