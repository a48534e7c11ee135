use std::process::ExitCode;

use clap::{arg, command, crate_name, value_parser, Arg, Command};

mod cli;

fn uri_arg() -> Arg {
    arg!(-u --uri <URI>).required(true).help("Drywall server URI, e.g. http://localhost:5000")
}

fn name_arg() -> Arg {
    arg!(-n --name <NAME>).required(true).help("Resource name")
}

fn write_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(uri_arg())
        .arg(
            arg!(-f --file <FILE>)
                .required(true)
                .help("Path to the file holding the content"),
        )
        .arg(arg!(-n --name <NAME>).help("Resource name, defaults to the file name"))
        .arg(
            arg!(-t --"content-type" <MIME>)
                .help("Declared content type, defaults to application/octet-stream"),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = command!(crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand(Command::new(cli::VERSION_SUBCOMMAND).about(cli::VERSION_DESCRIPTION))
        .subcommand(Command::new(cli::BUGREPORT_SUBCOMMAND).about(cli::BUGREPORT_DESCRIPTION))
        .subcommand(
            Command::new(cli::SERVER_SUBCOMMAND)
                .about(cli::SERVER_DESCRIPTION)
                .arg(arg!(-r --root <DIR>).help("Server root holding the mirror files (DRYWALL_ROOT)"))
                .arg(
                    arg!(-d --database <PATH>)
                        .help("SQLite database path or sqlite:// connection string (DRYWALL_DATABASE)"),
                )
                .arg(arg!(--host <HOST>).help("Address to listen on (DRYWALL_HOST)"))
                .arg(
                    arg!(-p --port <PORT>)
                        .value_parser(value_parser!(u16))
                        .help("Port to listen on (DRYWALL_PORT)"),
                ),
        )
        .subcommand(write_command(cli::CREATE_SUBCOMMAND, cli::CREATE_DESCRIPTION))
        .subcommand(write_command(cli::UPDATE_SUBCOMMAND, cli::UPDATE_DESCRIPTION))
        .subcommand(
            Command::new(cli::GET_SUBCOMMAND)
                .about(cli::GET_DESCRIPTION)
                .arg(uri_arg())
                .arg(name_arg())
                .arg(arg!(--raw "Print the raw content instead of the resource summary")),
        )
        .subcommand(
            Command::new(cli::DELETE_SUBCOMMAND)
                .about(cli::DELETE_DESCRIPTION)
                .arg(uri_arg())
                .arg(name_arg()),
        )
        .subcommand(
            Command::new(cli::LIST_SUBCOMMAND)
                .about(cli::LIST_DESCRIPTION)
                .arg(uri_arg()),
        )
        .subcommand(
            Command::new(cli::REPAIR_SUBCOMMAND)
                .about(cli::REPAIR_DESCRIPTION)
                .arg(uri_arg()),
        )
        .arg_required_else_help(true)
        .disable_version_flag(true)
        .get_matches();

    match cli.subcommand() {
        Some((cli::VERSION_SUBCOMMAND, _)) => {
            cli::version::run();
            ExitCode::SUCCESS
        }
        Some((cli::BUGREPORT_SUBCOMMAND, _)) => {
            cli::bugreport::run();
            ExitCode::SUCCESS
        }
        Some((cli::SERVER_SUBCOMMAND, matches)) => cli::server::run(matches).await,
        Some((cli::CREATE_SUBCOMMAND, matches)) => cli::client::create(matches).await,
        Some((cli::UPDATE_SUBCOMMAND, matches)) => cli::client::update(matches).await,
        Some((cli::GET_SUBCOMMAND, matches)) => cli::client::get(matches).await,
        Some((cli::DELETE_SUBCOMMAND, matches)) => cli::client::delete(matches).await,
        Some((cli::LIST_SUBCOMMAND, matches)) => cli::client::list(matches).await,
        Some((cli::REPAIR_SUBCOMMAND, matches)) => cli::client::repair(matches).await,
        _ => ExitCode::FAILURE,
    }
}
