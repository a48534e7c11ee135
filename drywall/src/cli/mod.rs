use clap::ArgMatches;

pub mod bugreport;
pub mod client;
pub mod server;
pub mod version;

pub const SERVER_SUBCOMMAND: &str = "server";
pub const SERVER_DESCRIPTION: &str = "Run the Euphony resource server";

pub const VERSION_SUBCOMMAND: &str = "version";
pub const VERSION_DESCRIPTION: &str = "Display the version and build information";

pub const BUGREPORT_SUBCOMMAND: &str = "bugreport";
pub const BUGREPORT_DESCRIPTION: &str = "Collect information about the system and the environment for bug reports";

pub const CREATE_SUBCOMMAND: &str = "create";
pub const CREATE_DESCRIPTION: &str = "Create a resource from a file";

pub const UPDATE_SUBCOMMAND: &str = "update";
pub const UPDATE_DESCRIPTION: &str = "Replace the content of an existing resource with a file";

pub const GET_SUBCOMMAND: &str = "get";
pub const GET_DESCRIPTION: &str = "Show a resource or print its raw content";

pub const DELETE_SUBCOMMAND: &str = "delete";
pub const DELETE_DESCRIPTION: &str = "Delete a resource";

pub const LIST_SUBCOMMAND: &str = "list";
pub const LIST_DESCRIPTION: &str = "List all resources";

pub const REPAIR_SUBCOMMAND: &str = "repair";
pub const REPAIR_DESCRIPTION: &str = "Rewrite mirror files that are missing or out of date";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Value of a string argument, empty when absent.
pub fn arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map_or("", String::as_str)
}
