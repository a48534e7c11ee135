use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionInfo {
    pub name: String,
    pub version: String,
    pub protocol: String,
    pub os: String,
    pub architecture: String,
}

pub fn run() {
    let info = VersionInfo {
        name: clap::crate_name!().to_string(),
        version: clap::crate_version!().to_string(),
        protocol: kernel::PROTOCOL_VERSION.to_string(),
        os: env::consts::OS.to_string(),
        architecture: env::consts::ARCH.to_string(),
    };

    println!("Name           : {}", info.name);
    println!("Version        : {}", info.version);
    println!("Euphony        : {}", info.protocol);
    println!("OS             : {}", info.os);
    println!("Architecture   : {}", info.architecture);
}
