use bugreport::{
    bugreport,
    collector::{CompileTimeInformation, EnvironmentVariables, OperatingSystem, SoftwareVersion},
    format::Markdown,
};

pub fn run() {
    bugreport!()
        .info(SoftwareVersion::default())
        .info(OperatingSystem::default())
        .info(EnvironmentVariables::list(&[
            "DRYWALL_ROOT",
            "DRYWALL_DATABASE",
            "DRYWALL_HOST",
            "DRYWALL_PORT",
            "DRYWALL_TIMEOUT_SECS",
            "DRYWALL_REQUEST_TIMEOUT_SECS",
            "DRYWALL_MAX_BODY_BYTES",
            "RUST_LOG",
        ]))
        .info(CompileTimeInformation::default())
        .print::<Markdown>();
}
