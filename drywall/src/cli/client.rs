use std::process::ExitCode;

use clap::ArgMatches;
use client::DrywallClient;
use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Attribute, Cell, ContentArrangement, Table};
use kernel::Resource;
use tokio::io::AsyncWriteExt;

use super::{arg, DEFAULT_CONTENT_TYPE};

pub async fn create(matches: &ArgMatches) -> ExitCode {
    write(matches, false).await
}

pub async fn update(matches: &ArgMatches) -> ExitCode {
    write(matches, true).await
}

pub async fn get(matches: &ArgMatches) -> ExitCode {
    let Some(client) = connect(matches) else {
        return ExitCode::FAILURE;
    };
    let name = arg(matches, "name");

    if matches.get_flag("raw") {
        return match client.content(name).await {
            Ok(content) => {
                let mut stdout = tokio::io::stdout();
                if let Err(e) = stdout.write_all(&content).await {
                    eprintln!("error: {e}");
                    return ExitCode::FAILURE;
                }
                stdout.flush().await.unwrap_or_default();
                ExitCode::SUCCESS
            }
            Err(e) => failure(&e),
        };
    }

    match client.get(name).await {
        Ok(resource) => {
            print_table(&[resource]);
            ExitCode::SUCCESS
        }
        Err(e) => failure(&e),
    }
}

pub async fn delete(matches: &ArgMatches) -> ExitCode {
    let Some(client) = connect(matches) else {
        return ExitCode::FAILURE;
    };
    let name = arg(matches, "name");
    match client.delete(name).await {
        Ok(()) => {
            println!("resource {name} deleted");
            ExitCode::SUCCESS
        }
        Err(e) => failure(&e),
    }
}

pub async fn list(matches: &ArgMatches) -> ExitCode {
    let Some(client) = connect(matches) else {
        return ExitCode::FAILURE;
    };
    match client.list().await {
        Ok(resources) => {
            print_table(&resources);
            ExitCode::SUCCESS
        }
        Err(e) => failure(&e),
    }
}

pub async fn repair(matches: &ArgMatches) -> ExitCode {
    let Some(client) = connect(matches) else {
        return ExitCode::FAILURE;
    };
    match client.repair().await {
        Ok(report) => {
            println!(
                "checked: {} rewritten: {} failed: {}",
                report.checked, report.rewritten, report.failed
            );
            if report.failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => failure(&e),
    }
}

async fn write(matches: &ArgMatches, existing: bool) -> ExitCode {
    let Some(client) = connect(matches) else {
        return ExitCode::FAILURE;
    };
    let file = arg(matches, "file");
    let content = match tokio::fs::read(file).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cannot read {file}: {e}");
            return ExitCode::FAILURE;
        }
    };
    let name = match matches.get_one::<String>("name") {
        Some(n) => n.clone(),
        None => match std::path::Path::new(file).file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => {
                eprintln!("cannot derive a resource name from {file}, pass --name");
                return ExitCode::FAILURE;
            }
        },
    };
    let content_type = matches
        .get_one::<String>("content-type")
        .map_or(DEFAULT_CONTENT_TYPE, String::as_str);

    let result = if existing {
        client.update(&name, &content, content_type).await
    } else {
        client.create(&name, &content, content_type).await
    };
    match result {
        Ok(resource) => {
            println!(
                "file {file} stored as {} (id {}, {} bytes)",
                resource.name, resource.id, resource.size
            );
            if let Some(warning) = resource.warning {
                eprintln!("warning: {warning}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => failure(&e),
    }
}

fn connect(matches: &ArgMatches) -> Option<DrywallClient> {
    let uri = arg(matches, "uri");
    match DrywallClient::new(uri) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("error: {e}");
            None
        }
    }
}

fn failure(e: &client::ClientError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::FAILURE
}

fn print_table(resources: &[Resource]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120)
        .set_header(vec![
            Cell::new("Id").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Content type").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
            Cell::new("Updated").add_attribute(Attribute::Bold),
        ]);

    for r in resources {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.name),
            Cell::new(&r.content_type),
            Cell::new(r.size),
            Cell::new(r.updated_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");
}
