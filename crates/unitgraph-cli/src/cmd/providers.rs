//! Providers command

use anyhow::Result;
use crossterm::style::Stylize;
use serde::Serialize;
use unitgraph_core::Bucket;
use unitgraph_schema::{UnitProperties, Version};

use crate::context::Context;

#[derive(Debug, Serialize)]
struct ProviderEntry<'a> {
    id: &'a str,
    version: &'a Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    coordinate: Option<String>,
}

fn entries<'a>(bucket: &Bucket<'a>) -> Vec<ProviderEntry<'a>> {
    bucket
        .providers()
        .map(|unit| ProviderEntry {
            id: unit.id().as_str(),
            version: unit.version(),
            coordinate: unit.public_coordinate(),
        })
        .collect()
}

/// List every unit providing `namespace`/`name`, in resolution order
pub fn providers(ctx: &Context, namespace: &str, name: &str, json: bool) -> Result<()> {
    let index = ctx.load_index()?;
    let bucket = index.requirement(namespace, name);
    let entries = entries(&bucket);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!();
    if entries.is_empty() {
        println!(
            "  {} {}",
            "Nothing provides".red(),
            format!("{namespace}/{name}").bold()
        );
        println!();
        return Ok(());
    }

    println!(
        "  {} {}",
        format!("{namespace}/{name}").white().bold(),
        format!("({} providers)", entries.len()).dark_grey()
    );
    println!();
    for (i, entry) in entries.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        print!("  {marker} {} {}", entry.id, entry.version.to_string().dark_grey());
        if let Some(coordinate) = &entry.coordinate {
            print!("  {}", coordinate.as_str().cyan());
        }
        println!();
    }
    println!();

    Ok(())
}
