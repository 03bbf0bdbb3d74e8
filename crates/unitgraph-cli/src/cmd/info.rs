//! Info command

use anyhow::{Context as _, Result};
use crossterm::style::Stylize;
use serde::Serialize;
use std::collections::BTreeMap;
use unitgraph_core::{CapabilityIndex, Unit};
use unitgraph_schema::{Capability, RequiredCapability, UnitProperties, Version};

use super::LABEL_WIDTH;
use crate::context::Context;

#[derive(Debug, Serialize)]
struct UnitInfo<'a> {
    id: &'a str,
    version: &'a Version,
    coordinate: Option<String>,
    properties: &'a BTreeMap<String, String>,
    provides: &'a [Capability],
    requires: Vec<RequiredCapability>,
    versions: Vec<&'a Version>,
}

/// Look up `id` or `id@version`; a bare id picks the highest version.
fn find<'a>(index: &'a CapabilityIndex, spec: &str) -> Result<&'a Unit> {
    let unit = match spec.split_once('@') {
        Some((id, version)) => {
            let version = Version::parse(version)
                .with_context(|| format!("Invalid version in '{spec}'"))?;
            index.unit(id, &version)?
        }
        None => index.unit_by_id(spec)?,
    };
    Ok(unit)
}

/// Show everything known about one unit
pub fn info(ctx: &Context, spec: &str, json: bool) -> Result<()> {
    let index = ctx.load_index()?;
    let unit = find(&index, spec)?;
    let versions: Vec<&Version> = index
        .units_by_id(unit.id())
        .iter()
        .map(Unit::version)
        .collect();

    if json {
        let info = UnitInfo {
            id: unit.id().as_str(),
            version: unit.version(),
            coordinate: unit.public_coordinate(),
            properties: unit.properties(),
            provides: unit.provides(),
            requires: unit.requires().iter().map(|r| r.to_record()).collect(),
            versions,
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let lw = LABEL_WIDTH;
    println!();
    println!(
        "  {} {}",
        unit.id().as_str().white().bold(),
        unit.version().to_string().dark_grey()
    );
    println!();

    let kind = if unit.is_category() {
        "category"
    } else if unit.is_feature() {
        "feature"
    } else {
        "bundle"
    };
    println!("  {:<lw$}{}", "kind", kind);
    if let Some(coordinate) = unit.public_coordinate() {
        println!("  {:<lw$}{}", "coordinate", coordinate);
    }
    if versions.len() > 1 {
        let all: Vec<String> = versions.iter().map(ToString::to_string).collect();
        println!("  {:<lw$}{}", "versions", all.join(", "));
    }

    if !unit.provides().is_empty() {
        println!();
        println!("  {}", "Provides".bold());
        for capability in unit.provides() {
            println!("    {capability}");
        }
    }

    if !unit.requires().is_empty() {
        println!();
        println!("  {}", "Requires".bold());
        for requirement in unit.requires() {
            let providers = index.bucket_for(requirement).len();
            let count = match providers {
                0 => "no providers".to_string().red(),
                1 => "1 provider".to_string().dark_grey(),
                n => format!("{n} providers").yellow(),
            };
            println!("    {requirement} {count}");
        }
    }

    if !unit.properties().is_empty() {
        println!();
        println!("  {}", "Properties".bold());
        for (key, value) in unit.properties() {
            println!("    {} = {}", key.as_str().dark_grey(), value);
        }
    }
    println!();

    Ok(())
}
