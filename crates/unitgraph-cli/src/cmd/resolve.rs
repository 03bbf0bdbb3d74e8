//! Resolve command

use anyhow::{Context as _, Result, bail};
use crossterm::style::Stylize;
use unitgraph_core::{Query, Resolution, ResolveManifest};
use unitgraph_schema::Platform;

use super::LABEL_WIDTH;
use crate::ResolveArgs;
use crate::context::Context;

/// Resolve the selected roots and print the outcome.
pub fn resolve(ctx: &Context, args: &ResolveArgs, json: bool) -> Result<()> {
    let manifest = merge(&ctx.manifest, args)?;
    let index = ctx.load_index()?;

    let mut query = Query::new(&index);
    manifest
        .apply(&mut query)
        .context("Failed to select root units")?;
    if let Some(filter) = &args.matching {
        let matched = query
            .install_matching(filter)
            .with_context(|| format!("Failed to select units matching {filter}"))?;
        if matched == 0 {
            tracing::warn!("No unit matches {filter}");
        }
    }
    if query.roots().is_empty() {
        bail!("No root units; pass unit ids or set `roots` in unitgraph.toml");
    }

    let resolution = query.resolve()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution.report())?);
    } else {
        print_resolution(&resolution, query.target_platform());
    }

    if manifest.resolve.fail_on_unmet && !resolution.is_complete() {
        bail!("{} unmet requirement(s)", resolution.unmet().len());
    }
    Ok(())
}

/// Layer command-line flags over the manifest.
///
/// Roots and platform given on the command line replace the manifest's;
/// facts and exclusions are added to them.
fn merge(manifest: &ResolveManifest, args: &ResolveArgs) -> Result<ResolveManifest> {
    let mut merged = manifest.clone();
    let resolve = &mut merged.resolve;

    if !args.roots.is_empty() {
        resolve.roots.clone_from(&args.roots);
    }
    if let Some(platform) = &args.platform {
        let platform: Platform = platform
            .parse()
            .with_context(|| format!("Invalid platform '{platform}'"))?;
        resolve.platform = Some(platform);
    }
    for fact in &args.facts {
        let Some((key, value)) = fact.split_once('=') else {
            bail!("Invalid fact '{fact}', expected KEY=VALUE");
        };
        merged.facts.insert(key.trim().to_string(), value.trim().to_string());
    }
    resolve.exclude.extend(args.exclude.iter().cloned());
    resolve.exclude_prefix.extend(args.exclude_prefix.iter().cloned());
    resolve.fail_on_unmet |= args.fail_on_unmet;

    Ok(merged)
}

fn print_resolution(resolution: &Resolution<'_>, platform: Option<Platform>) {
    let lw = LABEL_WIDTH;
    let target = platform.map_or_else(|| "any platform".to_string(), |p| p.to_string());

    println!();
    println!(
        "  {} {}",
        format!("Resolved {} units", resolution.len()).white().bold(),
        format!("for {target}").dark_grey()
    );
    println!();

    let coordinates = resolution.public_coordinates();
    let missing = resolution.units_without_public_coordinate();
    println!("  {:<lw$}{}", "published", coordinates.len());
    println!("  {:<lw$}{}", "unpublished", missing.len());
    println!("  {:<lw$}{}", "unmet", resolution.unmet().len());
    println!("  {:<lw$}{}", "ambiguous", resolution.ambiguous().len());

    if !coordinates.is_empty() {
        println!();
        println!("  {}", "Coordinates".bold());
        for coordinate in &coordinates {
            println!("    {coordinate}");
        }
    }

    if !missing.is_empty() {
        println!();
        println!("  {}", "Not published".bold());
        for unit in &missing {
            println!("    {} {}", unit.id(), unit.version().to_string().dark_grey());
        }
    }

    if !resolution.unmet().is_empty() {
        println!();
        println!("  {}", "Unmet requirements".red().bold());
        for unmet in resolution.unmet() {
            println!(
                "    {} {} {}",
                unmet.unit.to_string().red(),
                "needs".dark_grey(),
                unmet.requirement
            );
        }
    }

    if !resolution.ambiguous().is_empty() {
        println!();
        println!("  {}", "Ambiguous requirements".yellow().bold());
        for ambiguous in resolution.ambiguous() {
            println!(
                "    {} {} {} {} {}",
                ambiguous.unit,
                "needs".dark_grey(),
                ambiguous.requirement,
                "->".dark_grey(),
                format!("{} (1 of {})", ambiguous.chosen, ambiguous.candidates).yellow()
            );
        }
    }
    println!();
}
