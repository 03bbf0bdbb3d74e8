//! Stats command

use anyhow::Result;
use crossterm::style::Stylize;

use super::LABEL_WIDTH;
use crate::context::Context;

/// Summarize the indexed unit file
pub fn stats(ctx: &Context, json: bool) -> Result<()> {
    let index = ctx.load_index()?;
    let stats = index.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let lw = LABEL_WIDTH + 8;
    println!();
    println!("  {}", ctx.units_path.display().to_string().white().bold());
    println!();
    println!("  {:<lw$}{}", "units", stats.units);
    println!("  {:<lw$}{}", "capabilities", stats.buckets);
    println!("  {:<lw$}{}", "multiple providers", stats.multi_provider_buckets);
    println!("  {:<lw$}{}", "no provider", stats.unprovided_buckets);
    println!("  {:<lw$}{}", "filters", stats.compiled_filters);
    println!();

    Ok(())
}
