//! `concierge usage`: spend and token totals per provider.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use concierge_infra::llm::pricing::format_cost;

use crate::state::AppState;

pub async fn show_usage(state: &AppState, window_secs: u64, json: bool) -> Result<()> {
    let stats = state
        .router
        .ledger()
        .get_usage_stats(Duration::from_secs(window_secs));

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Usage over the last").bold(),
        style(format!("{window_secs}s")).bold().cyan()
    );
    println!();

    if stats.providers.is_empty() {
        println!("  {} No provider calls recorded.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Calls").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
        Cell::new("Tokens In").fg(Color::White),
        Cell::new("Tokens Out").fg(Color::White),
        Cell::new("Cost").fg(Color::White),
    ]);
    for (provider, usage) in &stats.providers {
        let failures = if usage.failures > 0 {
            Cell::new(usage.failures).fg(Color::Red)
        } else {
            Cell::new(usage.failures).fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(provider).fg(Color::Cyan),
            Cell::new(usage.calls).fg(Color::White),
            failures,
            Cell::new(usage.tokens_in).fg(Color::White),
            Cell::new(usage.tokens_out).fg(Color::White),
            Cell::new(format_cost(usage.cost)).fg(Color::Yellow),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  Total: {} ({} in / {} out tokens)",
        style(format_cost(stats.total_cost)).yellow().bold(),
        stats.total_tokens_in,
        stats.total_tokens_out
    );
    println!();
    Ok(())
}
