//! Provider CLI commands: list, status, test.
//!
//! Circuit breaker state is tracked in memory by the running router, so
//! `status` from a one-shot CLI invocation shows a fresh router. Query
//! `GET /api/v1/providers` on a running server for live health.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use concierge_infra::llm::pricing::format_cost;
use concierge_infra::llm::{create_provider, resolve_api_key, test_provider_connection};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List routable providers with tier, quality and price.
    #[command(alias = "ls")]
    List,

    /// Show circuit breaker health of every provider.
    Status,

    /// Send a minimal completion to verify credentials and endpoint.
    Test {
        /// Provider id from config.toml.
        id: String,
    },
}

pub async fn handle_providers_command(cmd: ProvidersCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ProvidersCommand::List => provider_list(state, json),
        ProvidersCommand::Status => provider_status(state, json),
        ProvidersCommand::Test { id } => provider_test(state, &id, json).await,
    }
}

fn print_no_providers() {
    println!();
    println!(
        "  {} No providers configured. Add a {} section to config.toml.",
        style("i").blue().bold(),
        style("[[providers]]").cyan()
    );
    println!();
}

fn provider_list(state: &AppState, json: bool) -> Result<()> {
    let profiles = state.router.providers();

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }
    if profiles.is_empty() {
        print_no_providers();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Tier").fg(Color::White),
        Cell::new("Quality").fg(Color::White),
        Cell::new("In / 1K").fg(Color::White),
        Cell::new("Out / 1K").fg(Color::White),
        Cell::new("Avg Latency").fg(Color::White),
    ]);
    for profile in &profiles {
        table.add_row(vec![
            Cell::new(&profile.id).fg(Color::Cyan),
            Cell::new(&profile.model).fg(Color::DarkGrey),
            Cell::new(profile.tier.to_string()).fg(Color::White),
            Cell::new(format!("{:.2}", profile.quality)).fg(Color::White),
            Cell::new(format_cost(profile.cost_per_1k_input)).fg(Color::White),
            Cell::new(format_cost(profile.cost_per_1k_output)).fg(Color::White),
            Cell::new(format!("{}ms", profile.avg_latency_ms)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Display health status of all configured providers.
///
/// Shows circuit breaker state, last error, time since last success, call
/// counts and failure counts in a formatted table.
fn provider_status(state: &AppState, json: bool) -> Result<()> {
    let statuses = state.router.health_status();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }
    if statuses.is_empty() {
        print_no_providers();
        return Ok(());
    }

    println!();
    println!("  {}", style("Provider Health Status").bold());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Tier").fg(Color::White),
        Cell::new("Circuit").fg(Color::White),
        Cell::new("Last Error").fg(Color::White),
        Cell::new("Last Success").fg(Color::White),
        Cell::new("Calls").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
    ]);

    for status in &statuses {
        let circuit_cell = match status.circuit_state.as_str() {
            "closed" => Cell::new("closed").fg(Color::Green),
            "open" => Cell::new("OPEN").fg(Color::Red),
            "half_open" => Cell::new("half_open").fg(Color::Yellow),
            other => Cell::new(other).fg(Color::White),
        };
        let last_error = super::truncate(status.last_error.as_deref().unwrap_or("-"), 40);

        table.add_row(vec![
            Cell::new(&status.id).fg(Color::Cyan),
            Cell::new(&status.model).fg(Color::DarkGrey),
            Cell::new(status.tier.to_string()).fg(Color::White),
            circuit_cell,
            Cell::new(last_error).fg(Color::DarkGrey),
            Cell::new(status.last_success_ago.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
            Cell::new(status.total_calls).fg(Color::White),
            Cell::new(status.total_failures).fg(Color::White),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  {} provider{}",
        style(statuses.len()).bold(),
        if statuses.len() == 1 { "" } else { "s" }
    );
    println!(
        "  {}",
        style("Circuit breaker state lives in the running router; use the REST API for live values.").dim()
    );
    println!();

    Ok(())
}

async fn provider_test(state: &AppState, id: &str, json: bool) -> Result<()> {
    let config = state
        .config
        .providers
        .iter()
        .find(|p| p.id == id)
        .with_context(|| format!("provider '{id}' is not configured"))?;

    let api_key = resolve_api_key(config)?;
    let provider = create_provider(config, api_key)?;
    let result = test_provider_connection(&provider).await;

    if json {
        let body = serde_json::json!({
            "provider": id,
            "ok": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match result {
        Ok(()) => println!(
            "\n  {} {} responded\n",
            style("✓").green().bold(),
            style(id).cyan()
        ),
        Err(e) => {
            println!(
                "\n  {} {} failed: {e}\n",
                style("✗").red().bold(),
                style(id).cyan()
            );
            anyhow::bail!("connection test failed for '{id}'");
        }
    }
    Ok(())
}
