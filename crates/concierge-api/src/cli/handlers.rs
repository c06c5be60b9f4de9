//! Handler registry CLI commands: list, show, stubs.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use concierge_types::intent::Intent;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum HandlersCommand {
    /// List registered handlers in registration order.
    #[command(alias = "ls")]
    List,

    /// Show one handler's intent and patterns.
    Show {
        /// Handler name (e.g., "reminder_handler").
        name: String,
    },

    /// Audit the intent catalog and print a skeleton for every intent
    /// that has no handler.
    Stubs,
}

pub async fn handle_handlers_command(cmd: HandlersCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        HandlersCommand::List => list_handlers(state, json),
        HandlersCommand::Show { name } => show_handler(state, &name, json),
        HandlersCommand::Stubs => handler_stubs(state, json),
    }
}

fn list_handlers(state: &AppState, json: bool) -> Result<()> {
    let registry = state.dispatcher.registry();
    let handlers = registry.list_handlers();

    if json {
        println!("{}", serde_json::to_string_pretty(&handlers)?);
        return Ok(());
    }

    if handlers.is_empty() {
        println!();
        println!("  {} No handlers registered.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Intent").fg(Color::White),
        Cell::new("Priority").fg(Color::White),
        Cell::new("Patterns").fg(Color::White),
    ]);
    for info in &handlers {
        table.add_row(vec![
            Cell::new(info.registration_order).fg(Color::DarkGrey),
            Cell::new(&info.name).fg(Color::Cyan),
            Cell::new(info.intent.as_str()).fg(Color::White),
            Cell::new(info.priority).fg(Color::White),
            Cell::new(info.patterns.join(", ")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} handler{}, match threshold {}",
        style(handlers.len()).bold(),
        if handlers.len() == 1 { "" } else { "s" },
        registry.match_threshold()
    );
    println!();
    Ok(())
}

fn show_handler(state: &AppState, name: &str, json: bool) -> Result<()> {
    let info = state.dispatcher.registry().get_handler_info(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&info.name).cyan().bold());
    println!("  {} {}", style("Intent:  ").dim(), info.intent);
    println!("  {} {}", style("Priority:").dim(), info.priority);
    println!("  {}", style("Patterns:").dim());
    for pattern in &info.patterns {
        println!("    - {pattern}");
    }
    println!();
    Ok(())
}

fn handler_stubs(state: &AppState, json: bool) -> Result<()> {
    let stubs = state.dispatcher.generate_handler_stubs(&Intent::CATALOG);

    if json {
        println!("{}", serde_json::to_string_pretty(&stubs)?);
        return Ok(());
    }

    if stubs.is_empty() {
        println!();
        println!(
            "  {} Every catalog intent has a handler.",
            style("✓").green().bold()
        );
        println!();
        return Ok(());
    }

    println!();
    println!(
        "  {} {} intent{} without a handler:",
        style("!").yellow().bold(),
        stubs.len(),
        if stubs.len() == 1 { "" } else { "s" }
    );
    for stub in &stubs {
        println!();
        println!(
            "  {} {}",
            style(stub.intent.as_str()).yellow(),
            style(format!("(suggested: {})", stub.suggested_name)).dim()
        );
        for line in stub.skeleton.lines() {
            println!("    {line}");
        }
    }
    println!();
    Ok(())
}
