//! `concierge dispatch`: send one message through the full pipeline.

use anyhow::Result;
use clap::Args;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use concierge_infra::llm::pricing::format_cost;
use concierge_types::dispatch::{DispatchContext, DispatchResponse, HandledBy};
use concierge_types::llm::AttemptOutcome;

use crate::state::AppState;

#[derive(Args)]
pub struct DispatchArgs {
    /// The message to dispatch.
    pub message: String,

    /// User the message comes from.
    #[arg(long, default_value = "cli")]
    pub user: String,

    /// Conversation the message belongs to.
    #[arg(long, default_value = "cli")]
    pub conversation: String,

    /// Locale tag of the user (e.g., "en-US").
    #[arg(long)]
    pub locale: Option<String>,

    /// Mark the request as personalized (never served from or stored in the cache).
    #[arg(long)]
    pub personalized: bool,

    /// Mark the request as safety-sensitive (crisis routing).
    #[arg(long = "safety")]
    pub safety_sensitive: bool,
}

pub async fn dispatch_message(state: &AppState, args: DispatchArgs, json: bool) -> Result<()> {
    let mut context = DispatchContext::new(args.user, args.conversation);
    context.locale = args.locale;
    context.personalized = args.personalized;
    context.safety_sensitive = args.safety_sensitive;

    let response = state.dispatcher.dispatch(args.message, context).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_response(&response);
    Ok(())
}

fn print_response(response: &DispatchResponse) {
    let meta = &response.metadata;
    let source = match &response.handled_by {
        HandledBy::Handler(name) => style(format!("handler {name}")).green(),
        HandledBy::Provider(name) => style(format!("provider {name}")).cyan(),
        HandledBy::Middleware(name) => style(format!("middleware {name}")).blue(),
        HandledBy::Degraded => style("degraded".to_string()).red().bold(),
    };

    println!();
    println!("  {}", response.response);
    println!();
    println!("  {} {}", style("via").dim(), source);

    let mut details = Vec::new();
    if let Some(score) = meta.match_score {
        details.push(format!("score {score:.2}"));
    }
    if let Some(tier) = meta.tier {
        details.push(format!("tier {tier}"));
    }
    if let Some(cost) = meta.actual_cost.or(meta.estimated_cost) {
        details.push(format!("cost {}", format_cost(cost)));
    }
    if meta.cache_hit {
        details.push("cache hit".to_string());
    }
    if meta.over_budget {
        details.push("over budget".to_string());
    }
    details.push(format!("{}ms", meta.latency_ms));
    println!("  {}", style(details.join(" | ")).dim());

    if meta.attempts.len() > 1 || meta.attempts.iter().any(|a| a.outcome != AttemptOutcome::Succeeded) {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Provider").fg(Color::White),
            Cell::new("Outcome").fg(Color::White),
        ]);
        for attempt in &meta.attempts {
            let outcome = match &attempt.outcome {
                AttemptOutcome::Succeeded => Cell::new("succeeded").fg(Color::Green),
                AttemptOutcome::CacheHit => Cell::new("cache hit").fg(Color::Green),
                AttemptOutcome::CircuitOpen => Cell::new("circuit open").fg(Color::Red),
                AttemptOutcome::RateLimited { retry_after_ms } => {
                    Cell::new(format!("rate limited (retry in {retry_after_ms}ms)")).fg(Color::Yellow)
                }
                AttemptOutcome::TransientFailure { error } => {
                    Cell::new(format!("transient: {}", super::truncate(error, 50))).fg(Color::Yellow)
                }
                AttemptOutcome::PermanentFailure { error } => {
                    Cell::new(format!("permanent: {}", super::truncate(error, 50))).fg(Color::Red)
                }
                AttemptOutcome::DeadlineExceeded => Cell::new("deadline exceeded").fg(Color::Red),
            };
            table.add_row(vec![Cell::new(&attempt.provider_id).fg(Color::Cyan), outcome]);
        }
        println!();
        println!("{table}");
    }
    println!();
}
