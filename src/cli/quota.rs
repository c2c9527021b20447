//! `proxydeck quota`

use std::sync::Arc;

use chrono::Utc;

use super::render::{format_window, print_json};
use super::{Context, QuotaArgs};
use crate::refresh::{ItemOutcome, QuotaCoordinator, RefreshOutcome, RefreshScope, UnsupportedFeatures};

pub async fn run(ctx: &Context, args: QuotaArgs) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let features = Arc::new(UnsupportedFeatures::new());
    let coordinator = QuotaCoordinator::new(client, features.clone(), ctx.settings.quota_batch_size);

    let listed = coordinator.load_files().await?;
    tracing::debug!("Loaded {} auth files", listed);

    let outcomes = match args.name.as_deref() {
        Some(name) => vec![coordinator.refresh_one(name, true).await],
        None => {
            let scope = if args.all {
                RefreshScope::All
            } else {
                RefreshScope::Page {
                    page: args.page.unwrap_or(1),
                    page_size: ctx.settings.page_size,
                }
            };
            coordinator.refresh_batch(scope).await
        }
    };

    if ctx.json {
        return print_json(&outcomes);
    }

    if outcomes.is_empty() {
        println!("No auth files in range");
        return Ok(());
    }

    let now = Utc::now();
    for outcome in &outcomes {
        print_outcome(outcome, now);
    }

    let unsupported = features.list();
    if !unsupported.is_empty() {
        println!();
        println!("Upgrade required for: {}", unsupported.join(", "));
    }

    if let [ItemOutcome {
        outcome: RefreshOutcome::NotFound,
        id,
        ..
    }] = outcomes.as_slice()
    {
        anyhow::bail!("No auth file named '{}'", id);
    }
    Ok(())
}

fn print_outcome(item: &ItemOutcome, now: chrono::DateTime<Utc>) {
    let name = if item.name.is_empty() { &item.id } else { &item.name };
    match &item.outcome {
        RefreshOutcome::Success(quota) => {
            let hints = quota.hints();
            if hints.is_empty() {
                println!("{}", name);
            } else {
                println!("{}  ({})", name, hints.join(", "));
            }
            for window in quota.windows() {
                println!("    {}", format_window(&window, now));
            }
        }
        RefreshOutcome::Empty => println!("{}\n    no quota data", name),
        RefreshOutcome::Failed(message) => println!("{}\n    error: {}", name, message),
        RefreshOutcome::InFlight => println!("{}\n    refresh already running", name),
        RefreshOutcome::Superseded => println!("{}\n    superseded by a newer refresh", name),
        RefreshOutcome::NotFound => println!("{}\n    not found", name),
    }
}
