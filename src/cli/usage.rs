//! `proxydeck usage`

use chrono::Utc;
use serde::Serialize;

use super::render::{format_bucket, format_status_bar, print_json};
use super::{Context, UsageArgs};
use crate::api::ManagementApi;
use crate::core::{
    calculate_status_bar_data, collect_usage_details, compute_key_stats, get_openai_provider_stats,
    get_stats_by_source, mask_api_key, ApiKeyEntry, KeyStatBucket, KeyStats, StatusBarData,
    StatusBarLayout,
};

#[derive(Debug, Serialize)]
struct SourceRow {
    source: String,
    stats: KeyStatBucket,
    status_bar: StatusBarData,
}

#[derive(Debug, Serialize)]
struct UsageReport {
    total_requests: usize,
    sources: Vec<SourceRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_total: Option<KeyStatBucket>,
}

/// The key the statistics were recorded under: raw when present, else masked
fn resolve_source_key(key: &str, stats: &KeyStats) -> String {
    let key = key.trim();
    if stats.by_source.contains_key(key) {
        key.to_string()
    } else {
        mask_api_key(key)
    }
}

/// Never print a raw key; masked sources pass through unchanged
fn display_source(source: &str) -> String {
    if source.contains(crate::core::MASK) || source.ends_with(".json") {
        source.to_string()
    } else {
        mask_api_key(source)
    }
}

pub async fn run(ctx: &Context, args: UsageArgs) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let usage = client.usage().await?;

    let details = collect_usage_details(&usage);
    let stats = compute_key_stats(&details);
    let layout = StatusBarLayout::new(ctx.settings.status_bar_blocks, ctx.settings.status_block_minutes);
    let now = Utc::now();

    let sources: Vec<SourceRow> = match args.source.as_deref() {
        Some(key) => {
            let resolved = resolve_source_key(key, &stats);
            vec![SourceRow {
                source: display_source(&resolved),
                stats: get_stats_by_source(key, &stats, mask_api_key),
                status_bar: calculate_status_bar_data(&details, Some(&resolved), now, layout),
            }]
        }
        None => {
            let mut keys: Vec<&String> = stats.by_source.keys().collect();
            keys.sort();
            keys.into_iter()
                .map(|source| SourceRow {
                    source: display_source(source),
                    stats: stats.by_source[source],
                    status_bar: calculate_status_bar_data(&details, Some(source), now, layout),
                })
                .collect()
        }
    };

    let provider_total = if args.key_entries.is_empty() {
        None
    } else {
        let entries: Vec<ApiKeyEntry> = args
            .key_entries
            .iter()
            .map(|key| ApiKeyEntry { api_key: key.clone() })
            .collect();
        Some(get_openai_provider_stats(&entries, &stats, mask_api_key))
    };

    let report = UsageReport {
        total_requests: details.len(),
        sources,
        provider_total,
    };

    if ctx.json {
        return print_json(&report);
    }

    println!("{} requests recorded", report.total_requests);
    for row in &report.sources {
        println!("{:<24} {}", row.source, format_bucket(&row.stats));
        println!("    {}", format_status_bar(&row.status_bar));
    }
    if let Some(total) = &report.provider_total {
        println!("Provider total: {}", format_bucket(total));
    }
    Ok(())
}
