//! `proxydeck files`

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::render::{format_bucket, format_status_bar, print_json, truncate};
use super::{Context, FilesArgs};
use crate::api::ManagementApi;
use crate::core::{binding_for, KeyStatBucket, QuotaStatus, StatusBarData, StatusBarLayout};
use crate::refresh::UsageView;

#[derive(Debug, Serialize)]
struct FileRow<'a> {
    id: &'a str,
    name: &'a str,
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_index: Option<&'a str>,
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    stats: KeyStatBucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_bar: Option<&'a StatusBarData>,
    sessions: u64,
    /// When an exceeded credential is due back
    #[serde(skip_serializing_if = "Option::is_none")]
    recovers_at: Option<DateTime<Utc>>,
}

pub async fn run(ctx: &Context, args: FilesArgs) -> anyhow::Result<()> {
    let client = ctx.client()?;

    let (files, usage, bindings) = tokio::join!(
        client.list_auth_files(),
        client.usage(),
        client.session_bindings()
    );
    let files = files?;
    let usage = usage?;
    let bindings = match bindings {
        Ok(bindings) => bindings,
        Err(e) if e.is_unsupported() => {
            tracing::debug!("Session bindings unavailable: {}", e);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let layout = StatusBarLayout::new(ctx.settings.status_bar_blocks, ctx.settings.status_block_minutes);
    let view = UsageView::build(&usage, &files, Utc::now(), layout);

    let wanted = args.provider.as_deref().map(|p| p.trim().to_lowercase());
    let rows: Vec<FileRow> = files
        .iter()
        .filter(|f| wanted.as_deref().map_or(true, |p| f.provider_name() == p))
        .map(|f| FileRow {
            id: &f.id,
            name: &f.name,
            provider: f.provider_name(),
            auth_index: f.auth_index.as_deref(),
            active: f.is_active(),
            email: f.email.as_deref(),
            stats: view.file_stats.get(f.identity()).copied().unwrap_or_default(),
            status_bar: view.status_bars.get(f.identity()),
            sessions: binding_for(f, &bindings).map(|b| b.session_count).unwrap_or(0),
            recovers_at: f
                .quota
                .as_ref()
                .filter(|q| q.exceeded)
                .and_then(QuotaStatus::next_recover_time),
        })
        .collect();

    if ctx.json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No auth files");
        return Ok(());
    }

    for row in &rows {
        let mut state = if row.active { String::new() } else { " (disabled)".to_string() };
        if let Some(at) = row.recovers_at {
            state.push_str(&format!(" (exceeded until {})", at.format("%Y-%m-%d %H:%M UTC")));
        }
        println!(
            "{:<32} {:<12} idx {:<4} {:<22} sessions {}{}",
            truncate(row.name, 32),
            row.provider,
            row.auth_index.unwrap_or("-"),
            format_bucket(&row.stats),
            row.sessions,
            state
        );
        if let Some(bar) = row.status_bar {
            println!("    {}", format_status_bar(bar));
        }
    }
    Ok(())
}
