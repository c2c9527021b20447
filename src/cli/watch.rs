//! `proxydeck watch`

use std::sync::Arc;
use std::time::Duration;

use super::Context;
use crate::core::StatusBarLayout;
use crate::refresh::Poller;

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let layout = StatusBarLayout::new(ctx.settings.status_bar_blocks, ctx.settings.status_block_minutes);
    let poller = Arc::new(Poller::new(client, layout));

    let usage_every = Duration::from_secs(ctx.settings.usage_refresh_secs);
    let sessions_every = Duration::from_secs(ctx.settings.session_refresh_secs);
    tracing::info!(
        "Watching {} (usage every {}s, sessions every {}s); Ctrl-C to stop",
        ctx.settings.base_url,
        usage_every.as_secs(),
        sessions_every.as_secs()
    );

    let handle = poller.start(usage_every, sessions_every);
    tokio::signal::ctrl_c().await?;
    handle.shutdown();

    let active_sessions: u64 = poller.bindings().iter().map(|b| b.session_count).sum();
    tracing::info!(
        "Last poll: {} auth files, {} active sessions",
        poller.files().len(),
        active_sessions
    );

    let view = poller.view();
    if let Some(overall) = &view.overall {
        tracing::info!(
            "Last snapshot: {} ok / {} failed, success rate {}",
            overall.total_success,
            overall.total_failure,
            overall.format_rate()
        );
    }
    Ok(())
}
