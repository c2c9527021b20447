//! `proxydeck ping`

use std::time::Instant;

use serde_json::json;

use super::render::print_json;
use super::Context;
use crate::api::{ApiError, ManagementApi};

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let started = Instant::now();

    match client.ping().await {
        Ok(()) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if ctx.json {
                print_json(&json!({
                    "ok": true,
                    "base_url": client.base_url(),
                    "elapsed_ms": elapsed_ms,
                }))?;
            } else {
                println!("Connected to {} ({} ms)", client.base_url(), elapsed_ms);
            }
            Ok(())
        }
        Err(e) if e.is_timeout() => {
            anyhow::bail!("Connection to {} failed: {}", client.base_url(), e)
        }
        Err(ApiError::Status { status: 401, .. }) | Err(ApiError::Status { status: 403, .. }) => {
            anyhow::bail!("Management key rejected by {}", client.base_url())
        }
        Err(e) => Err(e.into()),
    }
}
