//! proxydeck - quota and usage console for an AI API proxy
//!
//! Talks to the proxy's management API to:
//! - reconcile request statistics with stored auth files (`files`, `usage`)
//! - refresh and normalize per-provider quota (`quota`)
//! - poll usage and session bindings in the background (`watch`)

mod api;
mod cli;
mod core;
mod logging;
mod providers;
mod refresh;
mod settings;

use clap::Parser;
use cli::{exit_codes, Cli, Commands, Context};

use crate::api::ApiError;
use crate::providers::QuotaError;

/// Redact sensitive CLI arguments (keys, tokens) from log output
fn redact_sensitive_args(args: &[String]) -> Vec<String> {
    let sensitive_flags = ["--key", "--key-entry", "--token", "--password"];
    let mut result = Vec::with_capacity(args.len());
    let mut redact_next = false;
    for arg in args {
        if redact_next {
            result.push("[REDACTED]".to_string());
            redact_next = false;
        } else if sensitive_flags.iter().any(|f| arg.as_str() == *f || arg.starts_with(&format!("{}=", f))) {
            if arg.contains('=') {
                let prefix = arg.split('=').next().unwrap_or(arg);
                result.push(format!("{}=[REDACTED]", prefix));
            } else {
                result.push(arg.clone());
                redact_next = true;
            }
        } else {
            result.push(arg.clone());
        }
    }
    result
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.json_logs) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let args: Vec<String> = std::env::args().collect();
    tracing::debug!("Args: {:?}", redact_sensitive_args(&args));

    let ctx = match Context::load(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit_codes::CONFIG_ERROR;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let command = cli.command;
    let result = rt.block_on(async move {
        match command {
            Commands::Ping => cli::ping::run(&ctx).await,
            Commands::Files(args) => cli::files::run(&ctx, args).await,
            Commands::Usage(args) => cli::usage::run(&ctx, args).await,
            Commands::Quota(args) => cli::quota::run(&ctx, args).await,
            Commands::Watch => cli::watch::run(&ctx).await,
            Commands::Excluded(args) => cli::excluded::run(&ctx, args).await,
        }
    });

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", api::describe_error(&*e));
            categorize_error(&e)
        }
    }
}

/// Categorize an error into the appropriate exit code
fn categorize_error(e: &anyhow::Error) -> i32 {
    if let Some(api_error) = e.downcast_ref::<ApiError>() {
        return match api_error {
            ApiError::InvalidConfig(_) => exit_codes::CONFIG_ERROR,
            _ => exit_codes::API_ERROR,
        };
    }
    if e.downcast_ref::<QuotaError>().is_some() {
        return exit_codes::API_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("settings") || msg.contains("invalid configuration") {
        exit_codes::CONFIG_ERROR
    } else if msg.contains("timed out")
        || msg.contains("connection")
        || msg.contains("management key")
        || msg.contains("upgrade required")
    {
        exit_codes::API_ERROR
    } else {
        exit_codes::UNEXPECTED_FAILURE
    }
}
