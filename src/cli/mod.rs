//! Command line interface

pub mod excluded;
pub mod files;
pub mod ping;
pub mod quota;
mod render;
pub mod usage;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::api::ManagementClient;
use crate::settings::{Settings, SettingsOverrides};

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const API_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
}

#[derive(Parser, Debug)]
#[command(
    name = "proxydeck",
    version,
    about = "Quota and usage console for a CLIProxyAPI-style management API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Management API origin
    #[arg(long, global = true, env = "PROXYDECK_URL")]
    pub url: Option<String>,

    /// Management key
    #[arg(long, global = true, env = "PROXYDECK_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test connectivity to the management API
    Ping,
    /// List auth files with usage statistics
    Files(FilesArgs),
    /// Show request statistics per source
    Usage(UsageArgs),
    /// Refresh and show provider quota
    Quota(QuotaArgs),
    /// Poll usage and session bindings until interrupted
    Watch,
    /// Read or change OAuth model exclusions
    Excluded(ExcludedArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FilesArgs {
    /// Only files of this provider
    #[arg(long)]
    pub provider: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UsageArgs {
    /// Show one source (raw or masked key)
    #[arg(long)]
    pub source: Option<String>,

    /// OpenAI-compatible provider key to total up (repeatable)
    #[arg(long = "key-entry")]
    pub key_entries: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct QuotaArgs {
    /// Refresh every auth file
    #[arg(long, conflicts_with = "page")]
    pub all: bool,

    /// Refresh one page of auth files (1-based)
    #[arg(long)]
    pub page: Option<usize>,

    /// Refresh a single auth file by id or name
    #[arg(long, conflicts_with_all = ["all", "page"])]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExcludedArgs {
    #[command(subcommand)]
    pub action: ExcludedAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExcludedAction {
    /// Print exclusions, for one provider or all
    Show { provider: Option<String> },
    /// Replace a provider's exclusions; models may be comma or newline separated
    Set {
        provider: String,
        models: Vec<String>,
    },
}

impl Cli {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            base_url: self.url.clone(),
            management_key: self.key.clone(),
        }
    }
}

/// Resolved settings plus output preferences, shared by every command
pub struct Context {
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let settings = Settings::load(cli.config.as_deref())?.apply(&cli.overrides());
        settings.validate()?;
        Ok(Self {
            settings,
            json: cli.json,
        })
    }

    pub fn client(&self) -> anyhow::Result<Arc<ManagementClient>> {
        let client = ManagementClient::new(&self.settings)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quota_flags() {
        let cli = Cli::try_parse_from(["proxydeck", "quota", "--page", "2", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Quota(args) => {
                assert_eq!(args.page, Some(2));
                assert!(!args.all);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Cli::try_parse_from(["proxydeck", "quota", "--all", "--page", "1"]).is_err());
    }

    #[test]
    fn test_parse_excluded_set() {
        let cli = Cli::try_parse_from(["proxydeck", "excluded", "set", "gemini-cli", "a,b", "c"]).unwrap();
        match cli.command {
            Commands::Excluded(ExcludedArgs {
                action: ExcludedAction::Set { provider, models },
            }) => {
                assert_eq!(provider, "gemini-cli");
                assert_eq!(models, vec!["a,b", "c"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"http://10.0.0.2:8317\"\nmanagement_key = \"file-key\"\n").unwrap();
        let path_arg = path.to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "proxydeck",
            "--config",
            path_arg.as_str(),
            "--key",
            "flag-key",
            "ping",
        ])
        .unwrap();
        let ctx = Context::load(&cli).unwrap();
        assert_eq!(ctx.settings.management_key, "flag-key");
        assert_eq!(ctx.settings.base_url, "http://10.0.0.2:8317");
    }
}
