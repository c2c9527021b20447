//! `proxydeck excluded`

use std::collections::BTreeMap;

use serde_json::json;

use super::render::print_json;
use super::{Context, ExcludedAction, ExcludedArgs};
use crate::api::{ApiError, ManagementApi};
use crate::core::{excluded_models_to_text, parse_excluded_models};

const UPGRADE_HINT: &str = "This proxy does not support OAuth model exclusions; upgrade required";

fn unsupported_hint(error: ApiError) -> anyhow::Error {
    if error.is_unsupported() {
        anyhow::anyhow!(UPGRADE_HINT)
    } else {
        error.into()
    }
}

pub async fn run(ctx: &Context, args: ExcludedArgs) -> anyhow::Result<()> {
    let client = ctx.client()?;

    match args.action {
        ExcludedAction::Show { provider } => {
            let map = client.excluded_models().await.map_err(unsupported_hint)?;
            let map: BTreeMap<String, Vec<String>> = match provider {
                Some(provider) => {
                    let provider = provider.trim().to_lowercase();
                    let models = map.get(&provider).cloned().unwrap_or_default();
                    BTreeMap::from([(provider, models)])
                }
                None => map,
            };

            if ctx.json {
                return print_json(&map);
            }
            if map.is_empty() {
                println!("No model exclusions");
            }
            for (provider, models) in &map {
                println!("[{}]", provider);
                if models.is_empty() {
                    println!("(none)");
                } else {
                    println!("{}", excluded_models_to_text(models));
                }
            }
            Ok(())
        }
        ExcludedAction::Set { provider, models } => {
            let models = parse_excluded_models(&models.join("\n"));
            client
                .set_excluded_models(&provider, &models)
                .await
                .map_err(unsupported_hint)?;

            if ctx.json {
                return print_json(&json!({ "provider": provider, "models": models }));
            }
            if models.is_empty() {
                println!("Cleared exclusions for {}", provider);
            } else {
                println!("Excluded {} models for {}", models.len(), provider);
            }
            Ok(())
        }
    }
}
