//! The `mockprep list-models` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;

use mockprep_core::traits::ModelInfo;
use mockprep_providers::config::load_config_from;
use mockprep_providers::ollama::OllamaScorer;
use mockprep_providers::{create_scorer, ProviderConfig};

pub async fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    // Configured providers, plus the offline scorer which needs no entry.
    let mut providers: BTreeMap<String, ProviderConfig> = config.providers.into_iter().collect();
    providers
        .entry("mock".to_string())
        .or_insert(ProviderConfig::Mock);

    if let Some(filter) = &provider_filter {
        anyhow::ensure!(
            providers.contains_key(filter),
            "provider '{filter}' not found in config. Available: {:?}",
            providers.keys().collect::<Vec<_>>()
        );
    }

    for (name, provider_config) in &providers {
        if provider_filter.as_ref().is_some_and(|f| f != name) {
            continue;
        }

        let models = match provider_config {
            ProviderConfig::Ollama { base_url } => {
                match OllamaScorer::new(base_url).list_models_async().await {
                    Ok(models) => models,
                    Err(e) => {
                        println!("Provider: {name}\n  unavailable: {e}\n");
                        continue;
                    }
                }
            }
            other => match create_scorer(other) {
                Ok(scorer) => scorer.available_models(),
                Err(e) => {
                    println!("Provider: {name}\n  skipped: {e}\n");
                    continue;
                }
            },
        };

        println!("Provider: {name}");
        if models.is_empty() {
            println!("  (no models)");
        }
        for model in &models {
            println!("  {}", describe(model));
        }
        println!();
    }

    Ok(())
}

fn describe(model: &ModelInfo) -> String {
    if model.max_context == 0 {
        return format!("{} ({})", model.id, model.name);
    }
    format!(
        "{} ({}, {}K context, ${:.4}/{:.4} per 1K tokens)",
        model.id,
        model.name,
        model.max_context / 1000,
        model.cost_per_1k_input,
        model.cost_per_1k_output,
    )
}
