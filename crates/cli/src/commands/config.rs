//! `ccr config`: show the effective configuration

use anyhow::{Context, Result};
use ccr::config::{ConfigResolver, ResolvedConfig};
use serde_json::Value;

/// Show which config layer won and the resolved values, secrets masked
pub async fn cmd_config(json: bool) -> Result<()> {
  let resolver = ConfigResolver::from_env();
  let resolved = resolver
    .resolve_with_source()
    .await
    .context("Failed to load config")?;

  let mut value = serde_json::to_value(&resolved.config).context("Failed to serialize config")?;
  mask_secrets(&mut value);

  if json {
    println!("{}", serde_json::to_string_pretty(&value)?);
    return Ok(());
  }

  print_summary(&resolver, &resolved);
  println!("\n--- Resolved ---");
  println!("{}", serde_json::to_string_pretty(&value)?);
  Ok(())
}

fn print_summary(resolver: &ConfigResolver, resolved: &ResolvedConfig) {
  let config = &resolved.config;

  println!("Configuration");
  println!("=============\n");
  match &resolved.path {
    Some(path) => println!("Source:         {} ({})", path.display(), resolved.layer),
    None => println!("Source:         {}", resolved.layer),
  }
  println!("Endpoint:       {}", config.base_url());
  println!("Non-interactive: {}", config.non_interactive_mode);
  println!("Status line:    {}", if config.status_line.enabled { "enabled" } else { "disabled" });

  if config.providers.is_empty() {
    println!("Providers:      none");
  } else {
    println!("Providers:");
    for provider in &config.providers {
      println!("  - {} ({} model(s))", provider.name, provider.models.len());
    }
  }

  println!("\n--- Lookup order ---");
  for (layer, path) in resolver.candidates() {
    let marker = if path.exists() { "found" } else { "missing" };
    println!("{:<18} {} [{}]", layer.to_string(), path.display(), marker);
  }
}

/// Replace every non-empty string under a key that looks like a credential
fn mask_secrets(value: &mut Value) {
  match value {
    Value::Object(map) => {
      for (key, entry) in map.iter_mut() {
        match entry {
          Value::String(secret) if is_secret_key(key) && !secret.is_empty() => *secret = mask(secret),
          _ => mask_secrets(entry),
        }
      }
    }
    Value::Array(items) => items.iter_mut().for_each(mask_secrets),
    _ => {}
  }
}

fn is_secret_key(key: &str) -> bool {
  let key = key.to_lowercase();
  key.contains("apikey") || key.contains("api_key") || key.contains("token") || key.contains("secret")
}

fn mask(secret: &str) -> String {
  if secret.chars().count() <= 8 {
    return "****".to_string();
  }
  let prefix: String = secret.chars().take(4).collect();
  format!("{}****", prefix)
}
