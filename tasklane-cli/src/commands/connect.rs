use std::collections::BTreeMap;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tasklane_core::config::Connection;

use crate::app::{App, parse_provider};

/// `key=value` into a TOML value, keeping numbers and booleans typed.
fn parse_param(raw: &str) -> Result<(String, toml::Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{}'", raw))?;

    let value = if let Ok(n) = value.parse::<i64>() {
        toml::Value::Integer(n)
    } else if let Ok(b) = value.parse::<bool>() {
        toml::Value::Boolean(b)
    } else {
        toml::Value::String(value.to_string())
    };

    Ok((key.trim().to_string(), value))
}

pub fn run(app: &App, provider: &str, params: &[String]) -> Result<()> {
    let kind = parse_provider(provider)?;
    let params = params
        .iter()
        .map(|p| parse_param(p))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let mut connections = app.connections.clone();
    connections.upsert(Connection {
        provider: kind,
        params,
    });
    connections
        .save(&app.user_dir())
        .context("Failed to save connections")?;

    println!("{} {}", "Connected".green(), kind.details().name);
    println!("Run {} to pull its items.", "tasklane sync".bold());
    Ok(())
}

pub fn disconnect(app: &App, provider: &str) -> Result<()> {
    let kind = parse_provider(provider)?;

    let mut connections = app.connections.clone();
    if !connections.remove(kind) {
        anyhow::bail!("{} is not connected", kind.details().name);
    }
    connections
        .save(&app.user_dir())
        .context("Failed to save connections")?;

    println!("{} {}", "Disconnected".yellow(), kind.details().name);
    println!(
        "{}",
        "Items already synced stay until they are deleted or garbage collected.".dimmed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_their_types() {
        assert_eq!(
            parse_param("page_size=25").unwrap(),
            ("page_size".to_string(), toml::Value::Integer(25))
        );
        assert_eq!(
            parse_param("feed=~/jira.json").unwrap(),
            ("feed".to_string(), toml::Value::String("~/jira.json".into()))
        );
        assert!(parse_param("feed").is_err());
    }
}
