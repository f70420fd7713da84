//! Config command - read and change settings.

use anyhow::{Context, Result};
use portctl_core::ConfigStore;
use serde_json::{Map, Value};

use super::print_json;

fn store() -> Result<ConfigStore> {
    ConfigStore::new().context("Could not locate the configuration file")
}

pub async fn get(key: &str, json: bool) -> Result<()> {
    let config = store()?.load().await?;
    let value = config.get(key)?;
    if json {
        let mut obj = Map::new();
        obj.insert(key.to_string(), Value::String(value));
        return print_json(&obj);
    }
    println!("{}", value);
    Ok(())
}

pub async fn set(key: &str, value: &str) -> Result<()> {
    let store = store()?;
    let mut config = store.load().await?;
    config.set(key, value)?;
    store.save(&config).await?;
    println!("Set {} = {}", key, config.get(key)?);
    Ok(())
}

pub async fn list(json: bool) -> Result<()> {
    let store = store()?;
    let config = store.load().await?;
    let entries = config.entries();

    if json {
        let obj: Map<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect();
        return print_json(&obj);
    }

    println!("Configuration ({})\n", store.path().display());
    for (key, value) in entries {
        println!("  {:<22} {}", key, value);
    }
    Ok(())
}

pub async fn reset(key: Option<&str>) -> Result<()> {
    let store = store()?;
    let mut config = store.load().await?;
    match key {
        Some(key) => {
            config.reset(key)?;
            store.save(&config).await?;
            println!("Reset {} to {}", key, config.get(key)?);
        }
        None => {
            config.reset_all();
            store.save(&config).await?;
            println!("Configuration reset to defaults");
        }
    }
    Ok(())
}

pub fn path() -> Result<()> {
    println!("{}", store()?.path().display());
    Ok(())
}
