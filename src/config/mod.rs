mod schema;

pub use schema::{EngineConfig, ErrorPolicy, Subscription, DEFAULT_FALLBACK_VISIBILITY};

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "FIELDLOGIC_CONFIG";

/// config path: explicit override > FIELDLOGIC_CONFIG > ~/.fieldlogic/config.json
pub fn get_config_path_with_override(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .join(".fieldlogic")
        .join("config.json"))
}

/// load config; a missing file yields the defaults without writing anything
pub fn load_with_override(override_path: Option<&Path>) -> Result<EngineConfig> {
    let path = get_config_path_with_override(override_path)?;
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: EngineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

pub fn save_with_override(config: &EngineConfig, override_path: Option<&Path>) -> Result<()> {
    let path = get_config_path_with_override(override_path)?;
    save_to(config, &path)
}

pub fn save_to(config: &EngineConfig, path: &Path) -> Result<()> {
    // ensure directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

pub fn set_value(config: &mut EngineConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "error_policy" => {
            config.error_policy = match value.to_lowercase().as_str() {
                "fail" => ErrorPolicy::Fail,
                "rule_false" => ErrorPolicy::RuleFalse,
                _ => {
                    return Err(anyhow!(
                        "Invalid error_policy: {}. Use fail or rule_false",
                        value
                    ))
                }
            };
        }
        "fallback_visibility" => {
            config.fallback_visibility = parse_bool(value)?;
        }
        "subscription" => {
            config.subscription = match value.to_lowercase().as_str() {
                "scope" => Subscription::Scope,
                "dependencies" => Subscription::Dependencies,
                _ => {
                    return Err(anyhow!(
                        "Invalid subscription: {}. Use scope or dependencies",
                        value
                    ))
                }
            };
        }
        "publish_unchanged" => {
            config.publish_unchanged = parse_bool(value)?;
        }
        _ => {
            return Err(anyhow!(
                "Unknown config key: {}. Valid keys: error_policy, fallback_visibility, subscription, publish_unchanged",
                key
            ));
        }
    }

    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "Invalid boolean value: {}. Use true/false, yes/no, 1/0, or on/off",
            value
        )),
    }
}
