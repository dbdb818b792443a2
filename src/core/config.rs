//! Bot configuration loaded from the environment
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Add SYNC_COMMANDS toggle for diff-based registration
//! - 1.0.0: Initial token, guild and log level settings

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Register commands for this guild only (instant update) instead of globally
    pub discord_guild_id: Option<u64>,
    pub log_level: String,
    /// Diff against remote state on startup; when false every command is created unconditionally
    pub sync_commands: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .context("DISCORD_TOKEN must be set")?;

        let discord_guild_id = match lookup("DISCORD_GUILD_ID").filter(|id| !id.trim().is_empty()) {
            Some(id) => Some(
                id.trim()
                    .parse::<u64>()
                    .with_context(|| format!("DISCORD_GUILD_ID is not a valid id: {id}"))?,
            ),
            None => None,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let sync_commands = match lookup("SYNC_COMMANDS") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("SYNC_COMMANDS is not a boolean: {value}"))?,
            None => true,
        };

        Ok(Config {
            discord_token,
            discord_guild_id,
            log_level,
            sync_commands,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.discord_guild_id, None);
        assert_eq!(config.log_level, "info");
        assert!(config.sync_commands);
    }

    #[test]
    fn test_config_missing_token() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn test_config_guild_and_sync() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DISCORD_GUILD_ID", "1234"),
            ("SYNC_COMMANDS", "off"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.discord_guild_id, Some(1234));
        assert!(!config.sync_commands);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_config_invalid_guild_id() {
        let result = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc"), ("DISCORD_GUILD_ID", "guild")]));
        assert!(result.is_err());
    }
}
