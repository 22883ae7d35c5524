// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub forwarder: ForwarderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token; never logged.
    #[serde(default)]
    pub token: String,
    /// The single guild this process operates on.
    #[serde(default)]
    pub guild_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_host")]
    pub host: String,
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    /// Shared HMAC secret for inbound payloads; never logged.
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Where member-join notifications are POSTed. Absent means joins
    /// are cached locally but not forwarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_webhook_host(),
            port: default_webhook_port(),
            secret: String::new(),
        }
    }
}

fn default_webhook_host() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_port() -> u16 {
    5000
}

impl Config {
    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HOOKBRIDGE_CONFIG_PATH")
            .unwrap_or_else(|_| "config.toml".to_string());
        let mut config = if Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path))?
        } else {
            Config {
                discord: DiscordConfig {
                    token: String::new(),
                    guild_id: 0,
                },
                webhook: WebhookConfig {
                    host: default_webhook_host(),
                    port: default_webhook_port(),
                    secret: String::new(),
                },
                forwarder: ForwarderConfig::default(),
            }
        };

        // Override with environment variables if present
        if let Ok(val) = std::env::var("DISCORD_TOKEN") {
            config.discord.token = val;
        }
        if let Ok(val) = std::env::var("DISCORD_GUILD_ID") {
            config.discord.guild_id = val.parse().with_context(|| {
                format!("DISCORD_GUILD_ID must be a numeric guild id, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("WEBHOOK_HOST") {
            config.webhook.host = val;
        }
        if let Ok(val) = std::env::var("WEBHOOK_PORT") {
            config.webhook.port = val.parse().with_context(|| {
                format!("WEBHOOK_PORT must be a valid port number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("WEBHOOK_SECRET") {
            config.webhook.secret = val;
        }
        if let Ok(val) = std::env::var("ZAPIER_WEBHOOK_URL") {
            config.forwarder.join_url = Some(val);
        }

        // Validate required fields
        if config.discord.token.trim().is_empty() {
            anyhow::bail!(
                "discord.token is required (set in config.toml or DISCORD_TOKEN env var)"
            );
        }
        if config.discord.guild_id == 0 {
            anyhow::bail!(
                "discord.guild_id is required (set in config.toml or DISCORD_GUILD_ID env var)"
            );
        }
        if config.webhook.secret.trim().is_empty() {
            anyhow::bail!(
                "webhook.secret is required (set in config.toml or WEBHOOK_SECRET env var)"
            );
        }

        Ok(config)
    }
}
