// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, and required field validation

use serial_test::serial;
use std::io::Write;

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    std::env::remove_var("HOOKBRIDGE_CONFIG_PATH");
    std::env::remove_var("DISCORD_TOKEN");
    std::env::remove_var("DISCORD_GUILD_ID");
    std::env::remove_var("WEBHOOK_HOST");
    std::env::remove_var("WEBHOOK_PORT");
    std::env::remove_var("WEBHOOK_SECRET");
    std::env::remove_var("ZAPIER_WEBHOOK_URL");
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
token = "bot-token-123"
guild_id = 42

[webhook]
host = "127.0.0.1"
port = 8080
secret = "hmac-secret"

[forwarder]
join_url = "https://hooks.example.com/join"
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());

    let config = hookbridge::config::Config::load().unwrap();

    assert_eq!(config.discord.token, "bot-token-123");
    assert_eq!(config.discord.guild_id, 42);
    assert_eq!(config.webhook.host, "127.0.0.1");
    assert_eq!(config.webhook.port, 8080);
    assert_eq!(config.webhook.secret, "hmac-secret");
    assert_eq!(
        config.forwarder.join_url.as_deref(),
        Some("https://hooks.example.com/join")
    );

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_env_var_overrides() {
    clear_config_env_vars();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
token = "file-token"
guild_id = 1

[webhook]
secret = "file-secret"
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());
    std::env::set_var("DISCORD_TOKEN", "env-token");
    std::env::set_var("DISCORD_GUILD_ID", "999");
    std::env::set_var("WEBHOOK_PORT", "9999");
    std::env::set_var("ZAPIER_WEBHOOK_URL", "https://env.example.com/join");

    let config = hookbridge::config::Config::load().unwrap();

    assert_eq!(config.discord.token, "env-token");
    assert_eq!(config.discord.guild_id, 999);
    assert_eq!(config.webhook.port, 9999);
    // File value survives where no env override exists
    assert_eq!(config.webhook.secret, "file-secret");
    assert_eq!(
        config.forwarder.join_url.as_deref(),
        Some("https://env.example.com/join")
    );

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_defaults() {
    clear_config_env_vars();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
token = "t"
guild_id = 1

[webhook]
secret = "s"
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());

    let config = hookbridge::config::Config::load().unwrap();

    assert_eq!(config.webhook.host, "0.0.0.0");
    assert_eq!(config.webhook.port, 5000);
    assert!(config.forwarder.join_url.is_none());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_requires_token_guild_and_secret() {
    clear_config_env_vars();
    let temp_dir = tempfile::TempDir::new().unwrap();

    // Missing token
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
guild_id = 1

[webhook]
secret = "s"
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());
    let err = hookbridge::config::Config::load().unwrap_err();
    assert!(err.to_string().contains("discord.token"));

    // Missing guild id
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
token = "t"

[webhook]
secret = "s"
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());
    let err = hookbridge::config::Config::load().unwrap_err();
    assert!(err.to_string().contains("discord.guild_id"));

    // Missing webhook secret
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
token = "t"
guild_id = 1
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());
    let err = hookbridge::config::Config::load().unwrap_err();
    assert!(err.to_string().contains("webhook.secret"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_rejects_bad_numeric_env_values() {
    clear_config_env_vars();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
[discord]
token = "t"
guild_id = 1

[webhook]
secret = "s"
"#,
    );
    std::env::set_var("HOOKBRIDGE_CONFIG_PATH", config_path.to_str().unwrap());
    std::env::set_var("DISCORD_GUILD_ID", "not-a-number");

    let err = hookbridge::config::Config::load().unwrap_err();
    assert!(err.to_string().contains("DISCORD_GUILD_ID"));

    clear_config_env_vars();
}
