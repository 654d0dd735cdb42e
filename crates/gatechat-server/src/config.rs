use anyhow::Result;
use gatechat_core::ratelimit::RateLimitConfig;
use gatechat_core::AppConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;

fn harden_secret_file_permissions(path: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Origins allowed on the HTTP surface; "*" allows any.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/gatechat.db?mode=rwc".into(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Shared HS256 secret with the credential issuance service.
    pub signing_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: generate_random_hex(64),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
    #[serde(default = "default_message_ttl_days")]
    pub message_ttl_days: i64,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_messages: u32,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: i64,
    /// How often the retention reaper wakes up.
    #[serde(default = "default_retention_sweep")]
    pub retention_sweep_secs: u64,
    /// Expired messages removed per reaper pass.
    #[serde(default = "default_retention_batch")]
    pub retention_batch: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            message_ttl_days: default_message_ttl_days(),
            rate_limit_max_messages: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window(),
            retention_sweep_secs: default_retention_sweep(),
            retention_batch: default_retention_batch(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_max_connections() -> u32 {
    5
}
fn default_history_limit() -> i64 {
    50
}
fn default_message_ttl_days() -> i64 {
    3
}
fn default_rate_limit_max() -> u32 {
    20
}
fn default_rate_limit_window() -> i64 {
    60
}
fn default_retention_sweep() -> u64 {
    3600
}
fn default_retention_batch() -> i64 {
    500
}

fn generate_random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..16u8);
            char::from(if idx < 10 {
                b'0' + idx
            } else {
                b'a' + idx - 10
            })
        })
        .collect()
}

fn looks_like_placeholder_secret(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return true;
    }
    normalized.contains("change_me")
        || normalized.contains("replace_me")
        || normalized.contains("replace_with")
        || normalized.starts_with("example")
        || normalized == "devkey"
        || normalized == "devsecret"
        || normalized == "secret"
}

fn validate_secret_configuration(config: &Config) -> Result<()> {
    let secret = config.auth.signing_secret.trim();
    if secret.len() < 32 || looks_like_placeholder_secret(secret) {
        anyhow::bail!(
            "Invalid auth.signing_secret: use a strong random secret (at least 32 characters) and never leave placeholder values"
        );
    }
    Ok(())
}

/// Generate a commented config file template with the given values filled in.
fn generate_config_template(config: &Config) -> String {
    format!(
        r#"# GateChat Server Configuration
# Generated automatically on first run. Edit as needed.

[server]
bind_address = "{bind_address}"
# Origins allowed on the HTTP surface. "*" allows any.
allowed_origins = ["*"]

[database]
url = "{db_url}"
max_connections = {max_connections}

[auth]
# Must match the secret used by the credential issuance service.
signing_secret = "{signing_secret}"

[chat]
# Messages replayed to a joining client.
history_limit = {history_limit}
# Messages older than this are hidden and eventually purged.
message_ttl_days = {message_ttl_days}
# Per-connection message ceiling within one window.
rate_limit_max_messages = {rate_limit_max}
rate_limit_window_secs = {rate_limit_window}
retention_sweep_secs = {retention_sweep}
retention_batch = {retention_batch}
"#,
        bind_address = config.server.bind_address,
        db_url = config.database.url,
        max_connections = config.database.max_connections,
        signing_secret = config.auth.signing_secret,
        history_limit = config.chat.history_limit,
        message_ttl_days = config.chat.message_ttl_days,
        rate_limit_max = config.chat.rate_limit_max_messages,
        rate_limit_window = config.chat.rate_limit_window_secs,
        retention_sweep = config.chat.retention_sweep_secs,
        retention_batch = config.chat.retention_batch,
    )
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!("Config file not found at '{}', generating defaults...", path);
            let config = Config::default();

            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }
            let template = generate_config_template(&config);
            fs::write(path, &template)?;
            let _ = harden_secret_file_permissions(path);
            tracing::info!("Generated default config at '{}'", path);
            config
        };
        let _ = harden_secret_file_permissions(path);

        // Environment variable overrides
        if let Ok(value) = std::env::var("GATECHAT_BIND_ADDRESS") {
            config.server.bind_address = value;
        }
        if let Ok(value) = std::env::var("GATECHAT_ALLOWED_ORIGINS") {
            config.server.allowed_origins = value
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Ok(value) = std::env::var("GATECHAT_DATABASE_URL") {
            config.database.url = value;
        }
        if let Ok(value) = std::env::var("GATECHAT_SIGNING_SECRET") {
            config.auth.signing_secret = value;
        }
        if let Ok(value) = std::env::var("GATECHAT_HISTORY_LIMIT") {
            if let Ok(parsed) = value.trim().parse() {
                config.chat.history_limit = parsed;
            }
        }
        if let Ok(value) = std::env::var("GATECHAT_MESSAGE_TTL_DAYS") {
            if let Ok(parsed) = value.trim().parse() {
                config.chat.message_ttl_days = parsed;
            }
        }

        validate_secret_configuration(&config)?;
        Ok(config)
    }

    /// The runtime view shared with every connection handler.
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            signing_secret: self.auth.signing_secret.clone(),
            history_limit: self.chat.history_limit,
            message_ttl: chrono::Duration::days(self.chat.message_ttl_days),
            rate_limit: RateLimitConfig {
                max_messages: self.chat.rate_limit_max_messages,
                window: chrono::Duration::seconds(self.chat.rate_limit_window_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_generates_a_config_that_passes_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gatechat.toml");
        let path = path.to_str().expect("utf8 path");

        let generated = Config::load(path).expect("generate");
        assert!(std::path::Path::new(path).exists());
        assert_eq!(generated.auth.signing_secret.len(), 64);

        // The written template loads back to the same values.
        let reloaded = Config::load(path).expect("reload");
        assert_eq!(reloaded.auth.signing_secret, generated.auth.signing_secret);
        assert_eq!(reloaded.server.bind_address, generated.server.bind_address);
        assert_eq!(reloaded.chat.message_ttl_days, 3);
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gatechat.toml");
        fs::write(
            &path,
            r#"
[auth]
signing_secret = "change_me_please_change_me_please_ok"
"#,
        )
        .expect("write");
        assert!(Config::load(path.to_str().expect("utf8 path")).is_err());
    }

    #[test]
    fn short_secrets_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gatechat.toml");
        fs::write(&path, "[auth]\nsigning_secret = \"too-short\"\n").expect("write");
        assert!(Config::load(path.to_str().expect("utf8 path")).is_err());
    }

    #[test]
    fn chat_section_converts_to_runtime_config() {
        let mut config = Config::default();
        config.chat.message_ttl_days = 7;
        config.chat.rate_limit_max_messages = 5;
        let app = config.app_config();
        assert_eq!(app.message_ttl, chrono::Duration::days(7));
        assert_eq!(app.rate_limit.max_messages, 5);
        assert_eq!(app.history_limit, 50);
    }
}
