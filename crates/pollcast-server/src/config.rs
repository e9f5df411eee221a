use anyhow::Context;
use pollcast_core::{AppConfig, Pacing};
use pollcast_models::poll::DeliveryMode;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub broadcast: BroadcastConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/pollcast.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base_url: String,
    /// Public URL of `/api/webhook`.
    pub webhook_url: String,
    pub webhook_secret: String,
    pub notify_chat_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: pollcast_telegram::client::DEFAULT_API_BASE.to_string(),
            webhook_url: String::new(),
            webhook_secret: String::new(),
            notify_chat_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub message_delay_ms: u64,
    pub chat_delay_ms: u64,
    pub poll_delivery: DeliveryMode,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            message_delay_ms: 1000,
            chat_delay_ms: 2000,
            poll_delivery: DeliveryMode::Buttons,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token for admin routes; empty leaves them open.
    pub token: String,
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl Config {
    /// Reads `path`, writing a fresh config with generated secrets when it
    /// does not exist yet. Environment overrides are applied afterwards.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let path = Path::new(path);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?
        } else {
            let config = Self::generated();
            config.save(path)?;
            tracing::warn!(
                "Config file {} not found, wrote defaults with a generated admin token",
                path.display()
            );
            config
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn generated() -> Self {
        let mut config = Self::default();
        config.admin.token = generate_secret();
        config.telegram.webhook_secret = generate_secret();
        config
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("POLLCAST_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = lookup("POLLCAST_WEBHOOK_SECRET") {
            self.telegram.webhook_secret = v;
        }
        if let Some(v) = lookup("POLLCAST_WEBHOOK_URL") {
            self.telegram.webhook_url = v;
        }
        if let Some(v) = lookup("POLLCAST_ADMIN_TOKEN") {
            self.admin.token = v;
        }
        if let Some(v) = lookup("POLLCAST_DATABASE_URL") {
            self.database.url = v;
        }
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            webhook_url: non_empty(&self.telegram.webhook_url),
            webhook_secret: non_empty(&self.telegram.webhook_secret),
            admin_token: non_empty(&self.admin.token),
            notify_chat_id: self.telegram.notify_chat_id.filter(|id| *id != 0),
            pacing: Pacing {
                message_delay: Duration::from_millis(self.broadcast.message_delay_ms),
                chat_delay: Duration::from_millis(self.broadcast.chat_delay_ms),
            },
            poll_delivery: self.broadcast.poll_delivery,
        }
    }
}
