use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// When unset the engine runs on the in-memory store
    pub url: Option<String>,
}

/// Which MTN aggregator the registry binds; the CodeCraft aggregator always
/// serves Telecel, Ishare and Bigtime
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MtnProvider {
    Jaybart,
    Jesco,
    Easydata,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_mtn_provider")]
    pub mtn_provider: MtnProvider,
    pub jaybart: JaybartSettings,
    pub codecraft: CodeCraftSettings,
    pub jesco: JescoSettings,
    pub easydata: EasyDataSettings,
}

fn default_mtn_provider() -> MtnProvider {
    MtnProvider::Jaybart
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct JaybartSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CodeCraftSettings {
    pub base_url: String,
    pub api_key: String,
    pub client_email: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JescoSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EasyDataSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval(),
        }
    }
}

fn default_reconcile_interval() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_interval")]
    pub interval_secs: u64,
    /// Age past which a still-unconfirmed order is optimistically completed
    #[serde(default = "default_fallback_age")]
    pub max_age_mins: i64,
    /// Networks whose provider has no dependable status channel
    #[serde(default = "default_fallback_networks")]
    pub networks: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_fallback_interval(),
            max_age_mins: default_fallback_age(),
            networks: default_fallback_networks(),
        }
    }
}

fn default_fallback_interval() -> u64 {
    300
}

fn default_fallback_age() -> i64 {
    30
}

fn default_fallback_networks() -> Vec<String> {
    vec!["telecel".to_string(), "bigtime".to_string()]
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables with a VELA prefix,
            // e.g. VELA_PROVIDERS__JAYBART__API_KEY
            .add_source(config::Environment::with_prefix("VELA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
