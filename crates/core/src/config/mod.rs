//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The namespace version pair and the asset manifest are handed to each
//! component at construction.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the application; relative static assets resolve against it.
    ///
    /// Set via OFFCACHE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Prefix shared by every namespace name this instance owns.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version embedded in the static namespace name.
    ///
    /// Set via OFFCACHE_STATIC_VERSION environment variable.
    #[serde(default = "default_version")]
    pub static_version: String,

    /// Version embedded in the dynamic namespace name.
    ///
    /// Set via OFFCACHE_DYNAMIC_VERSION environment variable.
    #[serde(default = "default_version")]
    pub dynamic_version: String,

    /// Legacy namespace names that activation never deletes.
    #[serde(default)]
    pub reserved_namespaces: Vec<String>,

    /// Application-shell assets, populated in full at install.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Third-party library assets served stale-while-revalidate.
    #[serde(default = "default_cdn_assets")]
    pub cdn_assets: Vec<String>,

    /// How many leading `cdn_assets` are populated eagerly at install.
    #[serde(default = "default_precache_cdn_count")]
    pub precache_cdn_count: usize,

    /// File name of the application entry point.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Substring marking icon-family assets.
    #[serde(default = "default_icon_marker")]
    pub icon_marker: String,

    /// Body of the synthesized offline response for the entry point.
    #[serde(default = "default_offline_body")]
    pub offline_body: String,

    /// Activate immediately after a successful install.
    ///
    /// Set via OFFCACHE_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// User-Agent string for origin requests.
    ///
    /// Set via OFFCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via OFFCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OFFCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_cache_prefix() -> String {
    "app".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_static_assets() -> Vec<String> {
    ["./", "./index.html", "./manifest.json", "./icon-32.png", "./icon-192.png", "./icon-512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cdn_assets() -> Vec<String> {
    [
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
        "https://cdnjs.cloudflare.com/ajax/libs/pdf.js/2.16.105/pdf.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/pdf.js/2.16.105/pdf.worker.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/jszip/3.10.1/jszip.min.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_precache_cdn_count() -> usize {
    2
}

fn default_entry_point() -> String {
    "index.html".into()
}

fn default_icon_marker() -> String {
    "icon-".into()
}

fn default_offline_body() -> String {
    "App offline - reload when you are back online".into()
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scope: default_scope(),
            cache_prefix: default_cache_prefix(),
            static_version: default_version(),
            dynamic_version: default_version(),
            reserved_namespaces: Vec::new(),
            static_assets: default_static_assets(),
            cdn_assets: default_cdn_assets(),
            precache_cdn_count: default_precache_cdn_count(),
            entry_point: default_entry_point(),
            icon_marker: default_icon_marker(),
            offline_body: default_offline_body(),
            skip_waiting: true,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the current static namespace, e.g. `app-static-v1`.
    pub fn static_namespace(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.static_version)
    }

    /// Name of the current dynamic namespace, e.g. `app-dynamic-v1`.
    pub fn dynamic_namespace(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.dynamic_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCACHE_`
    /// 2. TOML file from `OFFCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./offcache.sqlite"));
        assert_eq!(config.scope, "http://localhost:8080/");
        assert_eq!(config.user_agent, "offcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.static_assets.len(), 6);
        assert_eq!(config.cdn_assets.len(), 5);
        assert_eq!(config.precache_cdn_count, 2);
        assert!(config.skip_waiting);
        assert!(config.reserved_namespaces.is_empty());
    }

    #[test]
    fn test_namespace_names_embed_versions() {
        let config = AppConfig {
            cache_prefix: "chora".into(),
            static_version: "v1.2".into(),
            dynamic_version: "v1.3".into(),
            ..Default::default()
        };
        assert_eq!(config.static_namespace(), "chora-static-v1.2");
        assert_eq!(config.dynamic_namespace(), "chora-dynamic-v1.3");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(
            r#"
            static_version = "v9"
            precache_cdn_count = 0
            reserved_namespaces = ["app-v1"]
            "#,
        ));
        let config: AppConfig = figment.extract().unwrap();
        assert_eq!(config.static_version, "v9");
        assert_eq!(config.precache_cdn_count, 0);
        assert_eq!(config.reserved_namespaces, vec!["app-v1".to_string()]);
        assert_eq!(config.dynamic_version, "v1");
    }
}
