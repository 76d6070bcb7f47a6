//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `cache_prefix` is empty
    /// - `scope` is not an absolute http(s) URL
    /// - a reserved namespace shadows a current namespace name
    ///
    /// Returns `ConfigError::Missing` if either version string is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }

        if self.static_version.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_version".into(),
                hint: "Set OFFCACHE_STATIC_VERSION environment variable".into(),
            });
        }
        if self.dynamic_version.is_empty() {
            return Err(ConfigError::Missing {
                field: "dynamic_version".into(),
                hint: "Set OFFCACHE_DYNAMIC_VERSION environment variable".into(),
            });
        }

        match url::Url::parse(&self.scope) {
            Ok(scope) if matches!(scope.scheme(), "http" | "https") => {}
            Ok(scope) => {
                return Err(ConfigError::Invalid {
                    field: "scope".into(),
                    reason: format!("unsupported scheme: {}", scope.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "scope".into(), reason: e.to_string() }),
        }

        let current = [self.static_namespace(), self.dynamic_namespace()];
        if let Some(name) = self.reserved_namespaces.iter().find(|name| current.contains(name)) {
            return Err(ConfigError::Invalid {
                field: "reserved_namespaces".into(),
                reason: format!("{name} is already a current namespace"),
            });
        }

        if self.precache_cdn_count > self.cdn_assets.len() {
            tracing::warn!(
                precache_cdn_count = self.precache_cdn_count,
                cdn_assets = self.cdn_assets.len(),
                "precache_cdn_count exceeds the CDN asset list; every CDN asset will be precached"
            );
        }

        Ok(())
    }
}
