//! Asset manifest, namespace version pair and application shell, resolved
//! from [`AppConfig`] once at construction.

use offcache_core::{AppConfig, Error, ResponseSnapshot};
use url::Url;

use crate::fetch::{UrlError, resolve};

fn invalid(field: &str, entry: &str, err: &UrlError) -> Error {
    Error::InvalidUrl(format!("{field} entry {entry:?}: {err}"))
}

/// URLs populated at install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    /// Populated in full into the static namespace.
    pub static_assets: Vec<Url>,
    /// Library URLs; only the first `precache_count` are populated eagerly.
    pub cdn_assets: Vec<Url>,
    pub precache_count: usize,
}

impl AssetManifest {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = scope(config)?;
        let static_assets = config
            .static_assets
            .iter()
            .map(|asset| resolve(&scope, asset).map_err(|e| invalid("static_assets", asset, &e)))
            .collect::<Result<Vec<_>, _>>()?;
        let cdn_assets = config
            .cdn_assets
            .iter()
            .map(|asset| resolve(&scope, asset).map_err(|e| invalid("cdn_assets", asset, &e)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { static_assets, cdn_assets, precache_count: config.precache_cdn_count })
    }

    /// The bounded prefix of the CDN list populated at install.
    pub fn precached_cdn_assets(&self) -> &[Url] {
        &self.cdn_assets[..self.precache_count.min(self.cdn_assets.len())]
    }
}

/// The current namespace names plus legacy names that must survive activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePair {
    pub static_name: String,
    pub dynamic_name: String,
    pub reserved: Vec<String>,
}

impl NamespacePair {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            static_name: config.static_namespace(),
            dynamic_name: config.dynamic_namespace(),
            reserved: config.reserved_namespaces.clone(),
        }
    }

    /// Whether activation must keep this namespace.
    pub fn is_retained(&self, name: &str) -> bool {
        name == self.static_name || name == self.dynamic_name || self.reserved.iter().any(|r| r == name)
    }
}

/// The application's entry point and its offline stand-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppShell {
    pub scope: Url,
    pub entry_point: Url,
    pub offline_body: String,
}

impl AppShell {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = scope(config)?;
        let entry_point =
            resolve(&scope, &config.entry_point).map_err(|e| invalid("entry_point", &config.entry_point, &e))?;
        Ok(Self { scope, entry_point, offline_body: config.offline_body.clone() })
    }

    /// The scope root and the entry-point file both designate the shell.
    pub fn is_entry_point(&self, url: &Url) -> bool {
        url.origin() == self.entry_point.origin()
            && (url.path() == self.entry_point.path() || url.path() == self.scope.path())
    }

    /// Synthesized response served when the shell is neither cached nor reachable.
    pub fn offline_response(&self) -> ResponseSnapshot {
        ResponseSnapshot::new(
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            self.offline_body.clone(),
        )
    }
}

fn scope(config: &AppConfig) -> Result<Url, Error> {
    let mut scope = Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("scope: {e}")))?;
    if !scope.path().ends_with('/') {
        let path = format!("{}/", scope.path());
        scope.set_path(&path);
    }
    Ok(scope)
}
