//! Request classification.
//!
//! Maps a request to the strategy that will serve it:
//!
//! 1. Exact static-manifest URL, or URL containing the icon marker: cache-first
//! 2. Final path segment equal to that of a CDN asset: stale-while-revalidate
//! 3. Anything else: network-first
//!
//! Requests outside http(s) are not classified at all.

use std::collections::HashSet;

use offcache_core::RequestDescriptor;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::manifest::AssetManifest;

/// Which algorithm serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyTag {
    CacheFirst,
    StaleWhileRevalidate,
    NetworkFirst,
}

/// Pure classifier over the static and CDN URL lists.
#[derive(Debug, Clone)]
pub struct Classifier {
    static_urls: HashSet<Url>,
    cdn_segments: HashSet<String>,
    icon_marker: String,
}

impl Classifier {
    pub fn new(manifest: &AssetManifest, icon_marker: &str) -> Self {
        Self {
            static_urls: manifest.static_assets.iter().cloned().collect(),
            cdn_segments: manifest
                .cdn_assets
                .iter()
                .filter_map(final_segment)
                .map(str::to_string)
                .collect(),
            icon_marker: icon_marker.to_string(),
        }
    }

    /// Classify a request, or `None` when it must pass through untouched.
    pub fn classify(&self, request: &RequestDescriptor) -> Option<StrategyTag> {
        if !request.is_network_addressable() {
            return None;
        }

        let url = &request.url;
        if self.static_urls.contains(url) || (!self.icon_marker.is_empty() && url.as_str().contains(&self.icon_marker))
        {
            return Some(StrategyTag::CacheFirst);
        }

        if final_segment(url).is_some_and(|segment| self.cdn_segments.contains(segment)) {
            return Some(StrategyTag::StaleWhileRevalidate);
        }

        Some(StrategyTag::NetworkFirst)
    }
}

fn final_segment(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
}
