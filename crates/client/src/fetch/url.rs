//! URL canonicalization for consistent fingerprints and manifest matching.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so equal resources compare equal.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Resolve a manifest entry (absolute, or relative like `./index.html`)
/// against the application scope, then canonicalize it.
pub fn resolve(scope: &Url, reference: &str) -> Result<Url, UrlError> {
    let trimmed = reference.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = scope.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(joined)
}

fn normalize(mut parsed: Url) -> Result<Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
