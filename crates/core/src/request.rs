//! Request descriptors handed to the classifier, the strategies and the store.

use url::Url;

use crate::Error;
use crate::cache::hash::compute_fingerprint;

/// An outgoing request as the engine sees it.
///
/// The URL never carries a fragment, so two requests that differ only in
/// `#...` share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new() }
    }

    /// A `GET` for the given URL.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Parse an absolute URL string into a request.
    pub fn parse(method: &str, url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(method, url))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the `Accept` header asks for an HTML document.
    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }

    /// Only http(s) requests ever reach the network layer.
    pub fn is_network_addressable(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Key under which this request's response is stored.
    pub fn fingerprint(&self) -> String {
        compute_fingerprint(&self.method, self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_stripped() {
        let a = RequestDescriptor::parse("get", "https://example.com/app/#top").unwrap();
        let b = RequestDescriptor::parse("GET", "https://example.com/app/").unwrap();
        assert_eq!(a.method, "GET");
        assert_eq!(a.url.fragment(), None);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = RequestDescriptor::parse("GET", "https://example.com/")
            .unwrap()
            .with_header("Accept", "text/html,application/xhtml+xml");
        assert_eq!(req.header("accept"), Some("text/html,application/xhtml+xml"));
        assert!(req.accepts_html());
    }

    #[test]
    fn test_missing_accept_is_not_html() {
        let req = RequestDescriptor::parse("GET", "https://example.com/data.json").unwrap();
        assert!(!req.accepts_html());
    }

    #[test]
    fn test_network_addressable() {
        assert!(RequestDescriptor::parse("GET", "http://example.com/").unwrap().is_network_addressable());
        assert!(!RequestDescriptor::parse("GET", "chrome-extension://abc/x.js").unwrap().is_network_addressable());
        assert!(!RequestDescriptor::parse("GET", "data:text/plain,hi").unwrap().is_network_addressable());
    }

    #[test]
    fn test_parse_invalid() {
        let result = RequestDescriptor::parse("GET", "not a url");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
