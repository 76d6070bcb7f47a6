//! Request fingerprints used as entry keys.

use sha2::{Digest, Sha256};

/// Compute the fingerprint of a request from its method and normalized URL.
pub fn compute_fingerprint(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
