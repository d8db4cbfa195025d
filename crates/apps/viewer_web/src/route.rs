//! Standalone route: an opaque content hash resolved to an image URL by the
//! image service.

use gloo_net::http::Request;
use serde::Deserialize;

pub const NO_HASH: &str = "No hash provided";
pub const LOOKUP_FAILED: &str = "Failed to load image from server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    NoHash,
    Lookup(String),
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::NoHash => f.write_str(NO_HASH),
            RouteError::Lookup(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for RouteError {}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HashLookup {
    image_url: Option<String>,
    message: Option<String>,
}

pub fn hash_lookup_url(api_base: &str, hash: &str) -> Result<String, RouteError> {
    let hash = hash.trim();
    if hash.is_empty() {
        return Err(RouteError::NoHash);
    }
    Ok(format!("{}/images/hash/{hash}", api_base.trim_end_matches('/')))
}

/// Reads the lookup response body. Error bodies carry an optional
/// `message`; anything unreadable falls back to a generic failure.
pub fn interpret_lookup(ok: bool, body: &str) -> Result<String, RouteError> {
    let lookup: HashLookup = serde_json::from_str(body).unwrap_or_default();
    if !ok {
        let message = lookup
            .message
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(|| LOOKUP_FAILED.to_string());
        return Err(RouteError::Lookup(message));
    }
    lookup
        .image_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| RouteError::Lookup(LOOKUP_FAILED.to_string()))
}

pub async fn resolve_hash(api_base: &str, hash: &str) -> Result<String, RouteError> {
    let url = hash_lookup_url(api_base, hash)?;
    let resp = Request::get(&url).send().await.map_err(|e| {
        tracing::warn!(%url, error = %e, "hash lookup request failed");
        RouteError::Lookup(LOOKUP_FAILED.to_string())
    })?;
    let ok = resp.ok();
    let text = resp.text().await.unwrap_or_default();
    interpret_lookup(ok, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_url_joins_base_and_hash() {
        assert_eq!(
            hash_lookup_url("https://api.example.com/", "ab12").unwrap(),
            "https://api.example.com/images/hash/ab12"
        );
        assert_eq!(hash_lookup_url("/api", " ab12 ").unwrap(), "/api/images/hash/ab12");
    }

    #[test]
    fn empty_hash_is_rejected() {
        assert_eq!(hash_lookup_url("/api", "").unwrap_err(), RouteError::NoHash);
        assert_eq!(hash_lookup_url("/api", "   ").unwrap_err().to_string(), NO_HASH);
    }

    #[test]
    fn successful_lookup_yields_image_url() {
        let body = r#"{"imageUrl":"https://cdn.example.com/pano.jpg","title":"Lobby"}"#;
        assert_eq!(interpret_lookup(true, body).unwrap(), "https://cdn.example.com/pano.jpg");
    }

    #[test]
    fn server_message_is_surfaced() {
        let err = interpret_lookup(false, r#"{"message":"Image not found"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Image not found");
    }

    #[test]
    fn unreadable_failures_fall_back_to_generic_message() {
        assert_eq!(interpret_lookup(false, "<html>502</html>").unwrap_err().to_string(), LOOKUP_FAILED);
        assert_eq!(interpret_lookup(false, r#"{"message":""}"#).unwrap_err().to_string(), LOOKUP_FAILED);
        assert_eq!(interpret_lookup(true, "{}").unwrap_err().to_string(), LOOKUP_FAILED);
    }
}
