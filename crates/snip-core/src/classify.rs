//! Content classification

use url::Url;

/// Whether content should be stored as a short link rather than a paste
///
/// Content counts as a URL when, once trimmed, it is a single token that
/// parses as an absolute `http`/`https` URL with a host.
pub fn is_url(content: &str) -> bool {
    let content = content.trim();

    if content.is_empty() || content.chars().any(char::is_whitespace) {
        return false;
    }

    match Url::parse(content) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
