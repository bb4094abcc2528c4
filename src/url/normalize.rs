use crate::url::origin::origin_root;
use crate::UrlError;
use url::Url;

/// Normalizes a resource URI into the key used for storage and the visited set
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and trailing slashes
/// 2. Parse the URL; reject if malformed
/// 3. Require an `http` or `https` scheme
/// 4. Require a host
///
/// Scheme and host are lowercased by the parser. The path, query and
/// fragment are otherwise kept verbatim, since Redfish services treat them
/// as opaque identifiers.
///
/// # Examples
///
/// ```
/// use redfish_diver::url::normalize_uri;
///
/// let url = normalize_uri("https://BMC.lab/redfish/v1/").unwrap();
/// assert_eq!(url.as_str(), "https://bmc.lab/redfish/v1");
/// ```
pub fn normalize_uri(uri: &str) -> Result<Url, UrlError> {
    let trimmed = uri.trim().trim_end_matches('/');

    let url = Url::parse(trimmed).map_err(|e| UrlError::Parse(format!("{}: {}", uri, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Resolves a link value found in a resource body into a normalized URI
///
/// Absolute `http(s)` values are kept as they are; anything else is resolved
/// against the origin root of `base`. Returns `None` when the value cannot
/// form an `http(s)` URI.
pub fn resolve_link(value: &str, base: &Url) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let root = origin_root(base)?;
    let joined = root.join(value).ok()?;
    normalize_uri(joined.as_str()).ok()
}
