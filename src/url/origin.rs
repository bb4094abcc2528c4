use url::Url;

/// Extracts the origin (`scheme://host[:port]`) of a URL
///
/// Default ports are omitted and the host is already lowercased by the URL
/// parser, so two spellings of the same endpoint yield the same origin key.
/// Returns `None` for URLs without a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use redfish_diver::url::extract_origin;
///
/// let url = Url::parse("https://BMC.lab:8443/redfish/v1").unwrap();
/// assert_eq!(extract_origin(&url), Some("https://bmc.lab:8443".to_string()));
///
/// let url = Url::parse("https://bmc.lab:443/redfish/v1").unwrap();
/// assert_eq!(extract_origin(&url), Some("https://bmc.lab".to_string()));
/// ```
pub fn extract_origin(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Returns the root of a URL's origin (`scheme://host[:port]/`)
///
/// Relative link values are resolved against this root rather than against
/// the resource itself.
pub fn origin_root(url: &Url) -> Option<Url> {
    let origin = extract_origin(url)?;
    Url::parse(&format!("{}/", origin)).ok()
}
