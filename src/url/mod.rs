//! URL handling module for Redfish-Diver
//!
//! This module provides URI normalization, link resolution and origin
//! extraction. Normalized URIs are the keys of the content store and of the
//! crawl's visited set; origins are the keys of the node registry.

mod normalize;
mod origin;

// Re-export main functions
pub use normalize::{normalize_uri, resolve_link};
pub use origin::{extract_origin, origin_root};

/// Returns true if a search keyword addresses a resource rather than a filter
///
/// Only keywords that literally start with `http://` or `https://` are
/// fetched; anything else is a text filter over the current results.
///
/// # Examples
///
/// ```
/// use redfish_diver::url::is_resource_keyword;
///
/// assert!(is_resource_keyword("https://bmc.lab/redfish/v1"));
/// assert!(!is_resource_keyword("PowerState"));
/// assert!(!is_resource_keyword("ftp://bmc.lab/"));
/// ```
pub fn is_resource_keyword(keyword: &str) -> bool {
    keyword.starts_with("http://") || keyword.starts_with("https://")
}
