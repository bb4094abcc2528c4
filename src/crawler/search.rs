//! Search requests
//!
//! A `Search` is what the caller hands to the coordinator: either a resource
//! URI to fetch (optionally diving into its links) or a text filter over the
//! current results.

use crate::credentials::CredentialCipher;
use crate::storage::{CrawlError, OriginCredential, ResourceSnapshot};
use crate::url::{is_resource_keyword, normalize_uri};
use crate::{DiverError, UrlResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Header name used for conditional requests
pub const IF_MATCH: &str = "If-Match";

/// HTTP methods a search can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Converts to the HTTP client's method type
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = DiverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(DiverError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// An ordered name/value pair (header or query parameter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Serializes a list for storage
    pub fn encode_list(pairs: &[KeyValue]) -> String {
        serde_json::to_string(pairs).unwrap_or_else(|_| "[]".to_string())
    }

    /// Deserializes a stored list; missing or unreadable input gives an empty list
    pub fn decode_list(encoded: Option<&str>) -> Vec<KeyValue> {
        encoded
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// What a search keyword resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTarget {
    /// Fetch this normalized URI
    Resource(Url),
    /// Filter the current results by this text
    Filter(String),
}

/// A request issued by the caller
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Search {
    /// Resource URI, or free text for filtering
    pub keyword: String,
    pub method: HttpMethod,
    pub username: String,
    pub password: String,
    pub headers: Vec<KeyValue>,
    pub params: Vec<KeyValue>,
    pub json_body: String,
    /// Follow links depth-first after the seed fetch (GET only)
    pub is_auto_dive: bool,
    /// Resource the keyword was discovered in; informational
    pub parent_uri: Option<String>,
}

impl Search {
    /// Creates a single-shot GET search with empty credentials
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(key, value));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(KeyValue::new(key, value));
        self
    }

    pub fn with_json_body(mut self, body: impl Into<String>) -> Self {
        self.json_body = body.into();
        self
    }

    pub fn with_auto_dive(mut self, enabled: bool) -> Self {
        self.is_auto_dive = enabled;
        self
    }

    /// Sets the `If-Match` header, replacing any existing one
    pub fn with_if_match(mut self, etag: impl Into<String>) -> Self {
        self.remove_if_match();
        self.headers.push(KeyValue::new(IF_MATCH, etag));
        self
    }

    fn remove_if_match(&mut self) {
        self.headers
            .retain(|h| !h.key.eq_ignore_ascii_case(IF_MATCH));
    }

    /// Classifies the keyword
    ///
    /// Keywords starting with `http://` or `https://` are resources; anything
    /// else is a filter. A resource keyword that fails to parse is an error.
    pub fn target(&self) -> UrlResult<SearchTarget> {
        if is_resource_keyword(&self.keyword) {
            Ok(SearchTarget::Resource(normalize_uri(&self.keyword)?))
        } else {
            Ok(SearchTarget::Filter(self.keyword.clone()))
        }
    }

    /// Returns true when links should be followed after the seed fetch
    pub fn dives(&self) -> bool {
        self.is_auto_dive && self.method == HttpMethod::Get
    }

    /// Builds the search for a link discovered in `parent`
    ///
    /// Children inherit method, credentials, headers and params, never carry
    /// a body, and record their parent.
    pub fn child(&self, uri: &Url, parent: &Url) -> Self {
        Self {
            keyword: uri.to_string(),
            method: self.method,
            username: self.username.clone(),
            password: self.password.clone(),
            headers: self.headers.clone(),
            params: self.params.clone(),
            json_body: String::new(),
            is_auto_dive: self.is_auto_dive,
            parent_uri: Some(parent.to_string()),
        }
    }

    /// Rebuilds a single-shot search from a stored snapshot
    ///
    /// Any `If-Match` header is dropped; the stored password is decrypted with
    /// `cipher`.
    pub fn from_snapshot(
        snapshot: &ResourceSnapshot,
        node: &OriginCredential,
        cipher: &dyn CredentialCipher,
    ) -> Self {
        Self::replay(
            &snapshot.uri,
            &snapshot.method,
            snapshot.request_header_pairs(),
            snapshot.request_param_pairs(),
            snapshot.json_body.as_deref(),
            node,
            cipher,
        )
    }

    /// Rebuilds a single-shot search from an error log entry
    pub fn from_crawl_error(
        error: &CrawlError,
        node: &OriginCredential,
        cipher: &dyn CredentialCipher,
    ) -> Self {
        Self::replay(
            &error.uri,
            &error.method,
            KeyValue::decode_list(error.request_headers.as_deref()),
            KeyValue::decode_list(error.request_params.as_deref()),
            error.json_body.as_deref(),
            node,
            cipher,
        )
    }

    fn replay(
        uri: &str,
        method: &str,
        headers: Vec<KeyValue>,
        params: Vec<KeyValue>,
        json_body: Option<&str>,
        node: &OriginCredential,
        cipher: &dyn CredentialCipher,
    ) -> Self {
        let mut search = Self {
            keyword: uri.to_string(),
            method: method.parse().unwrap_or_default(),
            username: node.username.clone().unwrap_or_default(),
            password: cipher.decrypt(node.password.as_deref().unwrap_or_default()),
            headers,
            params,
            json_body: json_body.unwrap_or_default().to_string(),
            is_auto_dive: false,
            parent_uri: None,
        };
        search.remove_if_match();
        search
    }

    /// Serialized request headers, or `None` when there are none
    pub fn encoded_headers(&self) -> Option<String> {
        (!self.headers.is_empty()).then(|| KeyValue::encode_list(&self.headers))
    }

    /// Serialized query parameters, or `None` when there are none
    pub fn encoded_params(&self) -> Option<String> {
        (!self.params.is_empty()).then(|| KeyValue::encode_list(&self.params))
    }

    /// The JSON body, or `None` when it is blank
    pub fn body(&self) -> Option<&str> {
        let body = self.json_body.trim();
        (!body.is_empty()).then_some(self.json_body.as_str())
    }
}
