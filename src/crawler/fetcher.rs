//! HTTP request executor
//!
//! This module performs single HTTP calls for the crawler, including:
//! - Building the HTTP client from the client and proxy configuration
//! - Attaching basic auth, headers, query parameters and the JSON body
//! - Classifying the outcome into a snapshot or an error log entry

use crate::config::Config;
use crate::crawler::parser::is_json_text;
use crate::crawler::search::{KeyValue, Search};
use crate::storage::{CrawlError, ResourceSnapshot};
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Result of one request
#[derive(Debug)]
pub enum FetchOutcome {
    /// A 2xx/3xx response
    Success(ResourceSnapshot),

    /// No response, or a response with any other status
    Failure(CrawlError),
}

/// Builds an HTTP client with proper configuration
///
/// # Client Settings
///
/// | Setting | Source |
/// |---------|--------|
/// | Timeout | `client.timeout` seconds; `<= 0` disables it |
/// | Certificate validation | off while `client.accept-invalid-certs` is true |
/// | User agent | `client.user-agent` |
/// | Proxy | `[proxy]` when enabled, with basic auth if a username is set |
///
/// System proxy settings are ignored when the proxy is disabled.
///
/// # Arguments
///
/// * `config` - The application configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. bad proxy URI)
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.client.user_agent.as_str())
        .danger_accept_invalid_certs(config.client.accept_invalid_certs)
        .gzip(true)
        .brotli(true);

    if config.client.timeout > 0 {
        builder = builder.timeout(Duration::from_secs(config.client.timeout as u64));
    }

    if config.proxy.enabled {
        let mut proxy = Proxy::all(config.proxy.uri.as_str())?;
        if !config.proxy.username.is_empty() {
            proxy = proxy.basic_auth(&config.proxy.username, &config.proxy.password);
        }
        builder = builder.proxy(proxy);
    } else {
        builder = builder.no_proxy();
    }

    builder.build()
}

/// Describes a failed status code
///
/// 408 shares the 407 text.
pub fn status_text(status: u16) -> &'static str {
    match status {
        400 => "request is malformed",
        401 => "authentication failed or access denied",
        403 => "access is forbidden",
        404 => "resource not found",
        405 => "method not allowed",
        407 | 408 => "proxy authentication required",
        _ => "request failed",
    }
}

/// Formats the error log message for a failed status code
pub fn status_message(status: u16) -> String {
    format!("{}, {}", status, status_text(status))
}

fn collect_headers(headers: &HeaderMap) -> Vec<KeyValue> {
    headers
        .iter()
        .map(|(name, value)| {
            KeyValue::new(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        })
        .collect()
}

fn declares_json(headers: &[KeyValue]) -> bool {
    headers.iter().any(|h| {
        h.key.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
            && h.value.to_ascii_lowercase().contains("application/json")
    })
}

/// Response fields shared by snapshots and error entries
struct Received {
    status_code: u16,
    headers: Vec<KeyValue>,
    content: String,
    is_json: bool,
}

impl Received {
    fn none() -> Self {
        Self {
            status_code: 0,
            headers: Vec::new(),
            content: String::new(),
            is_json: false,
        }
    }
}

fn failure(search: &Search, uri: &Url, proxy_enabled: bool, message: String, received: Received) -> CrawlError {
    CrawlError {
        created: Utc::now(),
        message,
        proxy_enabled,
        method: search.method.to_string(),
        uri: uri.to_string(),
        parent_uri: search.parent_uri.clone(),
        request_headers: search.encoded_headers(),
        request_params: search.encoded_params(),
        json_body: search.body().map(str::to_string),
        status_code: received.status_code,
        response_headers: KeyValue::encode_list(&received.headers),
        content: received.content,
        is_json: received.is_json,
    }
}

/// Executes one request described by a search
///
/// # Request Flow
///
/// 1. Attach basic auth (always, with empty strings if no credentials)
/// 2. Attach headers and query parameters in order
/// 3. Send a non-blank JSON body as `application/json`
/// 4. Classify the response
///
/// # Classification
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | 2xx or 3xx | Success |
/// | Other status | Failure, `"{status}, {text}"` |
/// | No response | Failure, transport error text, status 0 |
/// | Body could not be read | Failure, transport error text |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `search` - Method, credentials, headers, params and body
/// * `uri` - The normalized target
/// * `proxy_enabled` - Recorded on failures
pub async fn execute(client: &Client, search: &Search, uri: &Url, proxy_enabled: bool) -> FetchOutcome {
    match &search.parent_uri {
        Some(parent) => info!("{}, {} ({})", search.method, uri, parent),
        None => info!("{}, {}", search.method, uri),
    }

    let mut request = client
        .request(search.method.to_reqwest(), uri.clone())
        .basic_auth(&search.username, Some(&search.password));

    for header in &search.headers {
        request = request.header(header.key.as_str(), header.value.as_str());
    }

    if !search.params.is_empty() {
        let params: Vec<(&str, &str)> = search
            .params
            .iter()
            .map(|p| (p.key.as_str(), p.value.as_str()))
            .collect();
        request = request.query(&params);
    }

    if let Some(body) = search.body() {
        request = request
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("{}, {} failed: {}", search.method, uri, e);
            return FetchOutcome::Failure(failure(search, uri, proxy_enabled, e.to_string(), Received::none()));
        }
    };

    let status = response.status();
    let headers = collect_headers(response.headers());
    info!("{} {}", status.as_u16(), uri);

    let content = match response.text().await {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read body of {}: {}", uri, e);
            let received = Received {
                status_code: status.as_u16(),
                headers,
                ..Received::none()
            };
            return FetchOutcome::Failure(failure(search, uri, proxy_enabled, e.to_string(), received));
        }
    };
    debug!("{}", content);

    let is_json = declares_json(&headers) || is_json_text(&content);

    if status.is_success() || status.is_redirection() {
        FetchOutcome::Success(ResourceSnapshot {
            uri: uri.to_string(),
            method: search.method.to_string(),
            request_headers: search.encoded_headers(),
            request_params: search.encoded_params(),
            json_body: search.body().map(str::to_string),
            status_code: status.as_u16(),
            response_headers: KeyValue::encode_list(&headers),
            is_json,
            content,
            updated: Utc::now(),
            previous_content: None,
            previous_updated: None,
        })
    } else {
        let message = status_message(status.as_u16());
        warn!("{}, {}: {}", search.method, uri, message);
        let received = Received {
            status_code: status.as_u16(),
            headers,
            content,
            is_json,
        };
        FetchOutcome::Failure(failure(search, uri, proxy_enabled, message, received))
    }
}
