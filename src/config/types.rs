use serde::Deserialize;

/// Main configuration structure for Redfish-Diver
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub proxy: ProxyConfig,
    pub storage: StorageConfig,
}

/// HTTP client behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request timeout in seconds; zero or negative disables the timeout
    pub timeout: i64,

    /// Accept self-signed and otherwise invalid TLS certificates
    ///
    /// Defaults to `true`: management controllers on lab networks almost
    /// always present self-signed certificates.
    #[serde(rename = "accept-invalid-certs")]
    pub accept_invalid_certs: bool,

    /// User-Agent sent when a request does not carry its own
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: 3600,
            accept_invalid_certs: true,
            user_agent: format!("redfish-diver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub uri: String,
    pub username: String,
    pub password: String,
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./data/redfish-diver.db".to_string(),
        }
    }
}
