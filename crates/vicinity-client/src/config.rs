//! Client configuration loaded from environment variables.
//!
//! One base URL drives both the HTTP directory API and the channel
//! endpoint, with a localhost default for development.

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server, without a trailing slash.
    /// Env: `VICINITY_API_URL`
    /// Default: `http://127.0.0.1:8080`
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VICINITY_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Root of the HTTP directory API.
    pub fn api_base(&self) -> String {
        format!("{}/api", self.base_url)
    }

    /// Channel endpoint for the given user.
    pub fn ws_url(&self, user_id: i64) -> String {
        // http -> ws and https -> wss.
        let ws_base = self.base_url.replacen("http", "ws", 1);
        format!("{ws_base}/ws?user_id={user_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base(), "http://127.0.0.1:8080/api");
        assert_eq!(config.ws_url(7), "ws://127.0.0.1:8080/ws?user_id=7");
    }

    #[test]
    fn test_tls_base_upgrades_to_wss() {
        let config = ClientConfig {
            base_url: "https://vicinity.example".to_string(),
        };
        assert_eq!(config.ws_url(1), "wss://vicinity.example/ws?user_id=1");
    }
}
