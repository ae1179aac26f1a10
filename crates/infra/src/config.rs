//! Backend connection configuration.

use std::time::Duration;

use anyhow::Context;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`crate::HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the inventory backend, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout applied to the whole request, body included.
    pub timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from the environment.
    ///
    /// `STOCKFLOW_BACKEND_URL` is required; `STOCKFLOW_BACKEND_TIMEOUT_SECS`
    /// overrides the 30 second default.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("STOCKFLOW_BACKEND_URL")
            .context("STOCKFLOW_BACKEND_URL is not set")?;
        let mut config = Self::new(base_url);
        if let Ok(raw) = std::env::var("STOCKFLOW_BACKEND_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .context("STOCKFLOW_BACKEND_TIMEOUT_SECS must be an integer")?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slash_from_base_url() {
        let config = HttpBackendConfig::new("http://inventory.local/api/");
        assert_eq!(config.base_url, "http://inventory.local/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn with_timeout_overrides_default() {
        let config =
            HttpBackendConfig::new("http://inventory.local").with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
