//! Runtime settings of the HTTP lifecycle engine

use crate::constants;
use std::time::Duration;

/// Engine tuning knobs; everything document- or user-independent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Delay between polling probes
    pub poll_interval: Duration,
    /// Operation timeout when the document declares none
    pub default_operation_timeout: Duration,
    /// Product version advertised in the `User-Agent`
    pub version: String,
    pub insecure_skip_verify: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(constants::DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Duration::from_millis(constants::DEFAULT_REQUEST_TIMEOUT_MS),
            poll_interval: Duration::from_secs(constants::DEFAULT_POLL_INTERVAL_SECS),
            default_operation_timeout: Duration::from_secs(
                constants::DEFAULT_OPERATION_TIMEOUT_SECS,
            ),
            version: env!("CARGO_PKG_VERSION").to_string(),
            insecure_skip_verify: false,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub const fn with_insecure_skip_verify(mut self, insecure: bool) -> Self {
        self.insecure_skip_verify = insecure;
        self
    }

    /// `User-Agent` sent with every request
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "OpenAPI Terraform Provider/{} ({}/{})",
            self.version,
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }
}
