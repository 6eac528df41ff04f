//! obs-websocket connection settings

use std::time::Duration;

/// Default obs-websocket port (v5)
pub const DEFAULT_OBS_PORT: u16 = 4455;

/// Connection options for the OBS client
#[derive(Clone)]
pub struct ObsConfig {
    /// Host name or IP of the machine running OBS
    pub address: String,

    /// obs-websocket port
    pub port: u16,

    /// obs-websocket password (None if authentication is disabled)
    pub password: Option<String>,

    /// Upper bound for TCP connect plus the Hello/Identify handshake
    pub connect_timeout: Duration,

    /// Upper bound for a single request/response round trip
    pub request_timeout: Duration,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_OBS_PORT,
            password: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ObsConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// WebSocket URL for this endpoint
    ///
    /// IPv6 literals are bracketed.
    pub fn url(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("ws://[{}]:{}", self.address, self.port)
        } else {
            format!("ws://{}:{}", self.address, self.port)
        }
    }
}

// Never print the password
impl std::fmt::Debug for ObsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObsConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObsConfig::default();

        assert_eq!(config.url(), "ws://127.0.0.1:4455");
        assert!(config.password.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ObsConfig::new("obs.local", 4444)
            .password("secret")
            .connect_timeout(Duration::from_secs(3))
            .request_timeout(Duration::from_secs(1));

        assert_eq!(config.url(), "ws://obs.local:4444");
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_ipv6_url() {
        assert_eq!(ObsConfig::new("::1", 4455).url(), "ws://[::1]:4455");
        assert_eq!(ObsConfig::new("[fe80::1]", 4455).url(), "ws://[fe80::1]:4455");
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ObsConfig::default().password("hunter2");

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }
}
