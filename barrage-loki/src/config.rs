use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

pub const LOKI_URL_ENV: &str = "LOKI_URL";
pub const LOKI_TOKEN_ENV: &str = "LOKI_TOKEN";
pub const LOKI_BASIC_AUTH_ENV: &str = "LOKI_BASIC_AUTH";
pub const LOKI_TENANT_ID_ENV: &str = "LOKI_TENANT_ID";

/// Connection and batching settings of a [`LokiClient`](crate::LokiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LokiConfig {
    /// Loki base URL, or the full push endpoint.
    pub url: String,
    /// Bearer token.
    pub token: String,
    /// `login:password`
    pub basic_auth: String,
    /// Sent as `X-Scope-OrgID`; empty means single tenant mode.
    pub tenant_id: String,
    /// Push failures tolerated before entries are rejected. `-1` tolerates any number.
    pub max_errors: i64,
    /// Longest time an entry waits before its batch is pushed.
    pub batch_wait: Duration,
    /// Bytes of log lines that trigger an early push.
    pub batch_size: usize,
    /// Timeout of one push request.
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
    pub queue_capacity: usize,
    /// Lines longer than this are dropped.
    pub max_line_size: usize,
    pub insecure_skip_verify: bool,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            basic_auth: String::new(),
            tenant_id: String::new(),
            max_errors: 5,
            batch_wait: Duration::from_secs(3),
            batch_size: 500 * 1024,
            timeout: Duration::from_secs(20),
            headers: BTreeMap::new(),
            queue_capacity: 10_000,
            max_line_size: 999_999,
            insecure_skip_verify: false,
        }
    }
}

impl LokiConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Defaults, with the connection settings read from `LOKI_URL`, `LOKI_TOKEN`,
    /// `LOKI_BASIC_AUTH` and `LOKI_TENANT_ID`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup(LOKI_URL_ENV).unwrap_or_default(),
            token: lookup(LOKI_TOKEN_ENV).unwrap_or_default(),
            basic_auth: lookup(LOKI_BASIC_AUTH_ENV).unwrap_or_default(),
            tenant_id: lookup(LOKI_TENANT_ID_ENV).unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn basic_auth(mut self, basic_auth: impl Into<String>) -> Self {
        self.basic_auth = basic_auth.into();
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn max_errors(mut self, max_errors: i64) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn batch_wait(mut self, batch_wait: Duration) -> Self {
        self.batch_wait = batch_wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LokiConfig::default();
        assert_eq!(config.max_errors, 5);
        assert_eq!(config.batch_wait, Duration::from_secs(3));
        assert_eq!(config.batch_size, 512_000);
        assert_eq!(config.timeout, Duration::from_secs(20));
    }

    #[test]
    fn reads_environment() {
        let env = BTreeMap::from([
            (LOKI_URL_ENV, "http://localhost:3100"),
            (LOKI_TENANT_ID_ENV, "team-a"),
            (LOKI_BASIC_AUTH_ENV, "admin:secret"),
        ]);
        let config = LokiConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.url, "http://localhost:3100");
        assert_eq!(config.tenant_id, "team-a");
        assert_eq!(config.basic_auth, "admin:secret");
        assert!(config.token.is_empty());
        assert_eq!(config.max_errors, 5);
    }
}
