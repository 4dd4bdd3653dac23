use std::env;
use std::time::Duration;

/// Default upstream connect timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default upstream read (idle) timeout in seconds
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
/// Default maximum number of redirects followed per fetch
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    /// Absolute prefix for proxy URLs written into manifests.
    /// Empty means manifests carry relative `/proxy?...` references.
    pub base_url: String,
    pub is_dev: bool,
    /// Upstream TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Upstream idle timeout between body reads
    pub read_timeout: Duration,
    /// Redirect hops followed before giving up
    pub max_redirects: usize,
    /// Reject targets that are private or loopback IP literals
    pub block_private_targets: bool,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, PORT defaults to 3000. In PROD mode it is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env_bool("DEV_MODE");

        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());

        let base_url = env::var("BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let connect_timeout = Duration::from_secs(env_parse(
            "UPSTREAM_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        ));
        let read_timeout = Duration::from_secs(env_parse(
            "UPSTREAM_READ_TIMEOUT_SECS",
            DEFAULT_READ_TIMEOUT_SECS,
        ));
        let max_redirects = env_parse("UPSTREAM_MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS);

        let block_private_targets = env_bool("BLOCK_PRIVATE_TARGETS");

        Ok(Config {
            port,
            bind_addr,
            base_url,
            is_dev,
            connect_timeout,
            read_timeout,
            max_redirects,
            block_private_targets,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_addr: "0.0.0.0".to_string(),
            base_url: String::new(),
            is_dev: true,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            block_private_targets: false,
        }
    }
}

fn env_bool(key: &str) -> bool {
    env::var(key)
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
