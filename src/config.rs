use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STATE_DIR: &str = ".bankperf";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
    pub session_cookie: Option<String>,
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credentials: None,
            session_cookie: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl Config {
    /// Reads `BANKPERF_*` variables; call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Some(url) = non_empty(lookup("BANKPERF_API_URL")) {
            config.api_url = url;
        }

        if let Some(raw) = non_empty(lookup("BANKPERF_TIMEOUT_SECS")) {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("BANKPERF_TIMEOUT_SECS must be a number, got {raw:?}"))?;
            config.timeout = Duration::from_secs(secs.max(1));
        }

        config.credentials = match (
            non_empty(lookup("BANKPERF_EMAIL")),
            non_empty(lookup("BANKPERF_PASSWORD")),
        ) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        config.session_cookie = non_empty(lookup("BANKPERF_SESSION"));

        if let Some(dir) = non_empty(lookup("BANKPERF_STATE_DIR")) {
            config.state_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api_url = url;
        }
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
