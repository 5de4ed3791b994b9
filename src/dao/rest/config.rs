use std::time::Duration;

use super::error::{RestDaoError, RestResult};

const DEFAULT_POLL_MILLIS: u64 = 1_000;

/// Runtime configuration describing how to reach the PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Root URL of the PostgREST service.
    pub base_url: String,
    /// Key sent as `apikey` and bearer token, when set.
    pub api_key: Option<String>,
    /// Interval between change-feed polls.
    pub poll_interval: Duration,
}

impl RestConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_MILLIS),
        }
    }

    /// Attach the API key sent as `apikey` and bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> RestResult<Self> {
        let base_url = std::env::var("REST_BASE_URL").map_err(|_| RestDaoError::MissingEnvVar {
            var: "REST_BASE_URL",
        })?;
        let mut config = Self::new(base_url);

        if let Ok(api_key) = std::env::var("REST_API_KEY") {
            config = config.with_api_key(api_key);
        }

        if let Ok(raw) = std::env::var("REST_POLL_MILLIS") {
            let millis = raw
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or(RestDaoError::InvalidEnvVar {
                    var: "REST_POLL_MILLIS",
                    value: raw,
                })?;
            config.poll_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
