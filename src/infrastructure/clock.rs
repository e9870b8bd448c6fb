use crate::infrastructure::error::ClockError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::sync::Mutex;

const DEFAULT_SYNC_ENDPOINT: &str = "https://www.googleapis.com/generate_204";

/// Wall-clock time plus a network correction hook. `now()` must stay
/// cheap and infallible; `sync()` is only invoked from the API tier.
#[async_trait]
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sync(&self) -> Result<(), ClockError>;
}

/// System clock corrected by an offset derived from the `Date` header
/// of an HTTPS response. Second-level resolution, which is well inside
/// the display's minute precision.
pub struct HttpClockSource {
    client: Client,
    endpoint: String,
    request_timeout: std::time::Duration,
    offset: Mutex<Duration>,
}

impl HttpClockSource {
    pub fn new(request_timeout: std::time::Duration) -> Self {
        Self::with_endpoint(DEFAULT_SYNC_ENDPOINT, request_timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, request_timeout: std::time::Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            request_timeout,
            offset: Mutex::new(Duration::zero()),
        }
    }
}

#[async_trait]
impl ClockSource for HttpClockSource {
    fn now(&self) -> DateTime<Utc> {
        let offset = self
            .offset
            .lock()
            .map(|offset| *offset)
            .unwrap_or_else(|_| Duration::zero());
        Utc::now() + offset
    }

    async fn sync(&self) -> Result<(), ClockError> {
        let response = self
            .client
            .head(&self.endpoint)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ClockError::Timeout
                } else {
                    ClockError::Network(error.to_string())
                }
            })?;

        let date_header = response
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ClockError::Network("response carried no Date header".to_string()))?;

        let server_time = DateTime::parse_from_rfc2822(date_header)
            .map_err(|error| ClockError::Network(format!("unparseable Date header: {error}")))?
            .with_timezone(&Utc);

        let correction = server_time - Utc::now();
        let mut offset = self
            .offset
            .lock()
            .map_err(|error| ClockError::Network(format!("offset lock poisoned: {error}")))?;
        *offset = correction;
        tracing::debug!(offset_secs = correction.num_seconds(), "clock offset updated");
        Ok(())
    }
}
