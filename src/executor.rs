use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};
use url::Url;

use crate::{AppError, Result};

pub const RATE_LIMIT_STATUS: u16 = 429;

/// Upper bound of the exponential part of a rate-limit wait.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// One GET against a Slack API method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub method: String,
    pub params: Vec<(String, String)>,
}

impl PageRequest {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            params: Vec::new(),
        }
    }

    /// Sets `key`, replacing any previous value.
    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
        self
    }

    pub fn opt_param<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_param(key, v),
            None => self,
        }
    }

    pub fn with_limit(self, limit: u32) -> Self {
        self.with_param("limit", limit)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut url = base
            .join(&self.method)
            .map_err(|e| AppError::InvalidUrl(format!("{}{}: {}", base, self.method, e)))?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Seconds from the `Retry-After` header, when Slack sent one.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport {
    fn get(&self, request: &PageRequest) -> Result<HttpResponse>;

    fn download(&self, url: &str) -> Result<Vec<u8>>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Blocking reqwest transport carrying the bearer token.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, token: String) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| AppError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            token,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &PageRequest) -> Result<HttpResponse> {
        let url = request.url(&self.base_url)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let headers = response.headers();
        if let Some(remaining) = headers
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!(method = %request.method, remaining, "rate limit remaining");
        }
        let retry_after = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| AppError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Http {
                status: status.as_u16(),
                body: url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| AppError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub base_delay: Duration,
    /// Added on top of every rate-limit wait.
    pub additional_sleep: Duration,
    /// Pause after a request that only succeeded after retrying.
    pub retry_pacing: Duration,
    /// `None` retries rate-limited requests forever.
    pub max_attempts: Option<u32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            additional_sleep: Duration::from_secs(5),
            retry_pacing: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// `base * 2^(attempt-1)`, capped at [`MAX_BACKOFF`]. `attempt` is 1-based.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(MAX_BACKOFF)
}

/// Issues requests and absorbs HTTP 429 responses.
///
/// A rate-limited response is never handed back to the caller: the executor
/// sleeps for the server hint (or the exponential backoff when there is none)
/// plus [`ExecutorConfig::additional_sleep`] and tries again. Every other
/// status, successful or not, is returned as-is.
pub struct RequestExecutor<T, S> {
    transport: T,
    sleeper: S,
    config: ExecutorConfig,
}

impl<T: Transport, S: Sleeper> RequestExecutor<T, S> {
    pub fn new(transport: T, sleeper: S, config: ExecutorConfig) -> Self {
        Self {
            transport,
            sleeper,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn pause(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    pub fn execute(&self, request: &PageRequest) -> Result<HttpResponse> {
        let mut attempt: u32 = 0;

        loop {
            let response = self.transport.get(request)?;
            attempt += 1;
            debug!(method = %request.method, attempt, status = response.status, "Slack API request");

            if response.status != RATE_LIMIT_STATUS {
                if attempt > 1 {
                    self.sleeper.sleep(self.config.retry_pacing);
                }
                return Ok(response);
            }

            if let Some(max) = self.config.max_attempts
                && attempt >= max
            {
                return Err(AppError::RateLimited { attempts: attempt });
            }

            let wait = self.rate_limit_wait(attempt, response.retry_after);
            warn!(
                method = %request.method,
                attempt,
                wait_secs = wait.as_secs(),
                "rate limited, retrying"
            );
            self.sleeper.sleep(wait);
        }
    }

    /// Total sleep after the `attempt`-th consecutive 429.
    pub fn rate_limit_wait(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let base = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => backoff_delay(self.config.base_delay, attempt),
        };
        base.saturating_add(self.config.additional_sleep)
    }
}
