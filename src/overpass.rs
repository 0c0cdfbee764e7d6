use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
    #[serde(default)]
    pub center: Option<ElementCenter>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementCenter {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
}

#[async_trait]
pub trait OverpassApi: Send + Sync {
    async fn execute(&self, query: &str) -> AppResult<OverpassResponse>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub rate_limit_cooldown: Duration,
    pub backoff_step: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            attempts: config.overpass_retry_attempts.max(1),
            rate_limit_cooldown: config.rate_limit_cooldown,
            backoff_step: config.retry_backoff_step,
            backoff_max: config.retry_backoff_max,
        }
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_step
            .saturating_mul(attempt)
            .min(self.backoff_max)
    }
}

pub struct MirrorFetcher {
    http: Client,
    mirrors: Vec<String>,
    policy: RetryPolicy,
}

impl MirrorFetcher {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self::with_client(
            http,
            config.overpass_urls.clone(),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn with_client(http: Client, mirrors: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            http,
            mirrors,
            policy,
        }
    }

    async fn attempt(&self, url: &str, query: &str) -> AppResult<OverpassResponse> {
        let response = self
            .http
            .post(url)
            .form(&[("data", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<OverpassResponse>(&body).map_err(|err| {
            AppError::MalformedUpstreamResponse {
                url: url.to_string(),
                message: err.to_string(),
            }
        })
    }
}

#[async_trait]
impl OverpassApi for MirrorFetcher {
    async fn execute(&self, query: &str) -> AppResult<OverpassResponse> {
        let mut last_error =
            AppError::Config("no overpass mirrors configured".to_string());
        let total_attempts = self.mirrors.len() as u64 * u64::from(self.policy.attempts);
        let mut made = 0_u64;

        for url in &self.mirrors {
            for attempt in 1..=self.policy.attempts {
                made += 1;
                let delay = match self.attempt(url, query).await {
                    Ok(response) => {
                        debug!(
                            mirror = %url,
                            attempt,
                            elements = response.elements.len(),
                            "overpass query succeeded"
                        );
                        return Ok(response);
                    }
                    Err(err) => {
                        let delay = if is_rate_limited(&err) {
                            self.policy.rate_limit_cooldown
                        } else {
                            self.policy.backoff_delay(attempt)
                        };
                        warn!(
                            error = %err,
                            mirror = %url,
                            attempt,
                            "overpass attempt failed; retrying after {:?}",
                            delay
                        );
                        last_error = err;
                        delay
                    }
                };

                if made < total_attempts && !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }

        Err(AppError::MirrorExhausted {
            last_error: Box::new(last_error),
        })
    }
}

fn is_rate_limited(err: &AppError) -> bool {
    matches!(
        err,
        AppError::UpstreamStatus { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
    )
}
