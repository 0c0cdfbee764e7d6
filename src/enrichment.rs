use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::normalize::PlaceRecord;

const CONTACT_PATHS: &[&str] = &["/contact", "/contact-us"];
const PLACEHOLDER_FRAGMENTS: &[&str] = &["example.com", "email@", "your@", "info@example"];
const RESERVED_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}").expect("email pattern compiles")
});

pub struct EmailEnricher {
    http: Client,
    rate_limiter: RateLimiter,
    batch_size: usize,
    batch_pause: Duration,
}

impl EmailEnricher {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self::with_client(
            http,
            config.crawl_courtesy_delay,
            config.crawl_batch_size,
            config.crawl_sleep,
        ))
    }

    pub fn with_client(
        http: Client,
        courtesy_delay: Duration,
        batch_size: usize,
        batch_pause: Duration,
    ) -> Self {
        Self {
            http,
            rate_limiter: RateLimiter::new(courtesy_delay),
            batch_size: batch_size.max(1),
            batch_pause,
        }
    }

    pub async fn enrich(&self, records: &mut [PlaceRecord]) -> usize {
        let targets = records
            .iter_mut()
            .filter(|record| record.email.is_none() && record.website.is_some())
            .collect::<Vec<_>>();
        let total = targets.len();
        if total == 0 {
            return 0;
        }

        info!(total, "attempting email discovery from websites");
        let mut found = 0;
        for (idx, record) in targets.into_iter().enumerate() {
            let website = record.website.clone().unwrap_or_default();
            if let Some(email) = self.discover_email(&website).await {
                trace!(place = ?record.name, %email, "discovered email");
                record.email = Some(email);
                found += 1;
            }

            let processed = idx + 1;
            if processed % self.batch_size == 0 {
                debug!(processed, total, "email discovery progress");
                if processed < total && !self.batch_pause.is_zero() {
                    sleep(self.batch_pause).await;
                }
            }
        }
        info!(total, found, "email discovery finished");
        found
    }

    pub async fn discover_email(&self, website: &str) -> Option<String> {
        for candidate in candidate_urls(website) {
            match self.fetch_page(&candidate).await {
                Ok(body) => {
                    if let Some(email) = extract_email(&body) {
                        return Some(email);
                    }
                }
                Err(err) => {
                    debug!(error = %err, url = %candidate, "crawl candidate failed");
                }
            }
        }
        None
    }

    async fn fetch_page(&self, url: &Url) -> AppResult<String> {
        self.rate_limiter.wait().await;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(AppError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

pub fn candidate_urls(website: &str) -> Vec<Url> {
    let website = website.trim();
    if website.is_empty() {
        return Vec::new();
    }
    let absolute = if website.starts_with("http://") || website.starts_with("https://") {
        website.to_string()
    } else {
        format!("http://{website}")
    };

    let Ok(base) = Url::parse(&absolute) else {
        return Vec::new();
    };
    let mut candidates = vec![base.clone()];
    candidates.extend(CONTACT_PATHS.iter().filter_map(|path| base.join(path).ok()));
    candidates
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|candidate| !is_placeholder(candidate))
        .map(str::to_string)
}

fn is_placeholder(email: &str) -> bool {
    let lowered = email.to_ascii_lowercase();
    if PLACEHOLDER_FRAGMENTS.iter().any(|bad| lowered.contains(bad)) {
        return true;
    }
    if ASSET_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix)) {
        return true;
    }
    let domain = lowered.rsplit('@').next().unwrap_or_default();
    RESERVED_DOMAINS
        .iter()
        .any(|reserved| domain == *reserved || domain.ends_with(&format!(".{reserved}")))
}

struct RateLimiter {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: AsyncMutex::new(None),
        }
    }

    async fn wait(&self) {
        let interval = self.min_interval;
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < interval {
                sleep(interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}
