use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use serde::Serialize;
use tracing::debug;

const ENV_PREFIX: &str = "FYP_";
const DEFAULT_OVERPASS_URLS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.openstreetmap.ru/api/interpreter",
];
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_MOCK_PLACES_PATH: &str = "data/sample_places.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub overpass_urls: Vec<String>,
    pub http_timeout: Duration,
    pub overpass_retry_attempts: u32,
    pub rate_limit_cooldown: Duration,
    pub retry_backoff_step: Duration,
    pub retry_backoff_max: Duration,
    pub crawl_sleep: Duration,
    pub crawl_batch_size: usize,
    pub crawl_courtesy_delay: Duration,
    pub enable_website_email_discovery: bool,
    pub user_agent: String,
    pub max_parallel_category_requests: usize,
    pub distance_tolerance_factor: f64,
    pub search_cache_ttl: Duration,
    pub search_cache_max_entries: usize,
    pub mock_places_path: Option<PathBuf>,
    pub nominatim_url: String,
    pub region_name: String,
    pub region_admin_level: u8,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub mirror_count: usize,
    pub http_timeout_secs: u64,
    pub overpass_retry_attempts: u32,
    pub max_parallel_category_requests: usize,
    pub distance_tolerance_factor: f64,
    pub search_cache_ttl_secs: u64,
    pub search_cache_max_entries: usize,
    pub email_discovery_enabled: bool,
    pub has_mock_places: bool,
    pub region_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            overpass_urls: DEFAULT_OVERPASS_URLS.iter().map(|url| url.to_string()).collect(),
            http_timeout: Duration::from_secs(45),
            overpass_retry_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(5),
            retry_backoff_step: Duration::from_secs(2),
            retry_backoff_max: Duration::from_secs(5),
            crawl_sleep: Duration::from_secs(1),
            crawl_batch_size: 25,
            crawl_courtesy_delay: Duration::from_millis(250),
            enable_website_email_discovery: false,
            user_agent: concat!("FindYourPlace/", env!("CARGO_PKG_VERSION")).to_string(),
            max_parallel_category_requests: 4,
            distance_tolerance_factor: 1.05,
            search_cache_ttl: Duration::from_secs(120),
            search_cache_max_entries: 128,
            mock_places_path: Some(PathBuf::from(DEFAULT_MOCK_PLACES_PATH)),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            region_name: "California".to_string(),
            region_admin_level: 4,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        Self {
            overpass_urls: parse_list("OVERPASS_URLS").unwrap_or(defaults.overpass_urls),
            http_timeout: parse_secs("HTTP_TIMEOUT_SECS", defaults.http_timeout),
            overpass_retry_attempts: parse_u32(
                "OVERPASS_RETRY_ATTEMPTS",
                defaults.overpass_retry_attempts,
            )
            .max(1),
            rate_limit_cooldown: parse_millis("RATE_LIMIT_COOLDOWN_MS", defaults.rate_limit_cooldown),
            retry_backoff_step: parse_millis("RETRY_BACKOFF_STEP_MS", defaults.retry_backoff_step),
            retry_backoff_max: parse_millis("RETRY_BACKOFF_MAX_MS", defaults.retry_backoff_max),
            crawl_sleep: parse_millis("CRAWL_SLEEP_MS", defaults.crawl_sleep),
            crawl_batch_size: parse_usize("CRAWL_BATCH_SIZE", defaults.crawl_batch_size).max(1),
            crawl_courtesy_delay: parse_millis(
                "CRAWL_COURTESY_DELAY_MS",
                defaults.crawl_courtesy_delay,
            ),
            enable_website_email_discovery: parse_bool(
                "ENABLE_WEBSITE_EMAIL_DISCOVERY",
                defaults.enable_website_email_discovery,
            ),
            user_agent: var("USER_AGENT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            max_parallel_category_requests: parse_usize(
                "MAX_PARALLEL_CATEGORY_REQUESTS",
                defaults.max_parallel_category_requests,
            )
            .max(1),
            distance_tolerance_factor: parse_f64(
                "DISTANCE_TOLERANCE_FACTOR",
                defaults.distance_tolerance_factor,
            ),
            search_cache_ttl: parse_secs("SEARCH_CACHE_TTL_SECONDS", defaults.search_cache_ttl),
            search_cache_max_entries: parse_usize(
                "SEARCH_CACHE_MAX_ENTRIES",
                defaults.search_cache_max_entries,
            )
            .max(1),
            mock_places_path: match var("MOCK_PLACES_PATH") {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path)),
                None => defaults.mock_places_path,
            },
            nominatim_url: var("NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
            region_name: var("REGION_NAME")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.region_name),
            region_admin_level: var("REGION_ADMIN_LEVEL")
                .and_then(|v| v.trim().parse::<u8>().ok())
                .unwrap_or(defaults.region_admin_level),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            mirror_count: self.overpass_urls.len(),
            http_timeout_secs: self.http_timeout.as_secs(),
            overpass_retry_attempts: self.overpass_retry_attempts,
            max_parallel_category_requests: self.max_parallel_category_requests,
            distance_tolerance_factor: self.distance_tolerance_factor,
            search_cache_ttl_secs: self.search_cache_ttl.as_secs(),
            search_cache_max_entries: self.search_cache_max_entries,
            email_discovery_enabled: self.enable_website_email_discovery,
            has_mock_places: self.mock_places_path.is_some(),
            region_name: self.region_name.clone(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn var(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn parse_bool(key: &str, default: bool) -> bool {
    var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    var(key)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    var(key)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    var(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(default)
}

fn parse_secs(key: &str, default: Duration) -> Duration {
    var(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn parse_millis(key: &str, default: Duration) -> Duration {
    var(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn parse_list(key: &str) -> Option<Vec<String>> {
    let items = var(key)?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
