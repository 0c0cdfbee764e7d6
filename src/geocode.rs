use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedLocation {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> AppResult<GeocodedLocation>;
}

pub struct NominatimGeocoder {
    http: Client,
    endpoint: String,
    memo: Mutex<HashMap<String, GeocodedLocation>>,
}

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self::with_client(http, config.nominatim_url.clone()))
    }

    pub fn with_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            memo: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> AppResult<GeocodedLocation> {
        let cleaned = query.trim();
        if cleaned.is_empty() {
            return Err(AppError::LocationNotFound("location cannot be empty".into()));
        }

        let memo_key = cleaned.to_lowercase();
        let memoized = self.memo.lock().get(&memo_key).cloned();
        if let Some(hit) = memoized {
            debug!(query = cleaned, "geocode memo hit");
            return Ok(hit);
        }

        let hits: Vec<NominatimHit> = self
            .http
            .get(&self.endpoint)
            .query(&[("q", cleaned), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LocationNotFound(cleaned.to_string()))?;
        let malformed = |field: &str| AppError::MalformedUpstreamResponse {
            url: self.endpoint.clone(),
            message: format!("unparseable {field} in geocoder response"),
        };
        let location = GeocodedLocation {
            lat: hit.lat.trim().parse().map_err(|_| malformed("lat"))?,
            lon: hit.lon.trim().parse().map_err(|_| malformed("lon"))?,
            label: hit
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| cleaned.to_string()),
        };

        self.memo.lock().insert(memo_key, location.clone());
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use httptest::matchers::request;
    use httptest::responders::json_encoded;
    use httptest::{Expectation, Server};
    use serde_json::json;

    use super::*;

    fn geocoder(server: &Server) -> NominatimGeocoder {
        NominatimGeocoder::with_client(Client::new(), server.url_str("/search"))
    }

    #[tokio::test]
    async fn resolves_and_memoizes_case_insensitively() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .times(1)
                .respond_with(json_encoded(json!([
                    { "lat": "38.5815719", "lon": "-121.4943996", "display_name": "Sacramento, California, United States" }
                ]))),
        );

        let geocoder = geocoder(&server);
        let first = geocoder.geocode("  Sacramento ").await.unwrap();
        let second = geocoder.geocode("SACRAMENTO").await.unwrap();

        assert_eq!(first.label, "Sacramento, California, United States");
        assert!((first.lat - 38.5815719).abs() < 1e-9);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn no_hits_is_location_not_found() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .respond_with(json_encoded(json!([]))),
        );

        let err = geocoder(&server).geocode("Atlantis").await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn label_falls_back_to_query() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .respond_with(json_encoded(json!([{ "lat": "1.5", "lon": "2.5" }]))),
        );

        let location = geocoder(&server).geocode("Davis").await.unwrap();
        assert_eq!(location.label, "Davis");
        assert_eq!((location.lat, location.lon), (1.5, 2.5));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_a_request() {
        let server = Server::run();
        let err = geocoder(&server).geocode("   ").await.unwrap_err();
        assert!(matches!(err, AppError::LocationNotFound(_)));
    }
}
