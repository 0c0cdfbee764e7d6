use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::categories::resolve_categories;
use crate::config::AppConfig;
use crate::enrichment::EmailEnricher;
use crate::errors::{AppError, AppResult};
use crate::fallback::MockFallbackStore;
use crate::geocode::{Geocoder, NominatimGeocoder};
use crate::normalize::PlaceRecord;
use crate::orchestrator::{CategoryOrchestrator, Region};
use crate::overpass::{MirrorFetcher, OverpassApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Live,
    Cache,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub location_label: String,
    pub radius_km: f64,
    pub categories: Vec<String>,
    pub results: Vec<PlaceRecord>,
    pub source: ResultSource,
}

#[derive(Debug, Clone)]
struct SearchOutcome {
    label: String,
    results: Vec<PlaceRecord>,
    source: ResultSource,
}

pub struct PlaceFinder {
    config: AppConfig,
    orchestrator: CategoryOrchestrator,
    enricher: EmailEnricher,
    geocoder: Arc<dyn Geocoder>,
    cache: ResponseCache,
    fallback: MockFallbackStore,
}

impl PlaceFinder {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let api: Arc<dyn OverpassApi> = Arc::new(MirrorFetcher::new(&config)?);
        let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimGeocoder::new(&config)?);
        Self::from_parts(config, api, geocoder)
    }

    pub fn from_parts(
        config: AppConfig,
        api: Arc<dyn OverpassApi>,
        geocoder: Arc<dyn Geocoder>,
    ) -> AppResult<Self> {
        let orchestrator = CategoryOrchestrator::new(
            api,
            config.max_parallel_category_requests,
            config.distance_tolerance_factor,
        );
        let enricher = EmailEnricher::new(&config)?;
        let fallback = MockFallbackStore::new(config.mock_places_path.clone());
        Ok(Self {
            config,
            orchestrator,
            enricher,
            geocoder,
            cache: ResponseCache::new(),
            fallback,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn search(
        &self,
        lat: f64,
        lon: f64,
        radius_m: u32,
        categories: Option<&[String]>,
        enrich_email: bool,
    ) -> AppResult<Vec<PlaceRecord>> {
        let categories = resolve_categories(categories);
        let outcome = self
            .search_at(lat, lon, "", radius_m, &categories, enrich_email)
            .await?;
        Ok(outcome.results)
    }

    pub async fn search_location(
        &self,
        location: &str,
        radius_km: f64,
        categories: Option<&[String]>,
        enrich_email: bool,
    ) -> AppResult<SearchResponse> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AppError::Config(format!(
                "radius must be a positive number of kilometres, got {radius_km}"
            )));
        }

        let located = self.geocoder.geocode(location).await?;
        let radius_m = (radius_km * 1000.0) as u32;
        let categories = resolve_categories(categories);
        let outcome = self
            .search_at(
                located.lat,
                located.lon,
                &located.label,
                radius_m,
                &categories,
                enrich_email,
            )
            .await?;

        Ok(SearchResponse {
            location_label: outcome.label,
            radius_km,
            categories,
            results: outcome.results,
            source: outcome.source,
        })
    }

    pub async fn search_region(&self, enrich_email: bool) -> AppResult<Vec<PlaceRecord>> {
        let region = Region {
            name: self.config.region_name.clone(),
            admin_level: self.config.region_admin_level,
        };
        let categories = resolve_categories(None);

        match self.orchestrator.fetch_region(&region, &categories).await {
            Ok(mut records) => {
                self.maybe_enrich(&mut records, enrich_email).await;
                Ok(records)
            }
            Err(err) if err.is_mirror_exhausted() => self.fallback_or(err, &[]),
            Err(err) => Err(err),
        }
    }

    async fn search_at(
        &self,
        lat: f64,
        lon: f64,
        label: &str,
        radius_m: u32,
        categories: &[String],
        enrich_email: bool,
    ) -> AppResult<SearchOutcome> {
        if categories.is_empty() {
            return Ok(SearchOutcome {
                label: label.to_string(),
                results: Vec::new(),
                source: ResultSource::Live,
            });
        }

        let key = CacheKey::new(lat, lon, radius_m, categories, enrich_email);
        if let Some(cached) = self.cache.get(&key) {
            let label = if cached.label.is_empty() {
                label.to_string()
            } else {
                cached.label
            };
            return Ok(SearchOutcome {
                label,
                results: cached.results,
                source: ResultSource::Cache,
            });
        }

        match self
            .orchestrator
            .fetch_around(lat, lon, radius_m, categories)
            .await
        {
            Ok(mut records) => {
                self.maybe_enrich(&mut records, enrich_email).await;
                self.cache.put(
                    key,
                    label,
                    &records,
                    self.config.search_cache_ttl,
                    self.config.search_cache_max_entries,
                );
                info!(lat, lon, radius_m, results = records.len(), "search completed");
                Ok(SearchOutcome {
                    label: label.to_string(),
                    results: records,
                    source: ResultSource::Live,
                })
            }
            Err(err) if err.is_mirror_exhausted() => {
                let results = self.fallback_or(err, categories)?;
                Ok(SearchOutcome {
                    label: label.to_string(),
                    results,
                    source: ResultSource::Fallback,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn fallback_or(&self, err: AppError, categories: &[String]) -> AppResult<Vec<PlaceRecord>> {
        let places = self.fallback.for_categories(categories);
        if places.is_empty() {
            return Err(err);
        }
        warn!(error = %err, count = places.len(), "overpass unavailable; serving fallback places");
        Ok(places)
    }

    async fn maybe_enrich(&self, records: &mut [PlaceRecord], requested: bool) {
        if requested && self.config.enable_website_email_discovery {
            self.enricher.enrich(records).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::geocode::GeocodedLocation;
    use crate::overpass::OverpassResponse;

    struct CountingOverpass {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OverpassApi for CountingOverpass {
        async fn execute(&self, _query: &str) -> AppResult<OverpassResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::MirrorExhausted {
                    last_error: Box::new(AppError::Config("offline".into())),
                });
            }
            Ok(serde_json::from_value(json!({
                "elements": [
                    { "type": "node", "id": 1, "lat": 0.001, "lon": 0.0,
                      "tags": { "name": "Oak", "phone": "555-0100" } }
                ]
            }))
            .unwrap())
        }
    }

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, query: &str) -> AppResult<GeocodedLocation> {
            if query == "nowhere" {
                return Err(AppError::LocationNotFound(query.into()));
            }
            Ok(GeocodedLocation {
                lat: 0.0,
                lon: 0.0,
                label: format!("{query}, Earth"),
            })
        }
    }

    fn finder(fail: bool) -> (PlaceFinder, Arc<CountingOverpass>) {
        let api = Arc::new(CountingOverpass {
            calls: AtomicUsize::new(0),
            fail,
        });
        let config = AppConfig {
            mock_places_path: None,
            search_cache_ttl: Duration::from_secs(60),
            ..AppConfig::default()
        };
        let finder = PlaceFinder::from_parts(config, api.clone(), Arc::new(FixedGeocoder)).unwrap();
        (finder, api)
    }

    #[tokio::test]
    async fn repeated_location_search_is_served_from_cache() {
        let (finder, api) = finder(false);
        let schools = vec!["school".to_string()];

        let first = finder
            .search_location("Null Island", 1.0, Some(&schools), false)
            .await
            .unwrap();
        let second = finder
            .search_location("Null Island", 1.0, Some(&schools), false)
            .await
            .unwrap();

        assert_eq!(first.source, ResultSource::Live);
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.location_label, "Null Island, Earth");
        assert_eq!(second.results, first.results);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enrichment_flag_is_part_of_the_cache_key() {
        let (finder, api) = finder(false);
        finder.search(0.0, 0.0, 1_000, None, false).await.unwrap();
        finder.search(0.0, 0.0, 1_000, None, true).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 8);
        assert_eq!(finder.cache().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_mirrors_without_fallback_fail() {
        let (finder, _) = finder(true);
        let err = finder.search(0.0, 0.0, 1_000, None, false).await.unwrap_err();
        assert!(err.is_mirror_exhausted());
        assert!(finder.cache().is_empty());
    }

    #[tokio::test]
    async fn unknown_location_is_a_client_error() {
        let (finder, api) = finder(false);
        let err = finder
            .search_location("nowhere", 5.0, None, false)
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejects_non_positive_radius() {
        let (finder, _) = finder(false);
        assert!(finder.search_location("Davis", 0.0, None, false).await.is_err());
    }

    #[tokio::test]
    async fn only_unknown_categories_yields_nothing() {
        let (finder, api) = finder(false);
        let requested = vec!["museum".to_string()];
        let results = finder
            .search(0.0, 0.0, 1_000, Some(&requested), false)
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }
}
