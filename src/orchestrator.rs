use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::categories::category_spec;
use crate::errors::AppResult;
use crate::geo::{dedupe, filter_within_radius};
use crate::normalize::{normalize_element, PlaceRecord};
use crate::overpass::OverpassApi;
use crate::query::{build_query, SearchArea};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub admin_level: u8,
}

pub struct CategoryOrchestrator {
    api: Arc<dyn OverpassApi>,
    max_parallel: usize,
    tolerance: f64,
}

impl CategoryOrchestrator {
    pub fn new(api: Arc<dyn OverpassApi>, max_parallel: usize, tolerance: f64) -> Self {
        Self {
            api,
            max_parallel: max_parallel.max(1),
            tolerance,
        }
    }

    // First failure aborts; queued categories never start.
    pub async fn fetch_around(
        &self,
        lat: f64,
        lon: f64,
        radius_m: u32,
        categories: &[String],
    ) -> AppResult<Vec<PlaceRecord>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let area = SearchArea::Around { lat, lon, radius_m };
        let workers = self.max_parallel.min(categories.len());
        let mut pending = stream::iter(categories.iter().enumerate())
            .map(|(idx, category)| async move {
                let records = self.fetch_category(&area, category).await.map(|records| {
                    filter_within_radius(records, (lat, lon), radius_m, self.tolerance)
                });
                (idx, category, records)
            })
            .buffer_unordered(workers);

        let mut per_category: Vec<Vec<PlaceRecord>> = vec![Vec::new(); categories.len()];
        while let Some((idx, category, result)) = pending.next().await {
            match result {
                Ok(records) => per_category[idx] = records,
                Err(err) => {
                    warn!(error = %err, category = %category, "category fetch failed; aborting search");
                    return Err(err);
                }
            }
        }

        let merged: Vec<PlaceRecord> = per_category.into_iter().flatten().collect();
        let fetched = merged.len();
        let records = dedupe(merged);
        info!(
            categories = categories.len(),
            workers,
            fetched,
            kept = records.len(),
            "area search assembled"
        );
        Ok(records)
    }

    pub async fn fetch_region(
        &self,
        region: &Region,
        categories: &[String],
    ) -> AppResult<Vec<PlaceRecord>> {
        let area = SearchArea::Region {
            name: &region.name,
            admin_level: region.admin_level,
        };

        let mut merged = Vec::new();
        for category in categories {
            let records = self.fetch_category(&area, category).await?;
            info!(region = %region.name, category = %category, count = records.len(), "region category fetched");
            merged.extend(records);
        }
        Ok(dedupe(merged))
    }

    async fn fetch_category(
        &self,
        area: &SearchArea<'_>,
        category: &str,
    ) -> AppResult<Vec<PlaceRecord>> {
        let Some(spec) = category_spec(category) else {
            warn!(category, "skipping unknown category");
            return Ok(Vec::new());
        };

        let query = build_query(area, spec.tag_key, spec.tag_values);
        let response = self.api.execute(&query).await?;
        Ok(response
            .elements
            .iter()
            .map(|element| normalize_element(element, category))
            .filter(PlaceRecord::is_complete)
            .collect())
    }
}
