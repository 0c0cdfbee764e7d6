use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::normalize::PlaceRecord;

pub struct MockFallbackStore {
    path: Option<PathBuf>,
    places: OnceCell<Vec<PlaceRecord>>,
}

impl MockFallbackStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            places: OnceCell::new(),
        }
    }

    pub fn places(&self) -> &[PlaceRecord] {
        self.places
            .get_or_init(|| match &self.path {
                Some(path) => load_places(path),
                None => Vec::new(),
            })
            .as_slice()
    }

    pub fn for_categories(&self, categories: &[String]) -> Vec<PlaceRecord> {
        let places = self.places();
        if categories.is_empty() {
            return places.to_vec();
        }
        places
            .iter()
            .filter(|place| categories.iter().any(|c| *c == place.category))
            .cloned()
            .collect()
    }
}

fn load_places(path: &Path) -> Vec<PlaceRecord> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(?err, path = %path.display(), "fallback places unavailable");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<PlaceRecord>>(&contents) {
        Ok(places) => {
            debug!(count = places.len(), path = %path.display(), "loaded fallback places");
            places
        }
        Err(err) => {
            warn!(?err, path = %path.display(), "fallback places file is malformed; ignoring");
            Vec::new()
        }
    }
}
