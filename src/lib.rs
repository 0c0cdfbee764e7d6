pub mod cache;
pub mod categories;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod export;
pub mod fallback;
pub mod geo;
pub mod geocode;
pub mod normalize;
pub mod orchestrator;
pub mod overpass;
pub mod query;
pub mod service;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::config::AppConfig;
pub use crate::errors::{AppError, AppResult};
pub use crate::geocode::{GeocodedLocation, Geocoder, NominatimGeocoder};
pub use crate::normalize::PlaceRecord;
pub use crate::overpass::{MirrorFetcher, OverpassApi};
pub use crate::service::{PlaceFinder, ResultSource, SearchResponse};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,find_your_place=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
