use std::io::Write;

use serde::Serialize;

use crate::errors::AppResult;
use crate::normalize::PlaceRecord;

#[derive(Serialize)]
struct CsvRow<'a> {
    category: &'a str,
    name: Option<&'a str>,
    phone: Option<&'a str>,
    email: Option<&'a str>,
    website: Option<&'a str>,
    address: &'a str,
    lat: Option<f64>,
    lon: Option<f64>,
    osm_id: &'a str,
    source_tags: &'a str,
}

impl<'a> From<&'a PlaceRecord> for CsvRow<'a> {
    fn from(record: &'a PlaceRecord) -> Self {
        Self {
            category: &record.category,
            name: record.name.as_deref(),
            phone: record.phone.as_deref(),
            email: record.email.as_deref(),
            website: record.website.as_deref(),
            address: &record.address,
            lat: record.lat,
            lon: record.lon,
            osm_id: &record.external_id,
            source_tags: &record.raw_tags,
        }
    }
}

pub fn write_csv<W: Write>(writer: W, records: &[PlaceRecord]) -> AppResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv.write_record([
            "category",
            "name",
            "phone",
            "email",
            "website",
            "address",
            "lat",
            "lon",
            "osm_id",
            "source_tags",
        ])?;
    }
    for record in records {
        csv.serialize(CsvRow::from(record))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn export_filename(label: &str) -> String {
    format!("findyourplace_{}.csv", label.trim().replace(' ', "_"))
}
