use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::overpass::OverpassElement;

const ADDRESS_KEYS: &[&str] = &[
    "addr:housenumber",
    "addr:street",
    "addr:city",
    "addr:postcode",
    "addr:state",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    #[serde(rename = "osm_id")]
    pub external_id: String,
    pub category: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(rename = "source_tags", default)]
    pub raw_tags: String,
}

impl PlaceRecord {
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.lat.is_some() && self.lon.is_some()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

pub fn normalize_element(element: &OverpassElement, category: &str) -> PlaceRecord {
    let tags = element.tags.clone().unwrap_or_default();
    let (lat, lon) = element_coordinates(element);

    let address = ADDRESS_KEYS
        .iter()
        .filter_map(|key| non_empty(&tags, key))
        .collect::<Vec<_>>()
        .join(", ")
        .trim_matches(|c| c == ',' || c == ' ')
        .to_string();

    PlaceRecord {
        external_id: format!(
            "{}/{}",
            element.kind,
            element.id.map(|id| id.to_string()).unwrap_or_default()
        ),
        category: category.to_string(),
        name: non_empty(&tags, "name").map(str::to_string),
        phone: first_tag(&tags, &["contact:phone", "phone"]),
        email: first_tag(&tags, &["contact:email", "email"]),
        website: first_tag(&tags, &["contact:website", "website", "url"]),
        address,
        lat,
        lon,
        raw_tags: serde_json::to_string(&tags).unwrap_or_default(),
    }
}

fn element_coordinates(element: &OverpassElement) -> (Option<f64>, Option<f64>) {
    let (lat, lon) = match (&element.lat, &element.lon) {
        (Some(lat), Some(lon)) if !lat.is_null() && !lon.is_null() => (Some(lat), Some(lon)),
        _ => match &element.center {
            Some(center) => (center.lat.as_ref(), center.lon.as_ref()),
            None => (None, None),
        },
    };

    match (lat.map(coerce_coordinate), lon.map(coerce_coordinate)) {
        (Some(None), _) | (_, Some(None)) => (None, None),
        (lat, lon) => (lat.flatten(), lon.flatten()),
    }
}

// None: present but not numeric.
fn coerce_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn non_empty<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key).map(String::as_str).filter(|value| !value.is_empty())
}

fn first_tag(tags: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| non_empty(tags, key))
        .map(str::to_string)
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
