use std::collections::HashSet;

use crate::normalize::PlaceRecord;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

pub fn filter_within_radius(
    records: Vec<PlaceRecord>,
    origin: (f64, f64),
    radius_m: u32,
    tolerance: f64,
) -> Vec<PlaceRecord> {
    retain_within(records, origin, f64::from(radius_m) * tolerance)
}

fn retain_within(
    mut records: Vec<PlaceRecord>,
    (lat, lon): (f64, f64),
    max_distance_m: f64,
) -> Vec<PlaceRecord> {
    records.retain(|record| match record.coordinates() {
        Some((rec_lat, rec_lon)) => {
            haversine_distance_m(lat, lon, rec_lat, rec_lon) <= max_distance_m
        }
        None => false,
    });
    records
}

// Records without coordinates are keyed at 0,0.
pub fn dedupe(records: Vec<PlaceRecord>) -> Vec<PlaceRecord> {
    let mut seen: HashSet<(Option<String>, i64, i64)> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| {
            seen.insert((
                record.name.clone(),
                round6(record.lat.unwrap_or(0.0)),
                round6(record.lon.unwrap_or(0.0)),
            ))
        })
        .collect()
}

fn round6(value: f64) -> i64 {
    (value * 1_000_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(name: &str, lat: Option<f64>, lon: Option<f64>) -> PlaceRecord {
        PlaceRecord {
            external_id: format!("node/{name}"),
            category: "school".into(),
            name: Some(name.into()),
            phone: None,
            email: None,
            website: None,
            address: String::new(),
            lat,
            lon,
            raw_tags: "{}".into(),
        }
    }

    fn north_of_equator(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_distance_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");
        assert_eq!(haversine_distance_m(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn boundary_is_inclusive_and_a_meter_beyond_is_dropped() {
        let edge_lat = north_of_equator(1000.0);
        let edge = haversine_distance_m(0.0, 0.0, edge_lat, 0.0);
        let records = vec![
            place("edge", Some(edge_lat), Some(0.0)),
            place("beyond", Some(north_of_equator(1001.0)), Some(0.0)),
        ];

        let kept = retain_within(records, (0.0, 0.0), edge);
        let names: Vec<_> = kept.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["edge"]);
    }

    #[test]
    fn tolerance_widens_the_radius() {
        let records = vec![place("just-outside", Some(north_of_equator(1030.0)), Some(0.0))];
        assert!(filter_within_radius(records.clone(), (0.0, 0.0), 1000, 1.0).is_empty());
        assert_eq!(filter_within_radius(records, (0.0, 0.0), 1000, 1.05).len(), 1);
    }

    #[test]
    fn records_without_coordinates_are_dropped() {
        let records = vec![place("nowhere", None, Some(0.0))];
        assert!(filter_within_radius(records, (0.0, 0.0), 50_000, 1.0).is_empty());
    }

    #[test]
    fn dedupe_keeps_first_seen_record() {
        let mut first = place("Oak School", Some(38.1234561), Some(-121.0000001));
        first.phone = Some("first".into());
        let mut second = place("Oak School", Some(38.1234564), Some(-121.0000004));
        second.phone = Some("second".into());
        let other = place("Elm School", Some(38.1234561), Some(-121.0000001));

        let out = dedupe(vec![first, other, second]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].phone.as_deref(), Some("first"));
        assert_eq!(out[1].name.as_deref(), Some("Elm School"));
    }

    #[test]
    fn dedupe_treats_missing_coordinates_as_origin() {
        let out = dedupe(vec![
            place("Ghost", None, None),
            place("Ghost", Some(0.0), Some(0.0)),
            place("Ghost", Some(0.0000004), None),
        ]);
        assert_eq!(out.len(), 1);
    }
}
