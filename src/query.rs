use std::fmt::Write as _;

const QUERY_HEADER: &str = "[out:json][timeout:900][maxsize:2000000000];";
const ELEMENT_KINDS: &[&str] = &["node", "way", "relation"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchArea<'a> {
    Around { lat: f64, lon: f64, radius_m: u32 },
    Region { name: &'a str, admin_level: u8 },
}

pub fn build_query(area: &SearchArea<'_>, tag_key: &str, tag_values: &[&str]) -> String {
    debug_assert!(!tag_values.is_empty(), "query needs at least one tag value");

    let value_regex = value_regex(tag_values);
    let filter = match area {
        SearchArea::Around {
            lat,
            lon,
            radius_m,
        } => format!("(around:{radius_m},{lat},{lon})"),
        SearchArea::Region { .. } => "(area.searchArea)".to_string(),
    };

    let mut query = String::new();
    query.push_str(QUERY_HEADER);
    query.push('\n');
    if let SearchArea::Region { name, admin_level } = area {
        let _ = writeln!(
            query,
            "rel[\"name\"=\"{}\"][\"boundary\"=\"administrative\"][\"admin_level\"=\"{admin_level}\"]->.region;",
            quote_literal(name)
        );
        query.push_str("area.region->.searchArea;\n");
    }
    query.push_str("(\n");
    for kind in ELEMENT_KINDS {
        let _ = writeln!(query, "  {kind}[\"{tag_key}\"~\"{value_regex}\"]{filter};");
    }
    query.push_str(");\n");
    query.push_str("out tags center qt;\n");
    query
}

fn value_regex(values: &[&str]) -> String {
    let alternatives = values
        .iter()
        .map(|value| regex::escape(value))
        .collect::<Vec<_>>()
        .join("|");
    format!("^({alternatives})$")
}

fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
