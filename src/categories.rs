#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    pub tag_key: &'static str,
    pub tag_values: &'static [&'static str],
}

pub const CATEGORIES: &[(&str, CategorySpec)] = &[
    (
        "school",
        CategorySpec {
            tag_key: "amenity",
            tag_values: &["school"],
        },
    ),
    (
        "college",
        CategorySpec {
            tag_key: "amenity",
            tag_values: &["college", "university"],
        },
    ),
    (
        "hospital",
        CategorySpec {
            tag_key: "amenity",
            tag_values: &["hospital", "clinic"],
        },
    ),
    (
        "hotel",
        CategorySpec {
            tag_key: "tourism",
            tag_values: &["hotel", "motel", "hostel", "guest_house"],
        },
    ),
];

pub fn category_spec(name: &str) -> Option<&'static CategorySpec> {
    CATEGORIES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, spec)| spec)
}

pub fn category_names() -> Vec<String> {
    CATEGORIES.iter().map(|(name, _)| name.to_string()).collect()
}

pub fn resolve_categories(requested: Option<&[String]>) -> Vec<String> {
    let requested = match requested {
        Some(list) if !list.is_empty() => list,
        _ => return category_names(),
    };

    let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        let name = name.trim();
        if category_spec(name).is_some() && !resolved.iter().any(|seen| seen == name) {
            resolved.push(name.to_string());
        }
    }
    resolved
}
