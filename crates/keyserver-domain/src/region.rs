/// Canonical form of a region code: trimmed and upper-cased.
pub fn normalize_region(region: &str) -> String {
    region.trim().to_uppercase()
}

/// Parses a comma-separated region list, dropping empty entries.
///
/// `"us, ca,,mx"` becomes `["US", "CA", "MX"]`.
pub fn parse_region_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_region)
        .filter(|region| !region.is_empty())
        .collect()
}
