//! Region Normalization
//! Maps state names, postal codes and FIPS numbers onto postal codes, and
//! folds county names for comparison.

/// (full name, postal code, FIPS code)
static STATES: &[(&str, &str, u8)] = &[
    ("ALABAMA", "AL", 1),
    ("ALASKA", "AK", 2),
    ("ARIZONA", "AZ", 4),
    ("ARKANSAS", "AR", 5),
    ("CALIFORNIA", "CA", 6),
    ("COLORADO", "CO", 8),
    ("CONNECTICUT", "CT", 9),
    ("DELAWARE", "DE", 10),
    ("DISTRICT OF COLUMBIA", "DC", 11),
    ("FLORIDA", "FL", 12),
    ("GEORGIA", "GA", 13),
    ("HAWAII", "HI", 15),
    ("IDAHO", "ID", 16),
    ("ILLINOIS", "IL", 17),
    ("INDIANA", "IN", 18),
    ("IOWA", "IA", 19),
    ("KANSAS", "KS", 20),
    ("KENTUCKY", "KY", 21),
    ("LOUISIANA", "LA", 22),
    ("MAINE", "ME", 23),
    ("MARYLAND", "MD", 24),
    ("MASSACHUSETTS", "MA", 25),
    ("MICHIGAN", "MI", 26),
    ("MINNESOTA", "MN", 27),
    ("MISSISSIPPI", "MS", 28),
    ("MISSOURI", "MO", 29),
    ("MONTANA", "MT", 30),
    ("NEBRASKA", "NE", 31),
    ("NEVADA", "NV", 32),
    ("NEW HAMPSHIRE", "NH", 33),
    ("NEW JERSEY", "NJ", 34),
    ("NEW MEXICO", "NM", 35),
    ("NEW YORK", "NY", 36),
    ("NORTH CAROLINA", "NC", 37),
    ("NORTH DAKOTA", "ND", 38),
    ("OHIO", "OH", 39),
    ("OKLAHOMA", "OK", 40),
    ("OREGON", "OR", 41),
    ("PENNSYLVANIA", "PA", 42),
    ("RHODE ISLAND", "RI", 44),
    ("SOUTH CAROLINA", "SC", 45),
    ("SOUTH DAKOTA", "SD", 46),
    ("TENNESSEE", "TN", 47),
    ("TEXAS", "TX", 48),
    ("UTAH", "UT", 49),
    ("VERMONT", "VT", 50),
    ("VIRGINIA", "VA", 51),
    ("WASHINGTON", "WA", 53),
    ("WEST VIRGINIA", "WV", 54),
    ("WISCONSIN", "WI", 55),
    ("WYOMING", "WY", 56),
];

/// Normalize a state given as postal code, full name or FIPS number.
///
/// Returns `None` for anything that is not one of the 50 states or DC.
pub fn normalize_state(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        let fips: u8 = trimmed.parse().ok()?;
        return STATES
            .iter()
            .find(|(_, _, f)| *f == fips)
            .map(|(_, code, _)| *code);
    }

    let upper = trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    STATES
        .iter()
        .find(|(name, code, _)| *code == upper || *name == upper)
        .map(|(_, code, _)| *code)
}

/// Comparison key for county names: case-folded, whitespace-collapsed, with a
/// trailing "county" or "parish" removed.
pub fn county_key(raw: &str) -> String {
    let lower = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    for suffix in [" county", " parish"] {
        if let Some(stripped) = lower.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    lower
}
