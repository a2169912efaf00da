//! Categorical label colors
//!
//! Seizure-type labels and intensity-population buckets share one lookup
//! table. Labels arrive from hand-edited JSON so they are normalised first.

use tracing::warn;

/// RGB triple, each channel in [0, 1]
pub type Rgb = [f32; 3];

pub const WHITE: Rgb = [1.0, 1.0, 1.0];
pub const MAGENTA: Rgb = [1.0, 0.0, 1.0];
pub const BLUE: Rgb = [0.0, 0.0, 1.0];

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Look up the color of a label.
///
/// A missing label is white. `None` means the normalised key is not in the
/// table; see [`resolve_color`] for the fallback callers use.
pub fn lookup_color(label: Option<&str>) -> Option<Rgb> {
    let Some(label) = label else {
        return Some(WHITE);
    };

    match normalize_label(label).as_str() {
        // Seizure types
        "early spread" => Some([1.0, 1.0, 0.0]),
        "onset" => Some([1.0, 0.0, 0.0]),
        "late spread" => Some([0.0, 1.0, 0.19]),
        "very early spread" => Some([1.0, 0.35, 0.12]),
        "rapid spread" => Some([0.0, 0.0, 1.0]),
        "early onset" => Some([0.0, 1.0, 1.0]),

        // Intensity populations
        "0" => Some([1.0, 1.0, 1.0]),
        "1" => Some([0.0, 1.0, 0.19]),
        "2" => Some([0.0, 0.0, 0.9]),
        "3" => Some([1.0, 0.0, 1.0]),
        "4" => Some([0.0, 1.0, 1.0]),
        "5" => Some([0.27, 0.46, 0.2]),
        "6" => Some([0.4, 0.17, 0.57]),
        "7" => Some([0.76, 0.76, 0.76]),
        "8" => Some([0.46, 0.55, 0.65]),

        "" => Some(WHITE),
        _ => None,
    }
}

/// Color for a label, falling back to white for keys outside the table.
pub fn resolve_color(label: Option<&str>) -> Rgb {
    lookup_color(label).unwrap_or_else(|| {
        warn!("No color for label {:?}, using white", label);
        WHITE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_label_is_white() {
        assert_eq!(resolve_color(None), WHITE);
        assert_eq!(resolve_color(Some("")), WHITE);
        assert_eq!(resolve_color(Some("   ")), WHITE);
    }

    #[test]
    fn test_case_and_space_insensitive() {
        let expected = [1.0, 0.0, 0.0];
        assert_eq!(resolve_color(Some("Onset")), expected);
        assert_eq!(resolve_color(Some(" ONSET ")), expected);
        assert_eq!(resolve_color(Some("onset")), expected);
        assert_eq!(
            resolve_color(Some("Very   Early\tSpread")),
            [1.0, 0.35, 0.12]
        );
    }

    #[test]
    fn test_population_buckets() {
        assert_eq!(resolve_color(Some("0")), WHITE);
        assert_eq!(resolve_color(Some("2")), [0.0, 0.0, 0.9]);
        assert_eq!(resolve_color(Some(" 8 ")), [0.46, 0.55, 0.65]);
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(lookup_color(Some("propagation")), None);
        assert_eq!(lookup_color(Some("9")), None);
        assert_eq!(resolve_color(Some("propagation")), WHITE);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Late \n Spread "), "late spread");
    }
}
