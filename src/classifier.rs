use serde::{Deserialize, Serialize};

/// Closed set of mandate groups. New groups get a variant plus a synonym
/// list; free text never reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MandateGroup {
    Lodging,
    Dining,
}

impl MandateGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lodging => "lodging",
            Self::Dining => "dining",
        }
    }
}

const LODGING_LABELS: &[&str] = &[
    "hébergement",
    "hebergement",
    "lodging",
    "hôtel",
    "hotel",
    "logement",
    "chambres",
];

const DINING_LABELS: &[&str] = &[
    "restauration",
    "restaurant",
    "dining",
    "gastronomie",
    "brasserie",
    "f&b",
];

/// Map a free-text category label to a mandate group by case-insensitive
/// substring match. `None` means the label is unrecognized and the owning
/// row should be reported as an error.
pub fn classify(label: &str) -> Option<MandateGroup> {
    let needle = label.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    if LODGING_LABELS.iter().any(|s| needle.contains(s)) {
        return Some(MandateGroup::Lodging);
    }
    if DINING_LABELS.iter().any(|s| needle.contains(s)) {
        return Some(MandateGroup::Dining);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accented_and_unaccented_spellings() {
        assert_eq!(classify("Hébergement"), Some(MandateGroup::Lodging));
        assert_eq!(classify("hebergement"), Some(MandateGroup::Lodging));
        assert_eq!(classify("Restauration"), Some(MandateGroup::Dining));
    }

    #[test]
    fn test_substring_match() {
        assert_eq!(classify("Grand Hotel (ville)"), Some(MandateGroup::Lodging));
        assert_eq!(classify("restaurant du lac"), Some(MandateGroup::Dining));
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(classify("Wellness"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
    }

    #[test]
    fn test_group_storage_key() {
        assert_eq!(MandateGroup::Lodging.as_str(), "lodging");
        assert_eq!(MandateGroup::Dining.as_str(), "dining");
    }
}
