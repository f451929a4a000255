//! Display names and descriptions for emotion labels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub label: String,
    pub display: String,
    pub description: String,
}

const KNOWN: &[(&str, &str, &str)] = &[
    (
        "angry",
        "Angry",
        "Tense, driving harmony with unresolved dissonance and abrupt changes.",
    ),
    (
        "happy",
        "Happy",
        "Bright, stable harmony that leans on major chords and strong resolutions.",
    ),
    (
        "romantic",
        "Romantic",
        "Lush harmony with extended chords and expressive movement between them.",
    ),
    (
        "sad",
        "Sad",
        "Dark harmony centred on minor chords with a slow, descending feel.",
    ),
    (
        "warm",
        "Warm",
        "Gentle, consonant harmony that feels relaxed and comforting.",
    ),
];

/// Look up a label; unknown labels get a capitalized name and a generic
/// description.
pub fn describe(label: &str) -> LabelInfo {
    let key = label.trim().to_ascii_lowercase();
    if let Some((_, display, description)) = KNOWN.iter().find(|(k, _, _)| *k == key) {
        return LabelInfo {
            label: key,
            display: display.to_string(),
            description: description.to_string(),
        };
    }

    let mut chars = key.chars();
    let display = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    LabelInfo {
        description: format!("The progression was classified as {key}."),
        label: key,
        display,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_labels() {
        let info = describe("Sad");
        assert_eq!(info.label, "sad");
        assert_eq!(info.display, "Sad");
        assert!(info.description.contains("minor"));
    }

    #[test]
    fn unknown_label_fallback() {
        let info = describe("nostalgic");
        assert_eq!(info.display, "Nostalgic");
        assert_eq!(info.description, "The progression was classified as nostalgic.");
    }
}
