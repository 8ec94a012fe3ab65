// src/translation.rs
//! Static bilingual tables for the original-language result view: field
//! labels, value translations (status words, countries, platform names),
//! and the curated en->ja phrase glossary applied to English-platform text.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static FIELD_LABELS_JA: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let raw = include_str!("../config/field_labels_ja.json");
    serde_json::from_str(raw).expect("valid field label table")
});

static VALUE_LABELS_JA: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let raw = include_str!("../config/value_labels_ja.json");
    serde_json::from_str(raw).expect("valid value label table")
});

/// Ordered longest-first so multi-word phrases win over their substrings.
static PHRASE_GLOSSARY_JA: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    let raw = include_str!("../config/phrase_glossary_ja.json");
    let map: HashMap<String, String> = serde_json::from_str(raw).expect("valid phrase glossary");
    let mut pairs: Vec<(String, String)> = map.into_iter().collect();
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
    pairs
});

/// Japanese label for a document field; unknown keys pass through.
pub fn field_label_ja(key: &str) -> &str {
    FIELD_LABELS_JA.get(key).map(String::as_str).unwrap_or(key)
}

/// Fixed-value translation (status words, country names, platform names).
pub fn value_label_ja(value: &str) -> Option<&'static str> {
    Lazy::force(&VALUE_LABELS_JA).get(value).map(String::as_str)
}

/// Best-effort keyword substitution over English-platform text. A curated
/// find-and-replace pass, explicitly approximate.
pub fn apply_phrase_glossary_ja(text: &str) -> String {
    let mut out = text.to_string();
    for (en, ja) in PHRASE_GLOSSARY_JA.iter() {
        if out.contains(en.as_str()) {
            out = out.replace(en.as_str(), ja);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_labels_cover_the_record_schema() {
        assert_eq!(field_label_ja("title"), "タイトル");
        assert_eq!(field_label_ja("support_amount"), "支援金額");
        assert_eq!(field_label_ja("made_up_key"), "made_up_key");
    }

    #[test]
    fn value_labels_cover_status_and_platforms() {
        assert_eq!(value_label_ja("successful"), Some("成功済み"));
        assert_eq!(value_label_ja("United States"), Some("アメリカ"));
        assert_eq!(value_label_ja("Kickstarter"), Some("キックスターター"));
        assert_eq!(value_label_ja("whatever"), None);
    }

    #[test]
    fn glossary_prefers_longer_phrases() {
        // "Dual Design" must be replaced as a unit, not as "Smart" etc.
        let out = apply_phrase_glossary_ja("Portable Dual Design Speaker");
        assert_eq!(out, "ポータブル デュアルデザイン スピーカー");
    }
}
