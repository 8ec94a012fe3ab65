// src/relevance.rs
//! Relevance gate for scraped campaign records: exact match, URL-slug
//! match, category gate, and semantic fallback, with exclusion lists for
//! known false-positive clusters.

use crate::record::CampaignRecord;
use crate::taxonomy::Taxonomy;
use tracing::debug;

// Dev logging gate: RELEVANCE_DEV_LOG=1 AND a debug build.
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("RELEVANCE_DEV_LOG").ok().as_deref() == Some("1");
    on && cfg!(debug_assertions)
}

/// Short anonymized id for log lines; never log full record text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Which tier decided the outcome; kept for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    NoKeyword,
    ExactPhrase,
    Excluded,
    UrlSlug,
    CategorySynonym,
    CategoryMiss,
    WordMatch,
    SemanticEquivalent,
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub relevant: bool,
    pub tier: MatchTier,
}

impl Verdict {
    fn pass(tier: MatchTier) -> Self {
        Self {
            relevant: true,
            tier,
        }
    }
    fn reject(tier: MatchTier) -> Self {
        Self {
            relevant: false,
            tier,
        }
    }
}

/// Combined searchable text for one record. Lowercased once; every tier
/// works on this same string.
fn combined_text(record: &CampaignRecord) -> String {
    [
        record.title.as_str(),
        record.original_title.as_str(),
        record.description.as_str(),
        record.project_owner.as_str(),
        record.url.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

/// Pure decision function; calling it twice with identical arguments yields
/// identical results.
pub fn is_relevant(
    record: &CampaignRecord,
    keyword: &str,
    category: Option<&str>,
    tax: &Taxonomy,
) -> bool {
    evaluate(record, keyword, category, tax).relevant
}

/// Full evaluation with the deciding tier.
///
/// Precedence: a literal exact-phrase match wins over everything; after
/// that, exclusions override all remaining tiers.
pub fn evaluate(
    record: &CampaignRecord,
    keyword: &str,
    category: Option<&str>,
    tax: &Taxonomy,
) -> Verdict {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return Verdict::pass(MatchTier::NoKeyword);
    }

    let text = combined_text(record);
    let words: Vec<&str> = keyword.split_whitespace().collect();

    // 1) Exact phrase match short-circuits even the exclusion lists.
    if text.contains(&keyword) {
        return log_verdict(record, &keyword, Verdict::pass(MatchTier::ExactPhrase));
    }

    // 2) Exclusions: the keyword (or one of its words) names a category
    //    carrying a blacklist, and a blacklisted term appears in the text.
    let exclusion_source = std::iter::once(keyword.as_str())
        .chain(words.iter().copied())
        .find_map(|w| tax.exclusions_for(w));
    if let Some(terms) = exclusion_source {
        if terms.iter().any(|t| text.contains(&t.to_lowercase())) {
            return log_verdict(record, &keyword, Verdict::reject(MatchTier::Excluded));
        }
    }

    // 3) URL-slug match: "speaker stand" -> "speaker-stand" / "speakerstand".
    let url = record.url.to_lowercase();
    let dashed = keyword.replace(char::is_whitespace, "-");
    let squashed = keyword.replace(char::is_whitespace, "");
    if url.contains(&dashed) || url.contains(&squashed) {
        return log_verdict(record, &keyword, Verdict::pass(MatchTier::UrlSlug));
    }

    // 4) Category gate: when the search is on-topic for a known category,
    //    require at least one of the category's synonyms to appear.
    if let Some(cat) = category {
        if let Some(entry) = tax.category(cat) {
            let on_topic = entry
                .synonyms
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&keyword));
            if on_topic {
                let hit = entry
                    .synonyms
                    .iter()
                    .any(|s| text.contains(&s.to_lowercase()));
                let verdict = if hit {
                    Verdict::pass(MatchTier::CategorySynonym)
                } else {
                    Verdict::reject(MatchTier::CategoryMiss)
                };
                return log_verdict(record, &keyword, verdict);
            }
        }
    }

    // 5) Word-level fallback.
    let min_len = tax.cfg.min_word_len;
    if words
        .iter()
        .any(|w| w.len() >= min_len && text.contains(*w))
    {
        return log_verdict(record, &keyword, Verdict::pass(MatchTier::WordMatch));
    }

    // 6) Semantic equivalents for the exact phrase.
    if let Some(equivalents) = tax.equivalents(&keyword) {
        if equivalents.iter().any(|t| text.contains(&t.to_lowercase())) {
            return log_verdict(
                record,
                &keyword,
                Verdict::pass(MatchTier::SemanticEquivalent),
            );
        }
    }

    log_verdict(record, &keyword, Verdict::reject(MatchTier::NoMatch))
}

fn log_verdict(record: &CampaignRecord, keyword: &str, verdict: Verdict) -> Verdict {
    if dev_logging_enabled() {
        debug!(
            target: "relevance",
            id = %anon_hash(&record.url),
            keyword = %anon_hash(keyword),
            relevant = verdict.relevant,
            tier = ?verdict.tier,
        );
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CampaignRecord;
    use crate::taxonomy::Taxonomy;

    const TEST_TOML: &str = r#"
[relevance]
fallback_cap = 10
min_word_len = 3

[[categories]]
id = "audio"
synonyms = ["audio", "sound", "speaker", "headphone"]
exclusions = ["power station", "bluetti"]

[[categories]]
id = "food"
synonyms = ["cooking", "recipe", "kitchen"]
exclusions = []

[equivalents]
audio = ["sound", "speaker", "headphone"]
board = ["board game", "tabletop", "dice"]
"#;

    fn tax() -> Taxonomy {
        Taxonomy::from_toml_str(TEST_TOML).expect("test taxonomy")
    }

    fn rec(title: &str, url: &str, description: &str) -> CampaignRecord {
        let mut r = CampaignRecord::new("kickstarter", url);
        r.title = title.to_string();
        r.original_title = title.to_string();
        r.description = description.to_string();
        r
    }

    #[test]
    fn empty_keyword_passes_everything() {
        let t = tax();
        let r = rec("Anything", "https://x/p/anything", "");
        assert!(is_relevant(&r, "", None, &t));
        assert!(is_relevant(&r, "   ", None, &t));
    }

    #[test]
    fn exact_phrase_wins_over_exclusions() {
        let t = tax();
        // "audio" appears verbatim, so the bluetti exclusion must not fire.
        let r = rec(
            "Bluetti audio dock",
            "https://x/p/dock",
            "A power station with audio output",
        );
        let v = evaluate(&r, "audio", None, &t);
        assert!(v.relevant);
        assert_eq!(v.tier, MatchTier::ExactPhrase);
    }

    #[test]
    fn exclusion_fires_for_non_exact_match() {
        let t = tax();
        // No literal "audio" anywhere, but the semantic tier would match
        // "speaker"; the blacklist has to override it.
        let r = rec(
            "Bluetti portable speaker rig",
            "https://x/p/rig",
            "A power station in disguise",
        );
        let v = evaluate(&r, "audio", None, &t);
        assert!(!v.relevant);
        assert_eq!(v.tier, MatchTier::Excluded);
    }

    #[test]
    fn url_slug_matches() {
        let t = tax();
        let r = rec("Great thing", "https://x/projects/smart-lamp-mini", "");
        let v = evaluate(&r, "smart lamp", None, &t);
        assert!(v.relevant);
        assert_eq!(v.tier, MatchTier::UrlSlug);
    }

    #[test]
    fn category_gate_requires_a_synonym() {
        let t = tax();
        // On-topic search ("sound" is an audio synonym) with zero audio
        // vocabulary in the record -> rejected by the gate.
        let r = rec("Ceramic mug set", "https://x/p/mugs", "Handmade mugs");
        let v = evaluate(&r, "sound", Some("audio"), &t);
        assert!(!v.relevant);
        assert_eq!(v.tier, MatchTier::CategoryMiss);

        // Same search against a record that mentions headphones -> passes.
        let r2 = rec("Headphone amp", "https://x/p/amp", "Tiny headphone amp");
        let v2 = evaluate(&r2, "sound", Some("audio"), &t);
        assert!(v2.relevant);
        assert_eq!(v2.tier, MatchTier::CategorySynonym);
    }

    #[test]
    fn word_fallback_ignores_short_words() {
        let t = tax();
        let r = rec("An ox cart", "https://x/p/cart", "");
        // "ox" is below min_word_len, "wooden" does not appear.
        let v = evaluate(&r, "ox wooden", None, &t);
        assert!(!v.relevant);

        let r2 = rec("A wooden cart", "https://x/p/cart2", "");
        assert!(is_relevant(&r2, "ox wooden", None, &t));
    }

    #[test]
    fn semantic_equivalents_match_phrase() {
        let t = tax();
        let r = rec("Dice tower deluxe", "https://x/p/dice-tower", "");
        let v = evaluate(&r, "board", None, &t);
        assert!(v.relevant);
        assert_eq!(v.tier, MatchTier::SemanticEquivalent);
    }

    #[test]
    fn decision_is_idempotent() {
        let t = tax();
        let r = rec(
            "Bluetti portable speaker rig",
            "https://x/p/rig",
            "A power station in disguise",
        );
        let first = evaluate(&r, "audio", Some("audio"), &t);
        let second = evaluate(&r, "audio", Some("audio"), &t);
        assert_eq!(first, second);
    }
}
