// src/taxonomy.rs
//! Shared search taxonomy: category synonym sets, exclusion lists, and
//! keyword semantic equivalents, loaded once from TOML and referenced by
//! id everywhere (relevance filter and adapters alike).

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_TAXONOMY_PATH: &str = "config/taxonomy.toml";
pub const ENV_TAXONOMY_PATH: &str = "TAXONOMY_CONFIG_PATH";

/// Compiled-in fallback so the binary works without a deployed config dir.
const EMBEDDED_TAXONOMY: &str = include_str!("../config/taxonomy.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyRoot {
    pub relevance: RelevanceSection,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub equivalents: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceSection {
    /// How many unfiltered records to return when filtering would
    /// otherwise hide an otherwise-successful scrape.
    pub fallback_cap: usize,
    /// Words at or above this length participate in the word-match tier.
    pub min_word_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub id: String,
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// Lookup-friendly view over the parsed config.
#[derive(Debug)]
pub struct Taxonomy {
    pub cfg: RelevanceSection,
    categories: HashMap<String, CategoryEntry>,
    equivalents: HashMap<String, Vec<String>>,
}

impl Taxonomy {
    /// Load from `$TAXONOMY_CONFIG_PATH`, then `config/taxonomy.toml`, then
    /// the embedded copy.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_TAXONOMY_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TAXONOMY_PATH));

        match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(_) => Self::from_toml_str(EMBEDDED_TAXONOMY),
        }
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let root: TaxonomyRoot = toml::from_str(toml_str)?;
        let categories = root
            .categories
            .into_iter()
            .map(|c| (c.id.to_ascii_lowercase(), c))
            .collect();
        let equivalents = root
            .equivalents
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Ok(Self {
            cfg: root.relevance,
            categories,
            equivalents,
        })
    }

    pub fn category(&self, id: &str) -> Option<&CategoryEntry> {
        self.categories.get(&id.to_ascii_lowercase())
    }

    /// Exclusion terms attached to `term` when it names a category with a
    /// non-empty exclusion list.
    pub fn exclusions_for(&self, term: &str) -> Option<&[String]> {
        self.category(term)
            .filter(|c| !c.exclusions.is_empty())
            .map(|c| c.exclusions.as_slice())
    }

    /// Semantic equivalents for an exact keyword phrase.
    pub fn equivalents(&self, phrase: &str) -> Option<&[String]> {
        self.equivalents
            .get(&phrase.to_ascii_lowercase())
            .map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_taxonomy_parses() {
        let tax = Taxonomy::from_toml_str(EMBEDDED_TAXONOMY).expect("embedded taxonomy");
        assert!(tax.cfg.fallback_cap > 0);
        assert!(tax.category("audio").is_some());
        assert!(tax.exclusions_for("audio").is_some());
        assert!(tax.exclusions_for("food").is_none(), "food has no exclusions");
        assert!(tax.equivalents("board").is_some());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let tax = Taxonomy::from_toml_str(EMBEDDED_TAXONOMY).expect("embedded taxonomy");
        assert!(tax.category("AUDIO").is_some());
        assert!(tax.equivalents("Game").is_some());
    }
}
