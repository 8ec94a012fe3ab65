// src/adapters/registry.rs
//! Factory mapping platform ids to adapter instances, plus the discovery
//! metadata the HTTP surface exposes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::campfire::CampfireAdapter;
use super::flyingv::FlyingVAdapter;
use super::greenfunding::GreenFundingAdapter;
use super::indiegogo::IndiegogoAdapter;
use super::kickstarter::KickstarterAdapter;
use super::makuake::MakuakeAdapter;
use super::{CategoryTaxonomy, PlatformAdapter};
use crate::config::ScraperConfig;
use crate::error::SearchError;
use crate::renderer::PageRenderer;
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    /// Build the full production set.
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        cfg: ScraperConfig,
        taxonomy: Arc<Taxonomy>,
    ) -> Self {
        let adapters: Vec<Arc<dyn PlatformAdapter>> = vec![
            Arc::new(KickstarterAdapter::new(
                renderer.clone(),
                cfg.clone(),
                taxonomy.clone(),
            )),
            Arc::new(IndiegogoAdapter::new(
                renderer.clone(),
                cfg.clone(),
                taxonomy.clone(),
            )),
            Arc::new(MakuakeAdapter::new(
                renderer.clone(),
                cfg.clone(),
                taxonomy.clone(),
            )),
            Arc::new(CampfireAdapter::new(
                renderer.clone(),
                cfg.clone(),
                taxonomy.clone(),
            )),
            Arc::new(GreenFundingAdapter::new(
                renderer.clone(),
                cfg.clone(),
                taxonomy.clone(),
            )),
            Arc::new(FlyingVAdapter::new(renderer, cfg, taxonomy)),
        ];
        Self::with_adapters(adapters)
    }

    /// Custom adapter set; tests inject fixture-backed adapters here.
    pub fn with_adapters(adapters: Vec<Arc<dyn PlatformAdapter>>) -> Self {
        let adapters = adapters.into_iter().map(|a| (a.name(), a)).collect();
        Self { adapters }
    }

    /// Resolve a platform id; unknown ids are a client error.
    pub fn get(&self, platform: &str) -> Result<Arc<dyn PlatformAdapter>, SearchError> {
        let key = platform.trim().to_lowercase();
        self.adapters
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| SearchError::UnsupportedPlatform(platform.to_string()))
    }

    pub fn available_platforms(&self) -> Vec<PlatformInfo> {
        self.adapters
            .values()
            .map(|a| PlatformInfo {
                name: a.name().to_string(),
                display_name: a.display_name().to_string(),
                description: a.description().to_string(),
            })
            .collect()
    }

    /// Discovery must be resilient: unknown platform -> empty taxonomy,
    /// never an error.
    pub fn categories_of(&self, platform: &str) -> CategoryTaxonomy {
        match self.get(platform) {
            Ok(adapter) => adapter.categories(),
            Err(_) => CategoryTaxonomy::new(),
        }
    }
}
