// src/config.rs
//! Service configuration loaded from `config/app.toml` with env overrides.

use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_CONFIG_PATH: &str = "CROWDSCOUT_CONFIG_PATH";
pub const ENV_OCR_SERVICE_URL: &str = "OCR_SERVICE_URL";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_OCR_FORCE_ENHANCE: &str = "OCR_FORCE_ENHANCE";

const EMBEDDED_CONFIG: &str = include_str!("../config/app.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub ocr: OcrConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Per-navigation timeout for listing and detail pages.
    pub nav_timeout_secs: u64,
    /// Detail pages rendered concurrently per batch.
    pub batch_size: usize,
    /// Listing-page navigation attempts before giving up.
    pub max_retries: u32,
    /// Politeness spacing between detail batches.
    pub delay_between_batches_ms: u64,
    /// Cap on auto-scroll iterations for lazy-loaded listings.
    pub scroll_max_steps: u32,
    /// Cap on records returned by one scrape call.
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub service_url: String,
    /// Generous: the service may analyze several images per call.
    pub enhance_timeout_secs: u64,
    pub health_timeout_secs: u64,
    /// Run enhancement even for complete records. Explicit configuration,
    /// passed into the pipeline constructor.
    pub force_enhance: bool,
    pub max_images_per_project: usize,
    pub image_min_width: u32,
    pub image_min_height: u32,
    /// Politeness spacing between successive records in a batch.
    pub delay_between_projects_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
}

impl AppConfig {
    /// Load from `$CROWDSCOUT_CONFIG_PATH`, then `config/app.toml`, then the
    /// embedded defaults, applying env overrides last.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let content = fs::read_to_string(&path).unwrap_or_else(|_| EMBEDDED_CONFIG.to_string());
        let mut cfg: AppConfig = toml::from_str(&content)?;

        if let Ok(url) = env::var(ENV_OCR_SERVICE_URL) {
            cfg.ocr.service_url = url;
        }
        if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
            cfg.output.directory = dir;
        }
        if let Ok(v) = env::var(ENV_OCR_FORCE_ENHANCE) {
            cfg.ocr.force_enhance = v == "1" || v.eq_ignore_ascii_case("true");
        }

        // Harden the knobs that would stall the pipeline if zeroed.
        if cfg.scraper.batch_size == 0 {
            cfg.scraper.batch_size = 1;
        }
        if cfg.scraper.max_retries == 0 {
            cfg.scraper.max_retries = 1;
        }

        Ok(cfg)
    }

    /// Embedded defaults only; used by tests.
    pub fn defaults() -> Self {
        toml::from_str(EMBEDDED_CONFIG).expect("embedded app config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let cfg = AppConfig::defaults();
        assert_eq!(cfg.scraper.batch_size, 3);
        assert_eq!(cfg.ocr.max_images_per_project, 5);
        assert!(!cfg.ocr.force_enhance);
        assert_eq!(cfg.output.directory, "./results");
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply() {
        std::env::set_var(ENV_OCR_SERVICE_URL, "http://ocr.internal:5000");
        std::env::set_var(ENV_OCR_FORCE_ENHANCE, "true");
        let cfg = AppConfig::load().expect("load");
        assert_eq!(cfg.ocr.service_url, "http://ocr.internal:5000");
        assert!(cfg.ocr.force_enhance);
        std::env::remove_var(ENV_OCR_SERVICE_URL);
        std::env::remove_var(ENV_OCR_FORCE_ENHANCE);
    }
}
