// src/ocr/client.rs
//! Client for the OCR/image-analysis sidecar. Enhancement calls never fail
//! upward: transport and service errors become `success = false` outcomes
//! that wrap the original record unchanged in both language variants.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use crate::config::OcrConfig;
use crate::renderer::PageImage;

#[derive(Debug, Clone, Serialize)]
pub struct EnhanceRequest {
    pub project_data: Map<String, Value>,
    pub images: Vec<PageImage>,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnhanceOutcome {
    pub success: bool,
    #[serde(default)]
    pub enhanced_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub enhanced_data_english: Option<Map<String, Value>>,
    #[serde(default)]
    pub enhanced_data_original: Option<Map<String, Value>>,
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub images_processed: Option<usize>,
    #[serde(default)]
    pub overall_confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EnhanceOutcome {
    /// Failure outcome echoing the caller's record in both variants.
    pub fn failure(project_data: &Map<String, Value>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            enhanced_data: Some(project_data.clone()),
            enhanced_data_english: Some(project_data.clone()),
            enhanced_data_original: Some(project_data.clone()),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// The service may omit the per-language payloads; older deployments
    /// return only `enhanced_data`. Normalize so downstream always has both.
    pub fn normalized(mut self, project_data: &Map<String, Value>) -> Self {
        if self.enhanced_data_english.is_none() {
            self.enhanced_data_english = self.enhanced_data.clone();
        }
        if self.enhanced_data_original.is_none() {
            self.enhanced_data_original = self.enhanced_data.clone().map(|patch| {
                let mut merged = project_data.clone();
                for (k, v) in patch {
                    merged.insert(k, v);
                }
                merged
            });
        }
        self
    }
}

/// Liveness of the OCR sidecar, used as a gate before running the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OcrStatus {
    Connected { data: Value },
    Disconnected { error: String },
}

impl OcrStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, OcrStatus::Connected { .. })
    }
}

#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn enhance(&self, request: &EnhanceRequest) -> EnhanceOutcome;
    async fn health(&self) -> OcrStatus;
}

pub struct HttpOcrClient {
    http: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
}

impl HttpOcrClient {
    pub fn new(cfg: &OcrConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("crowdscout/0.1 (+github.com/crowdscout/crowdscout)")
            .connect_timeout(Duration::from_secs(4))
            // Generous: the service may analyze several images per call.
            .timeout(Duration::from_secs(cfg.enhance_timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: cfg.service_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(cfg.health_timeout_secs),
        }
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn enhance(&self, request: &EnhanceRequest) -> EnhanceOutcome {
        let url = format!("{}/v1/enhance-crowdfunding", self.base_url);
        let resp = match self.http.post(&url).json(request).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "ocr: enhance request failed");
                return EnhanceOutcome::failure(&request.project_data, e.to_string());
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "ocr: enhance returned non-success status");
            return EnhanceOutcome::failure(
                &request.project_data,
                format!("OCR service returned {status}"),
            );
        }
        match resp.json::<EnhanceOutcome>().await {
            Ok(outcome) => outcome.normalized(&request.project_data),
            Err(e) => {
                warn!(error = %e, "ocr: malformed enhance response");
                EnhanceOutcome::failure(&request.project_data, format!("malformed response: {e}"))
            }
        }
    }

    async fn health(&self) -> OcrStatus {
        let url = format!("{}/v1/health", self.base_url);
        let req = self.http.get(&url).timeout(self.health_timeout).send();
        match req.await {
            Ok(resp) if resp.status().is_success() => {
                let data = resp.json::<Value>().await.unwrap_or(Value::Null);
                OcrStatus::Connected { data }
            }
            Ok(resp) => OcrStatus::Disconnected {
                error: format!("health returned {}", resp.status()),
            },
            Err(e) => OcrStatus::Disconnected {
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("title".into(), json!("Widget"));
        m.insert("project_owner".into(), json!(""));
        m
    }

    #[test]
    fn failure_echoes_record_in_both_variants() {
        let d = doc();
        let out = EnhanceOutcome::failure(&d, "boom");
        assert!(!out.success);
        assert_eq!(out.enhanced_data_english.as_ref(), Some(&d));
        assert_eq!(out.enhanced_data_original.as_ref(), Some(&d));
        assert_eq!(out.error.as_deref(), Some("boom"));
    }

    #[test]
    fn normalization_backfills_language_payloads() {
        let d = doc();
        let raw: EnhanceOutcome = serde_json::from_value(json!({
            "success": true,
            "enhanced_data": { "project_owner": "Acme" },
            "confidence_scores": { "project_owner": 0.9 }
        }))
        .expect("outcome json");
        let out = raw.normalized(&d);
        assert_eq!(
            out.enhanced_data_english.unwrap()["project_owner"],
            json!("Acme")
        );
        // Original variant is the record overlaid with the patch.
        let original = out.enhanced_data_original.unwrap();
        assert_eq!(original["title"], json!("Widget"));
        assert_eq!(original["project_owner"], json!("Acme"));
    }
}
