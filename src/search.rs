// src/search.rs
//! Search orchestration: validate -> resolve adapter -> scrape ->
//! (OCR pipeline) -> materialize -> persist -> respond. Persistence is
//! best-effort; the scrape result is the primary deliverable.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::registry::AdapterRegistry;
use crate::adapters::ScrapeOptions;
use crate::error::SearchError;
use crate::materialize::{materialize, MaterializedBatch, ResultStore};
use crate::ocr::{EnhancedRecord, OcrPipeline};
use crate::record::CampaignRecord;
use crate::repo::{NewSearch, SearchRepository};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub platform: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_enable_ocr", rename = "enableOCR")]
    pub enable_ocr: bool,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

fn default_enable_ocr() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub platform: String,
    pub category: String,
    pub keyword: String,
    pub count: usize,
    pub results: Vec<Value>,
    #[serde(rename = "searchId")]
    pub search_id: String,
    pub generated_at: String,
    pub message: String,
}

pub struct SearchService {
    registry: Arc<AdapterRegistry>,
    pipeline: Arc<OcrPipeline>,
    repo: Arc<dyn SearchRepository>,
    store: Arc<dyn ResultStore>,
}

impl SearchService {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        pipeline: Arc<OcrPipeline>,
        repo: Arc<dyn SearchRepository>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            registry,
            pipeline,
            repo,
            store,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<dyn SearchRepository> {
        &self.repo
    }

    pub fn pipeline(&self) -> &OcrPipeline {
        &self.pipeline
    }

    pub async fn run(&self, req: SearchRequest) -> Result<SearchResponse, SearchError> {
        // --- Validated / Rejected ---
        let platform = req
            .platform
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(SearchError::MissingPlatform)?
            .to_lowercase();
        let user_id = req
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(SearchError::MissingUserId)?
            .to_string();
        let category = req.category.clone().unwrap_or_default();
        let keyword = req.keyword.clone().unwrap_or_default();
        if category.trim().is_empty() && keyword.trim().is_empty() {
            return Err(SearchError::MissingQuery);
        }
        let category = if category.trim().is_empty() {
            "all".to_string()
        } else {
            category.trim().to_string()
        };
        let language = req.language.clone().unwrap_or_else(|| "en".to_string());

        // User lookup: a repository failure degrades (storage must never
        // gate the response); a definite miss is a rejection.
        match self.repo.find_user(&user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(SearchError::UnknownUser(user_id)),
            Err(e) => {
                warn!(error = ?e, "user lookup failed; continuing without verification");
            }
        }

        let adapter = self.registry.get(&platform)?;

        // --- Scraping ---
        info!(
            %platform,
            %category, %keyword, %language, ocr = req.enable_ocr, "search started"
        );
        let options = ScrapeOptions {
            language: language.clone(),
            max_results: None,
        };
        let records = adapter
            .scrape(&category, &keyword, &options)
            .await
            .map_err(SearchError::Scrape)?;

        // --- OCR pipeline (optional) ---
        let enhanced: Vec<EnhancedRecord> = if req.enable_ocr {
            self.pipeline.process_batch(records).await
        } else {
            records.into_iter().map(EnhancedRecord::untouched).collect()
        };

        // --- Materializing ---
        let batch = materialize(&enhanced, &platform, &category, &keyword);
        if req.enable_ocr {
            if let Err(e) = self.store.persist(&batch).await {
                warn!(error = ?e, "result file persistence failed");
            }
        }

        let results = tagged_results(&batch, &keyword, &language, req.enable_ocr);

        // --- Persisted (best-effort) ---
        let new_search = NewSearch {
            platform: platform.clone(),
            category: category.clone(),
            keyword: keyword.clone(),
            language: language.clone(),
            ocr_enabled: req.enable_ocr,
            result_count: results.len(),
        };
        let search_id = match self.repo.create_search(&user_id, &new_search).await {
            Ok(record) => record.id,
            Err(e) => {
                warn!(error = ?e, "search record creation failed, using fallback id");
                format!("temp-search-{}", Utc::now().timestamp_millis())
            }
        };
        if !results.is_empty() {
            if let Err(e) = self.repo.store_items(&user_id, &search_id, &results).await {
                warn!(error = ?e, "scraped item storage failed");
            }
        }

        // --- Responded ---
        let count = results.len();
        info!(%platform, count, %search_id, "search completed");
        Ok(SearchResponse {
            platform,
            category,
            keyword,
            count,
            results,
            search_id,
            generated_at: Utc::now().to_rfc3339(),
            message: if count > 0 {
                format!("Found {count} projects")
            } else {
                "No projects found".to_string()
            },
        })
    }

    /// Re-run the OCR pipeline over a previously persisted English result
    /// document and write the refreshed views.
    pub async fn enhance_existing(&self, file_path: &str) -> anyhow::Result<MaterializedBatch> {
        let raw = tokio::fs::read_to_string(Path::new(file_path)).await?;
        let doc: Value = serde_json::from_str(&raw)?;

        let results = doc
            .get("results")
            .and_then(Value::as_array)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No results found in the specified file"))?;
        let platform = doc
            .get("platform")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("File is missing its platform field"))?
            .to_string();
        let category = doc
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("all")
            .to_string();
        let keyword = doc
            .get("keyword")
            .and_then(Value::as_str)
            .unwrap_or("enhanced")
            .to_string();

        info!(
            file_path,
            count = results.len(),
            "re-enhancing existing results"
        );
        let mut enhanced = Vec::with_capacity(results.len());
        let total = results.len();
        for (i, item) in results.iter().enumerate() {
            let record = match item.as_object() {
                Some(obj) => CampaignRecord::from_document(obj),
                None => continue,
            };
            enhanced.push(self.pipeline.process(record).await);
            if i + 1 < total {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        let batch = materialize(&enhanced, &platform, &category, &keyword);
        self.store.persist(&batch).await?;
        Ok(batch)
    }
}

/// English-view result docs with the per-search tags the persisted items
/// and the response both carry.
fn tagged_results(
    batch: &MaterializedBatch,
    keyword: &str,
    language: &str,
    ocr_enabled: bool,
) -> Vec<Value> {
    batch
        .english
        .get("results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .cloned()
                .map(|mut item| {
                    if let Some(obj) = item.as_object_mut() {
                        obj.insert("keyword".into(), json!(keyword));
                        obj.insert("language".into(), json!(language));
                        obj.insert("ocr_enabled".into(), json!(ocr_enabled));
                    }
                    item
                })
                .collect()
        })
        .unwrap_or_default()
}
