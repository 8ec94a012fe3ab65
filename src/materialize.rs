// src/materialize.rs
//! Result materializer: partitions an enhanced batch into an English view
//! and an original-language view, computes aggregate statistics, and hands
//! both documents to a storage collaborator. Pure format/aggregation; the
//! only I/O lives in the `ResultStore` implementations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ocr::EnhancedRecord;
use crate::record::{has_currency_notation, Currency};
use crate::translation::{apply_phrase_glossary_ja, field_label_ja, value_label_ja};

/// Platforms whose source content is English; their text gets the
/// best-effort phrase-substitution pass in the Japanese view.
const ENGLISH_PLATFORMS: &[&str] = &["kickstarter", "indiegogo", "gofundme"];

/// Platform id -> currency used for amount prefixes.
fn platform_currency(platform: &str) -> Currency {
    match platform.to_lowercase().as_str() {
        "makuake" | "campfire" | "greenfunding" | "machiya" => Currency::Jpy,
        "flyingv" | "zeczec" => Currency::Twd,
        "wadiz" => Currency::Krw,
        _ => Currency::Usd,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub total: usize,
    pub enhanced: usize,
    pub errors: usize,
    pub completed_without_ocr: usize,
    pub rate_display: String,
}

/// `"0%"` for an empty batch, two decimals otherwise (`"66.67%"`).
pub fn enhancement_rate(enhanced: usize, total: usize) -> String {
    if total == 0 {
        "0%".to_string()
    } else {
        format!("{:.2}%", enhanced as f64 / total as f64 * 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct MaterializedBatch {
    pub english: Value,
    pub original: Value,
    pub stats: BatchStats,
    pub folder: String,
    pub english_file: String,
    pub original_file: String,
}

fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        "all".to_string()
    } else {
        cleaned
    }
}

fn overlay_patch(doc: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (k, v) in patch {
        let blank = matches!(v, Value::Null)
            || matches!(v, Value::String(s) if s.trim().is_empty());
        if !blank {
            doc.insert(k.clone(), v.clone());
        }
    }
}

/// Prefix amount-like fields with the platform currency symbol when no
/// recognized currency notation is present.
fn ensure_currency_prefix(doc: &mut Map<String, Value>, currency: Currency) {
    for key in ["amount", "support_amount"] {
        if let Some(Value::String(s)) = doc.get(key) {
            if !s.is_empty() && !has_currency_notation(s) {
                let prefixed = format!("{}{}", currency.symbol(), s);
                doc.insert(key.to_string(), Value::String(prefixed));
            }
        }
    }
}

fn attach_envelope(doc: &mut Map<String, Value>, rec: &EnhancedRecord) {
    doc.insert("ocr_enhanced".into(), Value::Bool(rec.ocr_enhanced));
    if let Some(err) = &rec.ocr_error {
        doc.insert("ocr_error".into(), Value::String(err.clone()));
    }
    if rec.ocr_enhanced {
        doc.insert(
            "confidence_scores".into(),
            serde_json::to_value(&rec.confidence_scores).unwrap_or(Value::Null),
        );
        doc.insert("images_processed".into(), json!(rec.images_processed));
        if let Some(ts) = rec.enhancement_timestamp {
            doc.insert("enhancement_timestamp".into(), json!(ts.to_rfc3339()));
        }
    }
}

fn english_doc(rec: &EnhancedRecord, currency: Currency) -> Map<String, Value> {
    let mut doc = rec.record.to_document();
    if rec.ocr_enhanced {
        match &rec.enhanced_english {
            Some(patch) => overlay_patch(&mut doc, patch),
            None => {
                doc.insert(
                    "translation_note".into(),
                    json!("OCR completed without a distinct English payload"),
                );
            }
        }
    }
    attach_envelope(&mut doc, rec);
    ensure_currency_prefix(&mut doc, currency);
    doc
}

fn original_doc(rec: &EnhancedRecord, platform: &str, currency: Currency) -> Map<String, Value> {
    let mut doc = rec.record.to_document();
    if rec.ocr_enhanced {
        if let Some(patch) = &rec.enhanced_original {
            overlay_patch(&mut doc, patch);
        }
    }
    attach_envelope(&mut doc, rec);
    ensure_currency_prefix(&mut doc, currency);

    // English-source platforms get the curated phrase pass over their text.
    if ENGLISH_PLATFORMS.contains(&platform.to_lowercase().as_str()) {
        for key in ["title", "description"] {
            if let Some(Value::String(s)) = doc.get(key) {
                let translated = apply_phrase_glossary_ja(s);
                doc.insert(key.to_string(), Value::String(translated));
            }
        }
    }

    // Fixed value set: status words, completion, countries, platform names.
    for key in [
        "status",
        "current_or_completed_project",
        "owner_country",
        "platform",
    ] {
        if let Some(Value::String(s)) = doc.get(key) {
            if let Some(translated) = value_label_ja(s) {
                doc.insert(key.to_string(), Value::String(translated.to_string()));
            }
        }
    }

    // Remap field names last; confidence keys are field names too.
    let mut localized = Map::new();
    for (k, v) in doc {
        let value = if k == "confidence_scores" {
            match v {
                Value::Object(scores) => Value::Object(
                    scores
                        .into_iter()
                        .map(|(fk, fv)| (field_label_ja(&fk).to_string(), fv))
                        .collect(),
                ),
                other => other,
            }
        } else {
            v
        };
        localized.insert(field_label_ja(&k).to_string(), value);
    }
    localized
}

/// Build both language views and the aggregate statistics for one batch.
pub fn materialize(
    records: &[EnhancedRecord],
    platform: &str,
    category: &str,
    keyword: &str,
) -> MaterializedBatch {
    let currency = platform_currency(platform);
    let total = records.len();
    let enhanced = records.iter().filter(|r| r.ocr_enhanced).count();
    let errors = records.iter().filter(|r| r.ocr_error.is_some()).count();
    let stats = BatchStats {
        total,
        enhanced,
        errors,
        completed_without_ocr: total - enhanced - errors,
        rate_display: enhancement_rate(enhanced, total),
    };

    let platform_key = sanitize_component(platform);
    let category_key = sanitize_component(category);
    let folder = format!("{platform_key}_{category_key}");
    let english_file = format!("{platform_key}_english_{category_key}.json");
    let original_file = format!("{platform_key}_japanese_{category_key}.json");
    let generated_at = Utc::now().to_rfc3339();

    let english_results: Vec<Value> = records
        .iter()
        .map(|r| Value::Object(english_doc(r, currency)))
        .collect();
    let english = json!({
        "success": true,
        "platform": platform,
        "category": category,
        "keyword": keyword,
        "count": total,
        "enhanced_count": enhanced,
        "error_count": errors,
        "enhancement_rate": stats.rate_display,
        "generated_at": generated_at,
        "processing_summary": {
            "total_projects": total,
            "ocr_enhanced_count": enhanced,
            "ocr_error_count": errors,
            "completed_without_ocr": stats.completed_without_ocr,
        },
        "file": english_file,
        "language": "english",
        "folder": folder,
        "results": english_results,
    });

    let original_results: Vec<Value> = records
        .iter()
        .map(|r| Value::Object(original_doc(r, platform, currency)))
        .collect();
    let mut original_meta = Map::new();
    let mut put = |key: &str, value: Value| {
        original_meta.insert(field_label_ja(key).to_string(), value);
    };
    put("success", json!(true));
    put(
        "platform",
        json!(value_label_ja(platform).unwrap_or(platform)),
    );
    put("category", json!(category));
    put("keyword", json!(keyword));
    put("count", json!(total));
    put("enhanced_count", json!(enhanced));
    put("error_count", json!(errors));
    put("enhancement_rate", json!(stats.rate_display));
    put("generated_at", json!(generated_at));
    let mut summary = Map::new();
    summary.insert(field_label_ja("total_projects").to_string(), json!(total));
    summary.insert(
        field_label_ja("ocr_enhanced_count").to_string(),
        json!(enhanced),
    );
    summary.insert(field_label_ja("ocr_error_count").to_string(), json!(errors));
    summary.insert(
        field_label_ja("completed_without_ocr").to_string(),
        json!(stats.completed_without_ocr),
    );
    put("processing_summary", Value::Object(summary));
    put("file", json!(original_file));
    put("language", json!("japanese"));
    put("folder", json!(folder));
    put(
        "translation_note",
        json!("すべてのデータは日本語に翻訳されています。英語プラットフォームのコンテンツはキーワードベース翻訳が適用されています。"),
    );
    put("results", Value::Array(original_results));

    MaterializedBatch {
        english,
        original: Value::Object(original_meta),
        stats,
        folder,
        english_file,
        original_file,
    }
}

/// Storage collaborator for materialized documents.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Returns the paths both documents were written to.
    async fn persist(&self, batch: &MaterializedBatch) -> Result<(PathBuf, PathBuf)>;
}

/// One folder per `{platform}_{category}`, one JSON document per language.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ResultStore for FileStore {
    async fn persist(&self, batch: &MaterializedBatch) -> Result<(PathBuf, PathBuf)> {
        let dir = self.root.join(&batch.folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating result folder {}", dir.display()))?;

        let english_path = dir.join(&batch.english_file);
        let original_path = dir.join(&batch.original_file);

        let english = serde_json::to_vec_pretty(&batch.english)?;
        tokio::fs::write(&english_path, english)
            .await
            .with_context(|| format!("writing {}", english_path.display()))?;

        let original = serde_json::to_vec_pretty(&batch.original)?;
        tokio::fs::write(&original_path, original)
            .await
            .with_context(|| format!("writing {}", original_path.display()))?;

        info!(
            folder = %dir.display(),
            count = batch.stats.total,
            "materialized batch persisted"
        );
        Ok((english_path, original_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::EnhancedRecord;
    use crate::record::{CampaignRecord, Money, ProjectStatus};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn base_record(url: &str) -> CampaignRecord {
        let mut r = CampaignRecord::new("Kickstarter", url);
        r.title = "Portable Speaker".into();
        r.original_title = "Portable Speaker".into();
        r.status = ProjectStatus::Successful;
        r.owner_country = Some("United States".into());
        r.raised = Some(Money::new(45000.0, crate::record::Currency::Usd));
        r
    }

    fn enhanced(url: &str) -> EnhancedRecord {
        let mut patch_en = serde_json::Map::new();
        patch_en.insert("project_owner".into(), json!("Acme Audio"));
        let mut patch_orig = serde_json::Map::new();
        patch_orig.insert("project_owner".into(), json!("アクメオーディオ"));
        EnhancedRecord {
            record: base_record(url),
            ocr_enhanced: true,
            ocr_error: None,
            confidence_scores: BTreeMap::from([("project_owner".to_string(), 0.92)]),
            images_processed: 3,
            enhancement_timestamp: Some(Utc::now()),
            enhanced_english: Some(patch_en),
            enhanced_original: Some(patch_orig),
        }
    }

    #[test]
    fn rate_boundaries() {
        assert_eq!(enhancement_rate(0, 0), "0%");
        assert_eq!(enhancement_rate(3, 3), "100.00%");
        assert_eq!(enhancement_rate(2, 3), "66.67%");
    }

    #[test]
    fn stats_partition_the_batch() {
        let records = vec![
            enhanced("https://k/p/1"),
            EnhancedRecord::untouched(base_record("https://k/p/2")),
            {
                let mut r = EnhancedRecord::untouched(base_record("https://k/p/3"));
                r.ocr_error = Some("No images found".into());
                r
            },
        ];
        let batch = materialize(&records, "kickstarter", "technology", "speaker");
        assert_eq!(batch.stats.total, 3);
        assert_eq!(batch.stats.enhanced, 1);
        assert_eq!(batch.stats.errors, 1);
        assert_eq!(batch.stats.completed_without_ocr, 1);
        assert_eq!(batch.stats.rate_display, "33.33%");
    }

    #[test]
    fn english_view_overlays_english_patch() {
        let batch = materialize(&[enhanced("https://k/p/1")], "kickstarter", "tech", "speaker");
        let results = batch.english["results"].as_array().unwrap();
        assert_eq!(results[0]["project_owner"], "Acme Audio");
        assert_eq!(results[0]["ocr_enhanced"], true);
        assert!(results[0].get("ocr_error").is_none());
    }

    #[test]
    fn english_view_notes_missing_english_payload() {
        let mut rec = enhanced("https://k/p/1");
        rec.enhanced_english = None;
        let batch = materialize(&[rec], "kickstarter", "tech", "speaker");
        let results = batch.english["results"].as_array().unwrap();
        assert!(results[0].get("translation_note").is_some());
    }

    #[test]
    fn original_view_localizes_names_and_values() {
        let batch = materialize(&[enhanced("https://k/p/1")], "kickstarter", "tech", "speaker");
        let results = batch.original["結果"].as_array().unwrap();
        let doc = &results[0];
        // Field names remapped.
        assert_eq!(doc["プロジェクトオーナー"], "アクメオーディオ");
        // Values remapped.
        assert_eq!(doc["ステータス"], "成功済み");
        assert_eq!(doc["オーナー国"], "アメリカ");
        assert_eq!(doc["プラットフォーム"], "キックスターター");
        // English-platform title got the phrase pass.
        assert_eq!(doc["タイトル"], "ポータブル スピーカー");
        // Confidence keys are field names too.
        assert!(doc["信頼度スコア"].get("プロジェクトオーナー").is_some());
    }

    #[test]
    fn currency_prefix_added_when_absent() {
        let mut rec = EnhancedRecord::untouched({
            let mut r = base_record("https://m/p/1");
            r.platform = "Makuake".into();
            r.raised = None;
            r
        });
        // Patch writes a bare number; the original view must prefix it.
        let mut patch = serde_json::Map::new();
        patch.insert("amount".into(), json!("2,310,000"));
        rec.ocr_enhanced = true;
        rec.enhanced_original = Some(patch.clone());
        rec.enhanced_english = Some(patch);

        let batch = materialize(&[rec], "makuake", "fashion", "wallet");
        let en = batch.english["results"].as_array().unwrap();
        assert_eq!(en[0]["amount"], "¥2,310,000");
        let ja = batch.original["結果"].as_array().unwrap();
        assert_eq!(ja[0]["金額"], "¥2,310,000");
    }

    #[tokio::test]
    async fn file_store_writes_both_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        let batch = materialize(&[enhanced("https://k/p/1")], "kickstarter", "tech", "speaker");
        let (en, ja) = store.persist(&batch).await.expect("persist");
        assert!(en.ends_with("kickstarter_tech/kickstarter_english_tech.json"));
        assert!(ja.ends_with("kickstarter_tech/kickstarter_japanese_tech.json"));
        let raw = std::fs::read_to_string(en).expect("read english");
        let doc: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(doc["count"], 1);
    }
}
