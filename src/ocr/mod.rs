// src/ocr/mod.rs
//! OCR enhancement pipeline: decide which records need enrichment, mine
//! candidate images from the record and the live page, call the OCR
//! service, and merge the result into an immutable enhancement envelope.
//! No stage failure ever drops the underlying record.

pub mod client;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::record::CampaignRecord;
use crate::renderer::{PageImage, PageRenderer, WaitStrategy};
use client::{EnhanceRequest, OcrClient, OcrStatus};

/// Fields a complete record must carry; any empty/placeholder value marks
/// the record as needing enhancement.
pub const REQUIRED_FIELDS: &[&str] = &[
    "project_owner",
    "owner_website",
    "owner_sns",
    "contact_info",
    "achievement_rate",
    "supporters",
    "amount",
    "support_amount",
    "crowdfund_start_date",
    "crowdfund_end_date",
    "title",
];

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ocr_enhanced_total", "Records successfully enhanced.");
        describe_counter!("ocr_errors_total", "Records tagged with an OCR error.");
        describe_counter!(
            "ocr_skipped_total",
            "Records skipped because their data was already complete."
        );
    });
}

/// Enhancement envelope around a campaign record. Created once per record
/// entering the pipeline; never re-enhanced.
///
/// Invariant: `ocr_enhanced` and `ocr_error` are never both set.
#[derive(Debug, Clone)]
pub struct EnhancedRecord {
    pub record: CampaignRecord,
    pub ocr_enhanced: bool,
    pub ocr_error: Option<String>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub images_processed: usize,
    pub enhancement_timestamp: Option<DateTime<Utc>>,
    pub enhanced_english: Option<Map<String, Value>>,
    pub enhanced_original: Option<Map<String, Value>>,
}

impl EnhancedRecord {
    /// Wrap a record that never entered (or did not need) the OCR stage.
    pub fn untouched(record: CampaignRecord) -> Self {
        Self {
            record,
            ocr_enhanced: false,
            ocr_error: None,
            confidence_scores: BTreeMap::new(),
            images_processed: 0,
            enhancement_timestamp: None,
            enhanced_english: None,
            enhanced_original: None,
        }
    }

    fn failed(record: CampaignRecord, error: impl Into<String>) -> Self {
        Self {
            ocr_error: Some(error.into()),
            ..Self::untouched(record)
        }
    }
}

/// Placeholder detection shared by the missing-field check and the service
/// payload.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let t = s.trim();
            t.is_empty() || t == "Unknown" || t == "-" || t == "N/A"
        }
        _ => false,
    }
}

/// Required fields currently empty on the record's display document.
pub fn missing_fields(record: &CampaignRecord) -> Vec<String> {
    let doc = record.to_document();
    REQUIRED_FIELDS
        .iter()
        .filter(|f| doc.get(**f).map(is_blank).unwrap_or(true))
        .map(|f| f.to_string())
        .collect()
}

pub struct OcrPipeline {
    client: Arc<dyn OcrClient>,
    renderer: Arc<dyn PageRenderer>,
    cfg: OcrConfig,
}

impl OcrPipeline {
    pub fn new(client: Arc<dyn OcrClient>, renderer: Arc<dyn PageRenderer>, cfg: OcrConfig) -> Self {
        Self {
            client,
            renderer,
            cfg,
        }
    }

    pub async fn status(&self) -> OcrStatus {
        self.client.health().await
    }

    /// `force_enhance` runs the pipeline unconditionally; otherwise only
    /// records with missing required fields enter.
    pub fn needs_enhancement(&self, record: &CampaignRecord) -> bool {
        self.cfg.force_enhance || !missing_fields(record).is_empty()
    }

    fn keep_image(&self, img: &PageImage) -> bool {
        const BANNED: &[&str] = &[
            "avatar",
            "profile",
            "icon",
            "logo",
            "button",
            "placeholder",
            "spinner",
            "loading",
        ];
        img.url.starts_with("http")
            && img.url.len() > 25
            && !BANNED.iter().any(|b| img.url.contains(b))
            && img.width >= self.cfg.image_min_width
            && img.height >= self.cfg.image_min_height
    }

    /// The record's own primary image, if usable.
    fn project_image(record: &CampaignRecord) -> Option<PageImage> {
        record
            .image_url
            .as_deref()
            .filter(|u| u.starts_with("http"))
            .map(|u| PageImage {
                url: u.to_string(),
                alt: "Main project image".to_string(),
                width: 800,
                height: 600,
                source: "project_data".to_string(),
            })
    }

    /// Gather candidate images: the record's own image first, then a
    /// SEPARATE short-lived browsing context over the live detail page.
    /// The context is closed on every exit path; page failures degrade to
    /// the record's own image.
    pub async fn gather_images(&self, record: &CampaignRecord) -> Vec<PageImage> {
        let mut images: Vec<PageImage> = Vec::new();
        if let Some(main) = Self::project_image(record) {
            images.push(main);
        }

        let url = record.url.clone();
        let mined = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                // Weakening wait strategies: settle for less the longer the
                // page refuses to finish loading.
                let strategies = [
                    (WaitStrategy::DomContentLoaded, Duration::from_secs(15)),
                    (WaitStrategy::NetworkIdle, Duration::from_secs(10)),
                    (WaitStrategy::Load, Duration::from_secs(8)),
                ];
                let mut navigated = false;
                for (wait, timeout) in strategies {
                    if sess.navigate(&url, wait, timeout).await.is_ok() {
                        navigated = true;
                        break;
                    }
                }
                if !navigated {
                    anyhow::bail!("all navigation strategies failed for {url}");
                }

                if let Err(e) = sess.scroll_to_bottom(12).await {
                    warn!(url = %url, error = ?e, "ocr: lazy-image scroll failed");
                }
                sess.images().await
            })
        })
        .await;

        match mined {
            Ok(page_images) => {
                images.extend(page_images.into_iter().filter(|i| self.keep_image(i)));
            }
            Err(e) => {
                warn!(url = %record.url, error = ?e, "ocr: image mining failed, using project image only");
            }
        }

        // Dedup by URL, preserving project-image-first ordering.
        let mut seen = std::collections::HashSet::new();
        images.retain(|i| seen.insert(i.url.clone()));
        images.truncate(self.cfg.max_images_per_project);
        images
    }

    /// Run one record through the full state machine:
    /// needs-check -> gather -> enhance -> merge.
    pub async fn process(&self, record: CampaignRecord) -> EnhancedRecord {
        ensure_metrics_described();

        if !self.needs_enhancement(&record) {
            counter!("ocr_skipped_total").increment(1);
            return EnhancedRecord::untouched(record);
        }

        let images = self.gather_images(&record).await;
        if images.is_empty() {
            counter!("ocr_errors_total").increment(1);
            return EnhancedRecord::failed(record, "No images found");
        }

        let request = EnhanceRequest {
            project_data: record.to_document(),
            missing_fields: missing_fields(&record),
            images,
        };
        let image_count = request.images.len();
        let outcome = self.client.enhance(&request).await;

        if !outcome.success {
            counter!("ocr_errors_total").increment(1);
            let reason = outcome.error.unwrap_or_else(|| "Unknown error".to_string());
            return EnhancedRecord::failed(record, reason);
        }

        counter!("ocr_enhanced_total").increment(1);
        info!(
            url = %record.url,
            images = image_count,
            fields = outcome.confidence_scores.len(),
            "ocr: record enhanced"
        );
        EnhancedRecord {
            record,
            ocr_enhanced: true,
            ocr_error: None,
            confidence_scores: outcome.confidence_scores,
            images_processed: outcome.images_processed.unwrap_or(image_count),
            enhancement_timestamp: Some(Utc::now()),
            enhanced_english: outcome.enhanced_data_english,
            enhanced_original: outcome.enhanced_data_original,
        }
    }

    /// Process a batch with the service-liveness gate and politeness spacing
    /// between records. A disconnected service tags every record instead of
    /// dropping any.
    pub async fn process_batch(&self, records: Vec<CampaignRecord>) -> Vec<EnhancedRecord> {
        ensure_metrics_described();

        if !self.client.health().await.is_connected() {
            warn!("ocr: service unavailable, tagging batch without enhancement");
            return records
                .into_iter()
                .map(|r| {
                    counter!("ocr_errors_total").increment(1);
                    EnhancedRecord::failed(r, "Service unavailable")
                })
                .collect();
        }

        let delay = Duration::from_millis(self.cfg.delay_between_projects_ms);
        let total = records.len();
        let mut out = Vec::with_capacity(total);
        for (i, record) in records.into_iter().enumerate() {
            out.push(self.process(record).await);
            if i + 1 < total {
                tokio::time::sleep(delay).await;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Currency, Money};

    fn complete_record() -> CampaignRecord {
        let mut r = CampaignRecord::new("Kickstarter", "https://k/p/full");
        r.title = "Full".into();
        r.original_title = "Full".into();
        r.project_owner = "Acme".into();
        r.owner_website = Some("https://acme.example".into());
        r.owner_sns = Some("https://twitter.com/acme".into());
        r.contact_info = Some("acme@example.com".into());
        r.achievement_rate = Some(120.0);
        r.supporters = Some(10);
        r.raised = Some(Money::new(1200.0, Currency::Usd));
        r.goal = Some(Money::new(1000.0, Currency::Usd));
        r.start_date = crate::record::parse_date("2026-01-01");
        r.end_date = crate::record::parse_date("2026-02-01");
        r
    }

    #[test]
    fn complete_record_has_no_missing_fields() {
        assert!(missing_fields(&complete_record()).is_empty());
    }

    #[test]
    fn placeholders_count_as_missing() {
        let mut r = complete_record();
        r.project_owner = "Unknown".into();
        r.supporters = None;
        let missing = missing_fields(&r);
        assert!(missing.contains(&"project_owner".to_string()));
        assert!(missing.contains(&"supporters".to_string()));
    }
}
