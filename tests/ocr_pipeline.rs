// tests/ocr_pipeline.rs
//
// Pipeline tests with a mock OCR client and a scripted renderer:
// - the enhancement envelope invariant (enhanced XOR error, or neither)
// - "No images found" short-circuit
// - the service-liveness gate tagging a whole batch
// - force_enhance configuration
// - browsing-context accounting across success and failure paths

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crowdscout::config::AppConfig;
use crowdscout::ocr::client::{EnhanceOutcome, EnhanceRequest, OcrClient, OcrStatus};
use crowdscout::ocr::{missing_fields, EnhancedRecord, OcrPipeline};
use crowdscout::record::CampaignRecord;
use crowdscout::renderer::fixture::{FixturePage, FixtureRenderer};

struct MockOcr {
    connected: bool,
    succeed: bool,
    calls: AtomicUsize,
}

impl MockOcr {
    fn new(connected: bool, succeed: bool) -> Self {
        Self {
            connected,
            succeed,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OcrClient for MockOcr {
    async fn enhance(&self, request: &EnhanceRequest) -> EnhanceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeed {
            return EnhanceOutcome::failure(&request.project_data, "analysis failed");
        }
        let mut patch = serde_json::Map::new();
        patch.insert("project_owner".into(), json!("Acme Audio"));
        let mut patch_orig = serde_json::Map::new();
        patch_orig.insert("project_owner".into(), json!("アクメオーディオ"));
        EnhanceOutcome {
            success: true,
            enhanced_data: Some(patch.clone()),
            enhanced_data_english: Some(patch),
            enhanced_data_original: Some(patch_orig),
            confidence_scores: [("project_owner".to_string(), 0.91)].into_iter().collect(),
            images_processed: Some(request.images.len()),
            overall_confidence: Some(0.91),
            error: None,
        }
    }

    async fn health(&self) -> OcrStatus {
        if self.connected {
            OcrStatus::Connected {
                data: json!({"status": "ok"}),
            }
        } else {
            OcrStatus::Disconnected {
                error: "connection refused".to_string(),
            }
        }
    }
}

/// Incomplete record whose detail page serves minable images.
fn sparse_record() -> CampaignRecord {
    let mut r = CampaignRecord::new("Kickstarter", "https://k.example/projects/acme/widget");
    r.title = "Widget".into();
    r.original_title = "Widget".into();
    r.image_url = Some("https://img.example/widget-main-image-cover.jpg".into());
    r
}

fn detail_page_with_images() -> FixturePage {
    FixturePage::new("https://k.example/projects/acme/widget")
        .with_image("https://img.example/widget-gallery-photo-0001.jpg", 1200, 800)
        .with_image("https://img.example/user-avatar-tiny-image.png", 64, 64)
        .with_image("https://img.example/site-logo-header-image.png", 400, 300)
        .with_image("https://img.example/widget-gallery-photo-0002.jpg", 100, 80)
}

fn pipeline(
    client: Arc<MockOcr>,
    renderer: Arc<FixtureRenderer>,
    force: bool,
) -> OcrPipeline {
    let mut cfg = AppConfig::defaults().ocr;
    cfg.force_enhance = force;
    cfg.delay_between_projects_ms = 1;
    OcrPipeline::new(client, renderer, cfg)
}

#[tokio::test]
async fn successful_enhancement_sets_flag_without_error() {
    let client = Arc::new(MockOcr::new(true, true));
    let renderer = Arc::new(FixtureRenderer::new(vec![detail_page_with_images()]));
    let pipeline = pipeline(client.clone(), renderer.clone(), false);

    let out = pipeline.process(sparse_record()).await;
    assert!(out.ocr_enhanced);
    assert!(out.ocr_error.is_none(), "enhanced record must carry no error");
    assert!(out.enhancement_timestamp.is_some());
    assert_eq!(out.confidence_scores.get("project_owner"), Some(&0.91));
    // Project image + the one gallery image that passes the size and
    // name filters.
    assert_eq!(out.images_processed, 2);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn failed_enhancement_tags_error_and_keeps_record() {
    let client = Arc::new(MockOcr::new(true, false));
    let renderer = Arc::new(FixtureRenderer::new(vec![detail_page_with_images()]));
    let pipeline = pipeline(client, renderer.clone(), false);

    let out = pipeline.process(sparse_record()).await;
    assert!(!out.ocr_enhanced);
    assert_eq!(out.ocr_error.as_deref(), Some("analysis failed"));
    assert_eq!(out.record.title, "Widget", "record itself is never dropped");
    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn complete_record_is_skipped_entirely() {
    let client = Arc::new(MockOcr::new(true, true));
    let renderer = Arc::new(FixtureRenderer::new(vec![]));
    let pipeline = pipeline(client.clone(), renderer.clone(), false);

    let mut r = sparse_record();
    r.project_owner = "Acme".into();
    r.owner_website = Some("https://acme.example".into());
    r.owner_sns = Some("https://twitter.com/acme".into());
    r.contact_info = Some("acme@example.com".into());
    r.achievement_rate = Some(120.0);
    r.supporters = Some(10);
    r.raised = crowdscout::record::parse_money("$1,200");
    r.goal = crowdscout::record::parse_money("$1,000");
    r.start_date = crowdscout::record::parse_date("2026-01-01");
    r.end_date = crowdscout::record::parse_date("2026-02-01");
    assert!(missing_fields(&r).is_empty());

    let out = pipeline.process(r).await;
    assert!(!out.ocr_enhanced);
    assert!(out.ocr_error.is_none(), "skip is neither success nor error");
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.opened(), 0, "no page visit for complete records");
}

#[tokio::test]
async fn force_enhance_runs_even_for_complete_records() {
    let client = Arc::new(MockOcr::new(true, true));
    let renderer = Arc::new(FixtureRenderer::new(vec![detail_page_with_images()]));
    let pipeline = pipeline(client.clone(), renderer, true);

    let mut r = sparse_record();
    r.project_owner = "Acme".into();
    let out = pipeline.process(r).await;
    assert!(out.ocr_enhanced);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_images_short_circuits_before_the_service() {
    let client = Arc::new(MockOcr::new(true, true));
    // No fixture page and no record image: nothing to analyze.
    let renderer = Arc::new(FixtureRenderer::new(vec![]));
    let pipeline = pipeline(client.clone(), renderer.clone(), false);

    let mut r = sparse_record();
    r.image_url = None;
    let out = pipeline.process(r).await;
    assert!(!out.ocr_enhanced);
    assert_eq!(out.ocr_error.as_deref(), Some("No images found"));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn page_failure_degrades_to_the_project_image() {
    let client = Arc::new(MockOcr::new(true, true));
    let renderer = Arc::new(FixtureRenderer::new(vec![FixturePage::new(
        "https://k.example/projects/acme/widget",
    )
    .failing()]));
    let pipeline = pipeline(client, renderer.clone(), false);

    let out = pipeline.process(sparse_record()).await;
    assert!(out.ocr_enhanced, "record image alone is enough to proceed");
    assert_eq!(out.images_processed, 1);
    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn disconnected_service_tags_the_whole_batch() {
    let client = Arc::new(MockOcr::new(false, true));
    let renderer = Arc::new(FixtureRenderer::new(vec![]));
    let pipeline = pipeline(client.clone(), renderer, false);

    let records = vec![sparse_record(), {
        let mut r = sparse_record();
        r.url = "https://k.example/projects/acme/widget-2".into();
        r
    }];
    let out = pipeline.process_batch(records).await;
    assert_eq!(out.len(), 2);
    for rec in &out {
        assert!(!rec.ocr_enhanced);
        assert_eq!(rec.ocr_error.as_deref(), Some("Service unavailable"));
    }
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn envelope_invariant_holds_across_outcomes() {
    // For every record leaving the pipeline exactly one of these holds:
    // enhanced, errored, or skipped-with-neither.
    let cases: Vec<EnhancedRecord> = vec![
        {
            let client = Arc::new(MockOcr::new(true, true));
            let renderer = Arc::new(FixtureRenderer::new(vec![detail_page_with_images()]));
            pipeline(client, renderer, false).process(sparse_record()).await
        },
        {
            let client = Arc::new(MockOcr::new(true, false));
            let renderer = Arc::new(FixtureRenderer::new(vec![detail_page_with_images()]));
            pipeline(client, renderer, false).process(sparse_record()).await
        },
        {
            let client = Arc::new(MockOcr::new(true, true));
            let renderer = Arc::new(FixtureRenderer::new(vec![]));
            let mut r = sparse_record();
            r.image_url = None;
            pipeline(client, renderer, false).process(r).await
        },
    ];
    for rec in &cases {
        assert!(
            !(rec.ocr_enhanced && rec.ocr_error.is_some()),
            "ocr_enhanced and ocr_error must never both be set"
        );
    }
}
