// tests/scrape_pipeline.rs
//
// Adapter-level pipeline tests against a scripted renderer:
// - happy path: listing -> detail batches -> filter -> unique results
// - per-item failures are skipped, never aborting the batch
// - dead listings propagate as errors
// - the never-empty-on-success fallback
// - browsing contexts are always released

use std::sync::Arc;

use crowdscout::adapters::kickstarter::KickstarterAdapter;
use crowdscout::adapters::{PlatformAdapter, ScrapeOptions};
use crowdscout::config::AppConfig;
use crowdscout::renderer::fixture::{FixturePage, FixtureRenderer};
use crowdscout::taxonomy::Taxonomy;

const SEARCH_URL: &str =
    "https://www.kickstarter.com/discover/advanced?term=speaker&sort=popularity";

fn detail_url(slug: &str) -> String {
    format!("https://www.kickstarter.com/projects/acme-audio/{slug}")
}

fn listing_page(links: &[&str]) -> FixturePage {
    FixturePage::new(SEARCH_URL).with_links("a[href*=\"/projects/\"]", links)
}

fn detail_page(slug: &str, title: &str) -> FixturePage {
    FixturePage::new(&detail_url(slug))
        .with_text("h1", title)
        .with_attr(
            "meta[name=\"description\"]",
            "content",
            "A compact speaker for travel.",
        )
        .with_attr(
            "meta[property=\"og:image\"]",
            "content",
            "https://img.example/cover-1200x800.jpg",
        )
        .with_body_text("$45,678 pledged of $50,000 goal 1,234 backers 91% 2026-05-01 2026-07-01")
}

fn adapter(renderer: Arc<FixtureRenderer>) -> KickstarterAdapter {
    let mut cfg = AppConfig::defaults().scraper;
    cfg.delay_between_batches_ms = 1; // keep tests fast
    let taxonomy = Arc::new(Taxonomy::load().expect("taxonomy"));
    KickstarterAdapter::new(renderer, cfg, taxonomy)
}

#[tokio::test]
async fn happy_path_extracts_unique_relevant_records() {
    let links: Vec<String> = ["speaker-one", "speaker-two", "speaker-three"]
        .iter()
        .map(|s| detail_url(s))
        .collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let renderer = Arc::new(FixtureRenderer::new(vec![
        listing_page(&link_refs),
        detail_page("speaker-one", "Speaker One"),
        detail_page("speaker-two", "Speaker Two"),
        detail_page("speaker-three", "Speaker Three"),
    ]));
    let adapter = adapter(renderer.clone());

    let records = adapter
        .scrape("technology", "speaker", &ScrapeOptions::default())
        .await
        .expect("scrape");

    assert_eq!(records.len(), 3);
    let mut urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
    let before = urls.len();
    urls.dedup();
    assert_eq!(urls.len(), before, "urls must be unique");

    let first = &records[0];
    assert_eq!(first.title, "Speaker One");
    assert_eq!(first.raised.map(|m| m.amount), Some(45678.0));
    assert_eq!(first.goal.map(|m| m.amount), Some(50000.0));
    assert_eq!(first.supporters, Some(1234));
    assert_eq!(first.achievement_rate, Some(91.0));
    assert_eq!(
        first.start_date.map(|d| d.to_string()),
        Some("2026-05-01".to_string())
    );
    assert_eq!(first.project_owner, "Acme Audio");

    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn repeated_listing_links_are_deduplicated() {
    let url = detail_url("speaker-one");
    let renderer = Arc::new(FixtureRenderer::new(vec![
        listing_page(&[&url, &url, &url]),
        detail_page("speaker-one", "Speaker One"),
    ]));
    let adapter = adapter(renderer);

    let records = adapter
        .scrape("technology", "speaker", &ScrapeOptions::default())
        .await
        .expect("scrape");
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn one_broken_detail_page_does_not_abort_the_batch() {
    let links: Vec<String> = ["speaker-one", "speaker-two", "speaker-three"]
        .iter()
        .map(|s| detail_url(s))
        .collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let renderer = Arc::new(FixtureRenderer::new(vec![
        listing_page(&link_refs),
        detail_page("speaker-one", "Speaker One"),
        FixturePage::new(&detail_url("speaker-two")).failing(),
        detail_page("speaker-three", "Speaker Three"),
    ]));
    let adapter = adapter(renderer.clone());

    let records = adapter
        .scrape("technology", "speaker", &ScrapeOptions::default())
        .await
        .expect("scrape");

    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Speaker One", "Speaker Three"]);
    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn dead_listings_propagate_an_error() {
    // No fixture pages at all: every listing strategy fails navigation.
    let renderer = Arc::new(FixtureRenderer::new(vec![]));
    let adapter = adapter(renderer.clone());

    let result = adapter
        .scrape("technology", "speaker", &ScrapeOptions::default())
        .await;
    assert!(result.is_err(), "listing failure must be fatal for the call");
    assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
}

#[tokio::test]
async fn filter_rejecting_everything_falls_back_to_top_n() {
    let links: Vec<String> = ["mug-one", "mug-two", "mug-three", "mug-four"]
        .iter()
        .map(|s| detail_url(s))
        .collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    // The search URL reflects the actual keyword of this scrape.
    let mut pages = vec![FixturePage::new(
        "https://www.kickstarter.com/discover/advanced?term=quantum%20telescope&sort=popularity",
    )
    .with_links("a[href*=\"/projects/\"]", &link_refs)];
    for (slug, title) in [
        ("mug-one", "Mug One"),
        ("mug-two", "Mug Two"),
        ("mug-three", "Mug Three"),
        ("mug-four", "Mug Four"),
    ] {
        pages.push(detail_page(slug, title));
    }
    let renderer = Arc::new(FixtureRenderer::new(pages));
    let adapter = adapter(renderer);

    // Keyword matches nothing in the extracted records; the adapter must
    // return the unfiltered top-N instead of an empty list.
    let records = adapter
        .scrape("technology", "quantum telescope", &ScrapeOptions::default())
        .await
        .expect("scrape");
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn max_results_caps_the_output() {
    let slugs = ["speaker-a", "speaker-b", "speaker-c", "speaker-d"];
    let links: Vec<String> = slugs.iter().map(|s| detail_url(s)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let mut pages = vec![listing_page(&link_refs)];
    for slug in slugs {
        pages.push(detail_page(slug, &format!("Speaker {slug}")));
    }
    let renderer = Arc::new(FixtureRenderer::new(pages));
    let adapter = adapter(renderer);

    let options = ScrapeOptions {
        language: "en".to_string(),
        max_results: Some(2),
    };
    let records = adapter
        .scrape("technology", "speaker", &options)
        .await
        .expect("scrape");
    assert_eq!(records.len(), 2);
}
