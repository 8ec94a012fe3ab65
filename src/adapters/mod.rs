// src/adapters/mod.rs
//! Platform adapters: per-site discovery + extraction + filtering. The
//! shared behavior lives here as standalone functions the adapters compose;
//! platform-specific behavior is each adapter's own module.

pub mod campfire;
pub mod extract;
pub mod flyingv;
pub mod greenfunding;
pub mod indiegogo;
pub mod kickstarter;
pub mod makuake;
pub mod registry;

use crate::record::CampaignRecord;
use crate::relevance;
use crate::renderer::{PageSession, WaitStrategy};
use crate::taxonomy::Taxonomy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scrape_records_total",
            "Detail pages extracted into records."
        );
        describe_counter!(
            "scrape_kept_total",
            "Records kept after relevance filtering + dedup."
        );
        describe_counter!(
            "scrape_filtered_total",
            "Records rejected by the relevance filter."
        );
        describe_counter!("scrape_dedup_total", "Records dropped as duplicate URLs.");
        describe_counter!(
            "scrape_item_errors_total",
            "Detail pages skipped after extraction errors."
        );
        describe_counter!(
            "scrape_listing_retries_total",
            "Listing navigation retry attempts."
        );
        describe_histogram!("scrape_detail_ms", "Detail page processing time (ms).");
    });
}

/// Per-request scrape options.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// "en" or "ja"; Japanese/Taiwanese adapters translate terms for "en".
    pub language: String,
    pub max_results: Option<usize>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            max_results: None,
        }
    }
}

/// Category taxonomy for client discovery: group -> key -> display name.
pub type CategoryTaxonomy = BTreeMap<String, BTreeMap<String, String>>;

/// Per-site implementation of discovery + extraction + filtering. Adapters
/// are read-only data producers: network requests to third-party sites, no
/// persistent writes, no cross-request state.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Stable platform identifier ("kickstarter", "makuake", ...).
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn categories(&self) -> CategoryTaxonomy;

    async fn scrape(
        &self,
        category: &str,
        keyword: &str,
        options: &ScrapeOptions,
    ) -> Result<Vec<CampaignRecord>>;
}

/// Navigate a listing page with bounded retry + backoff. A listing failure
/// is fatal for the scrape call, so exhaustion propagates.
pub(crate) async fn navigate_listing(
    sess: &mut dyn PageSession,
    url: &str,
    wait: WaitStrategy,
    timeout: Duration,
    attempts: u32,
) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match sess.navigate(url, wait, timeout).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(url, attempt, error = ?e, "listing navigation failed");
                counter!("scrape_listing_retries_total").increment(1);
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no attempts made")))
        .with_context(|| format!("listing page unavailable: {url}"))
}

/// Order-preserving URL dedup with basic junk filtering.
pub(crate) fn dedup_urls(urls: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .map(|u| u.split('#').next().unwrap_or(&u).to_string())
        .filter(|u| u.starts_with("http") && seen.insert(u.clone()))
        .take(cap)
        .collect()
}

/// Process detail URLs in small concurrent batches with a politeness delay
/// between batches. Output order matches input (discovered-URL) order; a
/// failed item yields `None` upstream and is skipped here.
pub(crate) async fn process_in_batches<F, Fut>(
    urls: Vec<String>,
    batch_size: usize,
    delay_between: Duration,
    per_url: F,
) -> Vec<CampaignRecord>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Option<CampaignRecord>> + Send,
{
    ensure_metrics_described();

    let total = urls.len();
    let mut out = Vec::with_capacity(total);
    let mut processed = 0usize;

    for batch in urls.chunks(batch_size.max(1)) {
        let t0 = std::time::Instant::now();
        let results = join_all(batch.iter().cloned().map(&per_url)).await;
        histogram!("scrape_detail_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        for r in results {
            match r {
                Some(rec) => {
                    counter!("scrape_records_total").increment(1);
                    out.push(rec);
                }
                None => {
                    counter!("scrape_item_errors_total").increment(1);
                }
            }
        }

        processed += batch.len();
        if processed < total {
            tokio::time::sleep(delay_between).await;
        }
    }
    out
}

/// Walk listing-URL strategies in priority order and return the first
/// non-empty set of candidate detail links. Navigation failures fall
/// through to the next strategy; if every strategy fails outright the last
/// error propagates (a dead listing is fatal for the scrape call).
pub(crate) async fn collect_candidates(
    renderer: &dyn crate::renderer::PageRenderer,
    cfg: &crate::config::ScraperConfig,
    listing_urls: &[String],
    link_selector: &'static str,
    link_cap: usize,
    link_filter: impl Fn(&str) -> bool + Send + Sync + Copy,
) -> Result<Vec<String>> {
    let timeout = Duration::from_secs(cfg.nav_timeout_secs);
    let mut last_err: Option<anyhow::Error> = None;
    let mut any_loaded = false;

    for url in listing_urls {
        let scroll_steps = cfg.scroll_max_steps;
        let retries = cfg.max_retries;
        let attempt = crate::renderer::with_session(renderer, |sess| {
            let url = url.clone();
            Box::pin(async move {
                navigate_listing(sess, &url, WaitStrategy::DomContentLoaded, timeout, retries)
                    .await?;
                // Lazy-loaded cards appear as we scroll; a scroll failure is
                // not fatal, the links already in the DOM still count.
                if let Err(e) = sess.scroll_to_bottom(scroll_steps).await {
                    warn!(url = %url, error = ?e, "listing scroll failed");
                }
                sess.links(link_selector).await
            })
        })
        .await;

        match attempt {
            Ok(links) => {
                any_loaded = true;
                let links: Vec<String> = links.into_iter().filter(|u| link_filter(u)).collect();
                let links = dedup_urls(links, link_cap);
                if !links.is_empty() {
                    return Ok(links);
                }
            }
            Err(e) => last_err = Some(e),
        }
    }

    // A listing that loaded but exposed no candidates is an empty result,
    // not an error.
    match (any_loaded, last_err) {
        (false, Some(e)) => Err(e),
        _ => Ok(Vec::new()),
    }
}

/// Dedup by URL, apply the relevance filter, and fall back to the top-N
/// unfiltered records when filtering would hide an otherwise successful
/// scrape. Returned order follows processing order.
pub(crate) fn finalize_results(
    records: Vec<CampaignRecord>,
    keyword: &str,
    category: Option<&str>,
    taxonomy: &Taxonomy,
    max_results: usize,
) -> Vec<CampaignRecord> {
    ensure_metrics_described();

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for rec in records {
        if seen.insert(rec.url.clone()) {
            unique.push(rec);
        } else {
            counter!("scrape_dedup_total").increment(1);
        }
    }

    let mut kept: Vec<CampaignRecord> = unique
        .iter()
        .filter(|r| relevance::is_relevant(r, keyword, category, taxonomy))
        .cloned()
        .collect();

    let filtered_out = unique.len() - kept.len();
    counter!("scrape_filtered_total").increment(filtered_out as u64);

    // Recall-over-precision safety net.
    if kept.is_empty() && !unique.is_empty() {
        let cap = taxonomy.cfg.fallback_cap.min(max_results);
        warn!(
            total = unique.len(),
            cap, "relevance filter rejected everything; returning unfiltered top-N"
        );
        kept = unique.into_iter().take(cap).collect();
    }

    kept.truncate(max_results);
    counter!("scrape_kept_total").increment(kept.len() as u64);
    kept
}
