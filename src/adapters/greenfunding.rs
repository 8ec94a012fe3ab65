// src/adapters/greenfunding.rs
//! GREEN FUNDING: Japanese platform, JPY amounts. The site embeds clean
//! schema.org Product blocks, so structured data is the PRIMARY tier here
//! and selectors are the fallback, inverting the usual order.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::extract::{
    self, cascade_attr, cascade_text, first_of, iso_dates, jp_supporters, jpy_goal, jpy_total,
    percent, structured_number, structured_string, truncate_chars,
};
use super::makuake::translate_jp_terms;
use super::{CategoryTaxonomy, PlatformAdapter, ScrapeOptions};
use crate::config::ScraperConfig;
use crate::record::{CampaignRecord, Currency, Money, ProjectStatus};
use crate::renderer::{PageRenderer, WaitStrategy};
use crate::taxonomy::Taxonomy;

const BASE_URL: &str = "https://greenfunding.jp";
const LISTING_LINK_CAP: usize = 10;

/// keyword/category term (EN or JP) -> GREEN FUNDING numeric category id.
const CATEGORY_IDS: &[(&str, &str)] = &[
    ("gadgets", "27"),
    ("gadget", "27"),
    ("ガジェット", "27"),
    ("technology", "38"),
    ("tech", "38"),
    ("テクノロジー", "38"),
    ("iot", "38"),
    ("miscellaneous", "41"),
    ("雑貨", "41"),
    ("audio", "45"),
    ("オーディオ", "45"),
    ("speaker", "45"),
    ("headphone", "45"),
    ("outdoor", "49"),
    ("アウトドア", "49"),
    ("car", "44"),
    ("motorcycle", "44"),
    ("車", "44"),
    ("バイク", "44"),
    ("fashion", "16"),
    ("ファッション", "16"),
    ("sports", "30"),
    ("スポーツ", "30"),
    ("social", "6"),
    ("社会貢献", "6"),
    ("contribution", "6"),
    ("art", "23"),
    ("アート", "23"),
    ("publication", "25"),
    ("出版", "25"),
    ("publishing", "25"),
    ("regional", "39"),
    ("地域活性化", "39"),
    ("entertainment", "40"),
    ("エンタメ", "40"),
    ("music", "26"),
    ("音楽", "26"),
];

static RE_PROJECT_ID_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/projects/\d+").unwrap());

pub struct GreenFundingAdapter {
    renderer: Arc<dyn PageRenderer>,
    cfg: ScraperConfig,
    taxonomy: Arc<Taxonomy>,
}

impl GreenFundingAdapter {
    pub fn new(renderer: Arc<dyn PageRenderer>, cfg: ScraperConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            renderer,
            cfg,
            taxonomy,
        }
    }

    fn category_id(category: &str, keyword: &str) -> Option<&'static str> {
        let lookup = |term: &str| {
            let term = term.to_lowercase();
            CATEGORY_IDS
                .iter()
                .find(|(k, _)| k.to_lowercase() == term)
                .map(|(_, id)| *id)
        };
        first_of([lookup(category), lookup(keyword)])
    }

    fn listing_urls(category: &str, keyword: &str) -> Vec<String> {
        let keyword = keyword.trim();
        let mut urls = Vec::new();
        match Self::category_id(category, keyword) {
            Some(id) => {
                let mut url = format!("{BASE_URL}/portals/search?category_id={id}");
                if !keyword.is_empty() {
                    url.push_str(&format!("&q={}", keyword.replace(' ', "+")));
                }
                urls.push(url);
            }
            None if !keyword.is_empty() => {
                urls.push(format!(
                    "{BASE_URL}/portals/search?q={}",
                    keyword.replace(' ', "+")
                ));
            }
            None => urls.push(format!("{BASE_URL}/portals/search")),
        }
        urls
    }

    fn is_project_link(url: &str) -> bool {
        RE_PROJECT_ID_LINK.is_match(url)
    }

    async fn extract_detail(&self, url: String, language: &str) -> Option<CampaignRecord> {
        let timeout = Duration::from_secs(self.cfg.nav_timeout_secs);
        let translate = language == "en";

        let result = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                sess.navigate(&url, WaitStrategy::DomContentLoaded, timeout)
                    .await?;

                let blobs = sess.structured_data().await.unwrap_or_default();

                let mut rec = CampaignRecord::new("GREEN FUNDING", &url);

                // Product.name first; the og:title carries a " | site" tail.
                let title = first_of([
                    structured_string(&blobs, &["name"]),
                    cascade_attr(sess, &[("meta[property=\"og:title\"]", "content")])
                        .await
                        .map(|t| t.split(" | ").next().unwrap_or(&t).trim().to_string()),
                    cascade_text(sess, &[".project-title", "h1"]).await,
                ])
                .unwrap_or_default();
                rec.original_title = title.clone();
                rec.title = if translate {
                    translate_jp_terms(&title)
                } else {
                    title
                };

                let description = first_of([
                    structured_string(&blobs, &["description"]),
                    cascade_attr(
                        sess,
                        &[
                            ("meta[name=\"description\"]", "content"),
                            ("meta[property=\"og:description\"]", "content"),
                        ],
                    )
                    .await,
                ])
                .map(|d| truncate_chars(&extract::normalize_text(&d), 500))
                .unwrap_or_default();
                rec.description = if translate {
                    translate_jp_terms(&description)
                } else {
                    description
                };

                rec.image_url = first_of([
                    structured_string(&blobs, &["image"]),
                    cascade_attr(sess, &[("meta[property=\"og:image\"]", "content")]).await,
                ]);

                rec.project_owner = first_of([
                    structured_string(&blobs, &["brand"]),
                    cascade_text(sess, &[".project-owner", ".owner-name"]).await,
                ])
                .unwrap_or_default();

                let body = sess.body_text().await.unwrap_or_default();
                rec.raised = first_of([
                    structured_number(&blobs, &["price", "collected_amount"])
                        .map(|v| Money::new(v, Currency::Jpy)),
                    jpy_total(&body),
                ]);
                rec.goal = jpy_goal(&body);
                rec.supporters = jp_supporters(&body);
                rec.achievement_rate = percent(&body);

                let dates = iso_dates(&body);
                rec.start_date = dates.first().copied();
                rec.end_date = dates.get(1).copied();

                rec.status = if body.contains("終了") {
                    ProjectStatus::Ended
                } else if body.contains("達成") {
                    ProjectStatus::Successful
                } else {
                    ProjectStatus::Live
                };

                rec.owner_sns = first_of([
                    cascade_attr(sess, &[("a[href*=\"twitter.com\"]", "href")]).await,
                    cascade_attr(sess, &[("a[href*=\"facebook.com\"]", "href")]).await,
                ]);
                rec.owner_country = Some("Japan".to_string());

                Ok(rec)
            })
        })
        .await;

        match result {
            Ok(rec) if !rec.title.is_empty() => Some(rec),
            Ok(_) => None,
            Err(e) => {
                warn!(%url, error = ?e, "greenfunding: detail extraction failed");
                None
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for GreenFundingAdapter {
    fn name(&self) -> &'static str {
        "greenfunding"
    }

    fn display_name(&self) -> &'static str {
        "GREEN FUNDING"
    }

    fn description(&self) -> &'static str {
        "Japanese crowdfunding with a hardware and audio focus"
    }

    fn categories(&self) -> CategoryTaxonomy {
        let mut out = CategoryTaxonomy::new();
        let entries: BTreeMap<String, String> = CATEGORY_IDS
            .iter()
            .map(|(k, id)| (k.to_string(), id.to_string()))
            .collect();
        out.insert("All Categories".to_string(), entries);
        out
    }

    async fn scrape(
        &self,
        category: &str,
        keyword: &str,
        options: &ScrapeOptions,
    ) -> Result<Vec<CampaignRecord>> {
        let urls = Self::listing_urls(category, keyword);
        let candidates = super::collect_candidates(
            self.renderer.as_ref(),
            &self.cfg,
            &urls,
            "a[href*=\"/projects/\"]",
            LISTING_LINK_CAP,
            Self::is_project_link,
        )
        .await?;

        let language = options.language.clone();
        let records = super::process_in_batches(
            candidates,
            self.cfg.batch_size,
            Duration::from_millis(self.cfg.delay_between_batches_ms),
            |url| self.extract_detail(url, &language),
        )
        .await;

        let max = options.max_results.unwrap_or(self.cfg.max_results);
        Ok(super::finalize_results(
            records,
            keyword,
            Some(category),
            &self.taxonomy,
            max,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_beats_keyword_for_ids() {
        assert_eq!(GreenFundingAdapter::category_id("audio", "xyz"), Some("45"));
        assert_eq!(
            GreenFundingAdapter::category_id("all", "オーディオ"),
            Some("45")
        );
    }

    #[test]
    fn search_url_shapes() {
        assert_eq!(
            GreenFundingAdapter::listing_urls("audio", "speaker stand"),
            vec!["https://greenfunding.jp/portals/search?category_id=45&q=speaker+stand"]
        );
        assert_eq!(
            GreenFundingAdapter::listing_urls("unknown", "speaker"),
            vec!["https://greenfunding.jp/portals/search?q=speaker"]
        );
        assert_eq!(
            GreenFundingAdapter::listing_urls("unknown", ""),
            vec!["https://greenfunding.jp/portals/search"]
        );
    }

    #[test]
    fn numeric_project_links_only() {
        assert!(GreenFundingAdapter::is_project_link(
            "https://greenfunding.jp/lab/projects/8123"
        ));
        assert!(!GreenFundingAdapter::is_project_link(
            "https://greenfunding.jp/portals/search"
        ));
    }
}
