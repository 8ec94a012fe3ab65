// src/adapters/indiegogo.rs
//! Indiegogo: English-language platform, USD amounts. Explore pages only
//! (the site's search endpoint is aggressively bot-gated), with a broad
//! keyword-to-explore-slug table for category inference.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::extract::{
    self, backers, cascade_attr, cascade_text, first_of, iso_dates, percent, structured_number,
    structured_string, title_from_slug, truncate_chars, usd_goal, usd_pledged,
};
use super::{CategoryTaxonomy, PlatformAdapter, ScrapeOptions};
use crate::config::ScraperConfig;
use crate::record::{CampaignRecord, Currency, Money, ProjectStatus};
use crate::renderer::{PageRenderer, WaitStrategy};
use crate::taxonomy::Taxonomy;

const BASE_URL: &str = "https://www.indiegogo.com";
const LISTING_LINK_CAP: usize = 12;

/// keyword/category term -> explore slug.
const EXPLORE_SLUGS: &[(&str, &str)] = &[
    ("audio", "audio"),
    ("sound", "audio"),
    ("speaker", "audio"),
    ("headphone", "audio"),
    ("headphones", "audio"),
    ("earphone", "audio"),
    ("earphones", "audio"),
    ("microphone", "audio"),
    ("camera", "camera-gear"),
    ("photography", "camera-gear"),
    ("photo", "camera-gear"),
    ("lens", "camera-gear"),
    ("video", "camera-gear"),
    ("education", "education"),
    ("learning", "education"),
    ("school", "education"),
    ("course", "education"),
    ("energy", "energy-green-tech"),
    ("solar", "energy-green-tech"),
    ("green", "energy-green-tech"),
    ("fashion", "fashion-wearables"),
    ("wearable", "fashion-wearables"),
    ("clothing", "fashion-wearables"),
    ("food", "food-beverages"),
    ("beverage", "food-beverages"),
    ("drink", "food-beverages"),
    ("health", "health-fitness"),
    ("fitness", "health-fitness"),
    ("wellness", "wellness"),
    ("home", "home"),
    ("furniture", "home"),
    ("phone", "phones-accessories"),
    ("productivity", "productivity"),
    ("transportation", "transportation"),
    ("bike", "transportation"),
    ("ebike", "transportation"),
    ("scooter", "transportation"),
    ("travel", "travel-outdoors"),
    ("outdoor", "travel-outdoors"),
    ("art", "art"),
    ("comics", "comics"),
    ("dance", "dance-theater"),
    ("theater", "dance-theater"),
    ("film", "film"),
    ("movie", "film"),
    ("music", "music"),
    ("podcast", "podcasts-blogs-vlogs"),
    ("tabletop", "tabletop-games"),
    ("board game", "tabletop-games"),
    ("game", "video-games"),
    ("games", "video-games"),
    ("gaming", "video-games"),
    ("writing", "writing-publishing"),
    ("book", "writing-publishing"),
    ("culture", "culture"),
    ("environment", "environment"),
];

pub struct IndiegogoAdapter {
    renderer: Arc<dyn PageRenderer>,
    cfg: ScraperConfig,
    taxonomy: Arc<Taxonomy>,
}

impl IndiegogoAdapter {
    pub fn new(renderer: Arc<dyn PageRenderer>, cfg: ScraperConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            renderer,
            cfg,
            taxonomy,
        }
    }

    fn explore_slug(category: &str, keyword: &str) -> Option<&'static str> {
        let lookup = |term: &str| {
            let term = term.to_lowercase();
            EXPLORE_SLUGS
                .iter()
                .find(|(k, _)| *k == term)
                .map(|(_, slug)| *slug)
        };
        first_of([lookup(keyword), lookup(category)])
    }

    fn listing_urls(category: &str, keyword: &str) -> Vec<String> {
        let mut urls = Vec::new();
        if let Some(slug) = Self::explore_slug(category, keyword) {
            urls.push(format!("{BASE_URL}/explore/{slug}"));
        }
        urls.push(format!("{BASE_URL}/explore/all"));
        urls
    }

    fn is_project_link(url: &str) -> bool {
        url.contains("/projects/") && !url.contains("/x/")
    }

    async fn extract_detail(&self, url: String, category: &str) -> Option<CampaignRecord> {
        let timeout = Duration::from_secs(self.cfg.nav_timeout_secs);
        let category = category.to_string();

        let result = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                sess.navigate(&url, WaitStrategy::DomContentLoaded, timeout)
                    .await?;

                let blobs = sess.structured_data().await.unwrap_or_default();

                let mut rec = CampaignRecord::new("Indiegogo", &url);

                let title = first_of([
                    cascade_text(sess, &[".campaign-title", "h1[class*=\"title\"]", "h1"]).await,
                    cascade_attr(sess, &[("meta[property=\"og:title\"]", "content")])
                        .await
                        .map(|t| strip_site_suffix(&t)),
                    structured_string(&blobs, &["name"]),
                    title_from_slug(&url),
                ])
                .unwrap_or_default();
                rec.title = title.clone();
                rec.original_title = title;

                rec.description = cascade_attr(
                    sess,
                    &[
                        ("meta[name=\"description\"]", "content"),
                        ("meta[property=\"og:description\"]", "content"),
                    ],
                )
                .await
                .map(|d| truncate_chars(&extract::normalize_text(&d), 500))
                .unwrap_or_default();

                rec.image_url =
                    cascade_attr(sess, &[("meta[property=\"og:image\"]", "content")]).await;

                rec.project_owner = first_of([
                    cascade_text(
                        sess,
                        &[
                            ".campaign-owner-name",
                            "[class*=\"trust-owner\"] a",
                            "[class*=\"owner\"] [class*=\"name\"]",
                        ],
                    )
                    .await,
                    structured_string(&blobs, &["brand"]),
                ])
                .unwrap_or_default();

                let body = sess.body_text().await.unwrap_or_default();
                rec.raised = first_of([
                    structured_number(&blobs, &["collected_funds", "balance"])
                        .map(|v| Money::new(v, Currency::Usd)),
                    usd_pledged(&body),
                ]);
                rec.goal = first_of([
                    structured_number(&blobs, &["goal", "goal_funds"])
                        .map(|v| Money::new(v, Currency::Usd)),
                    usd_goal(&body),
                ]);
                rec.supporters = first_of([
                    structured_number(&blobs, &["contributions_count", "backers_count"])
                        .map(|v| v as u64),
                    backers(&body),
                ]);
                rec.achievement_rate = percent(&body);

                let dates = iso_dates(&body);
                rec.start_date = dates.first().copied();
                rec.end_date = dates.get(1).copied();

                rec.status = if body.contains("InDemand") {
                    ProjectStatus::Successful
                } else if matches!(rec.achievement_rate, Some(p) if p >= 100.0) {
                    ProjectStatus::Successful
                } else {
                    ProjectStatus::Live
                };
                rec.category = category;

                Ok(rec)
            })
        })
        .await;

        match result {
            Ok(rec) if !rec.title.is_empty() => Some(rec),
            Ok(_) => None,
            Err(e) => {
                warn!(%url, error = ?e, "indiegogo: detail extraction failed");
                None
            }
        }
    }
}

fn strip_site_suffix(title: &str) -> String {
    title
        .split(" | ")
        .next()
        .unwrap_or(title)
        .trim()
        .to_string()
}

#[async_trait]
impl PlatformAdapter for IndiegogoAdapter {
    fn name(&self) -> &'static str {
        "indiegogo"
    }

    fn display_name(&self) -> &'static str {
        "Indiegogo"
    }

    fn description(&self) -> &'static str {
        "Creative and innovative projects worldwide"
    }

    fn categories(&self) -> CategoryTaxonomy {
        let mut out = CategoryTaxonomy::new();
        let mut add = |group: &str, entries: &[(&str, &str)]| {
            let m: BTreeMap<String, String> = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            out.insert(group.to_string(), m);
        };
        add(
            "Tech & Innovation",
            &[
                ("audio", "Audio"),
                ("camera-gear", "Camera & Photography"),
                ("education", "Education"),
                ("energy-green-tech", "Energy & Green Tech"),
                ("fashion-wearables", "Fashion & Wearables"),
                ("food-beverages", "Food & Beverages"),
                ("health-fitness", "Health & Fitness"),
                ("home", "Home"),
                ("phones-accessories", "Phones & Accessories"),
                ("productivity", "Productivity"),
                ("transportation", "Transportation"),
                ("travel-outdoors", "Travel & Outdoors"),
            ],
        );
        add(
            "Creative Works",
            &[
                ("art", "Art"),
                ("comics", "Comics"),
                ("dance-theater", "Dance & Theater"),
                ("film", "Film"),
                ("music", "Music"),
                ("photography", "Photography"),
                ("podcasts-blogs-vlogs", "Podcasts, Blogs & Vlogs"),
                ("tabletop-games", "Tabletop Games"),
                ("video-games", "Video Games"),
                ("web-series-tv-shows", "Web Series & TV Shows"),
                ("writing-publishing", "Writing & Publishing"),
            ],
        );
        add(
            "Community Projects",
            &[
                ("culture", "Culture"),
                ("environment", "Environment"),
                ("human-rights", "Human Rights"),
                ("local-businesses", "Local Businesses"),
                ("wellness", "Wellness"),
            ],
        );
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

        let records = super::process_in_batches(
            candidates,
            self.cfg.batch_size,
            Duration::from_millis(self.cfg.delay_between_batches_ms),
            |url| self.extract_detail(url, category),
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
