// src/adapters/kickstarter.rs
//! Kickstarter: English-language platform, USD amounts. Discovery walks
//! search -> category -> popular listings; detail extraction cascades from
//! card selectors to the embedded project state to page-text regexes.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::extract::{
    self, backers, cascade_attr, cascade_text, first_of, iso_dates, percent, structured_number,
    title_from_slug, truncate_chars, usd_goal, usd_pledged,
};
use super::{CategoryTaxonomy, PlatformAdapter, ScrapeOptions};
use crate::config::ScraperConfig;
use crate::record::{CampaignRecord, Currency, Money, ProjectStatus};
use crate::renderer::{PageRenderer, WaitStrategy};
use crate::taxonomy::Taxonomy;

const BASE_URL: &str = "https://www.kickstarter.com";
const LISTING_LINK_CAP: usize = 12;

/// keyword/category term -> Kickstarter category slug.
const CATEGORY_SLUGS: &[(&str, &str)] = &[
    ("game", "games"),
    ("games", "games"),
    ("gaming", "games"),
    ("board game", "games"),
    ("card game", "games"),
    ("video game", "games"),
    ("tabletop", "games"),
    ("dice", "games"),
    ("rpg", "games"),
    ("technology", "technology"),
    ("tech", "technology"),
    ("gadget", "technology"),
    ("device", "technology"),
    ("innovation", "technology"),
    ("smart", "technology"),
    ("app", "technology"),
    ("software", "technology"),
    ("hardware", "technology"),
    ("art", "art"),
    ("artist", "art"),
    ("painting", "art"),
    ("sculpture", "art"),
    ("artwork", "art"),
    ("crafts", "crafts"),
    ("craft", "crafts"),
    ("handmade", "crafts"),
    ("design", "design"),
    ("designer", "design"),
    ("product", "design"),
    ("film", "film"),
    ("movie", "film"),
    ("cinema", "film"),
    ("documentary", "film"),
    ("video", "film"),
    ("filmmaker", "film"),
    ("music", "music"),
    ("musician", "music"),
    ("song", "music"),
    ("album", "music"),
    ("band", "music"),
    ("instrument", "music"),
    ("book", "publishing"),
    ("novel", "publishing"),
    ("author", "publishing"),
    ("writing", "publishing"),
    ("fashion", "fashion"),
    ("clothing", "fashion"),
    ("style", "fashion"),
    ("photo", "photography"),
    ("photography", "photography"),
    ("camera", "photography"),
    ("food", "food"),
];

pub struct KickstarterAdapter {
    renderer: Arc<dyn PageRenderer>,
    cfg: ScraperConfig,
    taxonomy: Arc<Taxonomy>,
}

impl KickstarterAdapter {
    pub fn new(renderer: Arc<dyn PageRenderer>, cfg: ScraperConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            renderer,
            cfg,
            taxonomy,
        }
    }

    /// Keyword wins over the explicit category, matching how searches are
    /// usually phrased ("board game" implies games regardless of category).
    fn category_slug(category: &str, keyword: &str) -> &'static str {
        let lookup = |term: &str| {
            let term = term.to_lowercase();
            CATEGORY_SLUGS
                .iter()
                .find(|(k, _)| *k == term)
                .map(|(_, slug)| *slug)
        };
        first_of([lookup(keyword), lookup(category)]).unwrap_or("technology")
    }

    fn listing_urls(category: &str, keyword: &str) -> Vec<String> {
        let mut urls = Vec::new();
        if !keyword.trim().is_empty() {
            urls.push(format!(
                "{BASE_URL}/discover/advanced?term={}&sort=popularity",
                urlencode(keyword)
            ));
        }
        urls.push(format!(
            "{BASE_URL}/discover/categories/{}?sort=popularity",
            Self::category_slug(category, keyword)
        ));
        urls.push(format!("{BASE_URL}/discover/popular"));
        urls
    }

    fn is_project_link(url: &str) -> bool {
        url.contains("/projects/")
            && !url.contains("creator-handbook")
            && !url.contains("/help")
            && !url.contains("/rules")
    }

    async fn extract_detail(&self, url: String, category: &str) -> Option<CampaignRecord> {
        let timeout = Duration::from_secs(self.cfg.nav_timeout_secs);
        let category = category.to_string();

        let result = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                sess.navigate(&url, WaitStrategy::DomContentLoaded, timeout)
                    .await?;

                let mut rec = CampaignRecord::new("Kickstarter", &url);

                let title = first_of([
                    cascade_text(
                        sess,
                        &[
                            "[data-testid=\"project-name\"]",
                            ".project-name",
                            "h2.type-24",
                            "h1",
                        ],
                    )
                    .await,
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

                let owner = first_of([
                    cascade_text(
                        sess,
                        &[
                            "[data-testid=\"project-author\"]",
                            ".project-author",
                            "a[href*=\"/profile/\"] .soft-black",
                        ],
                    )
                    .await,
                    owner_from_url(&url),
                ])
                .unwrap_or_default();
                rec.project_owner = owner.trim_start_matches("by ").to_string();

                // Tier 2: the server-injected project state carries exact
                // numbers even when card markup changes under us.
                let blobs = sess.structured_data().await.unwrap_or_default();
                let pledged = structured_number(&blobs, &["pledged", "usd_pledged"]);
                let goal = structured_number(&blobs, &["goal"]);
                let backer_count = structured_number(&blobs, &["backers_count"]);

                // Tier 3: regex over visible text.
                let body = sess.body_text().await.unwrap_or_default();
                rec.raised = first_of([
                    pledged.map(|v| Money::new(v, Currency::Usd)),
                    usd_pledged(&body),
                ]);
                rec.goal = first_of([goal.map(|v| Money::new(v, Currency::Usd)), usd_goal(&body)]);
                rec.supporters = first_of([backer_count.map(|v| v as u64), backers(&body)]);
                rec.achievement_rate = first_of([
                    percent(&body),
                    match (rec.raised, rec.goal) {
                        (Some(r), Some(g)) if g.amount > 0.0 => {
                            Some((r.amount / g.amount * 100.0).floor())
                        }
                        _ => None,
                    },
                ]);

                let dates = iso_dates(&body);
                rec.start_date = dates.first().copied();
                rec.end_date = dates.get(1).copied();

                rec.status = match rec.achievement_rate {
                    Some(p) if p >= 100.0 => ProjectStatus::Successful,
                    _ => ProjectStatus::Live,
                };
                rec.category = category;

                Ok(rec)
            })
        })
        .await;

        match result {
            Ok(rec) if !rec.title.is_empty() => Some(rec),
            Ok(_) => {
                warn!(%url, "kickstarter: detail page had no usable title");
                None
            }
            Err(e) => {
                warn!(%url, error = ?e, "kickstarter: detail extraction failed");
                None
            }
        }
    }
}

fn owner_from_url(url: &str) -> Option<String> {
    // /projects/{creator}/{slug} -> creator segment.
    let mut parts = url.split('/').skip_while(|p| *p != "projects");
    parts.next()?; // "projects"
    let creator = parts.next()?;
    if creator.is_empty() {
        return None;
    }
    title_from_slug(&format!("https://x/{creator}"))
}

fn urlencode(s: &str) -> String {
    s.trim().replace(' ', "%20")
}

#[async_trait]
impl PlatformAdapter for KickstarterAdapter {
    fn name(&self) -> &'static str {
        "kickstarter"
    }

    fn display_name(&self) -> &'static str {
        "Kickstarter"
    }

    fn description(&self) -> &'static str {
        "Creative projects seeking funding"
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
        add("Art", &[("art", "art"), ("crafts", "crafts")]);
        add("Comics & Illustration", &[("comics", "comics")]);
        add(
            "Design & Tech",
            &[("design", "design"), ("technology", "technology")],
        );
        add("Film", &[("film", "film"), ("video", "film")]);
        add("Food & Craft", &[("food", "food")]);
        add("Games", &[("games", "games"), ("tabletop", "games")]);
        add("Music", &[("music", "music")]);
        add("Publishing", &[("publishing", "publishing")]);
        add("Fashion", &[("fashion", "fashion")]);
        add("Theater", &[("theater", "theater")]);
        add("Dance", &[("dance", "dance")]);
        add("Photography", &[("photography", "photography")]);
        add("Journalism", &[("journalism", "journalism")]);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_slug_prefers_keyword() {
        assert_eq!(KickstarterAdapter::category_slug("art", "board game"), "games");
        assert_eq!(KickstarterAdapter::category_slug("art", ""), "art");
        assert_eq!(KickstarterAdapter::category_slug("", ""), "technology");
    }

    #[test]
    fn project_link_filter() {
        assert!(KickstarterAdapter::is_project_link(
            "https://www.kickstarter.com/projects/acme/widget"
        ));
        assert!(!KickstarterAdapter::is_project_link(
            "https://www.kickstarter.com/help/creator-handbook"
        ));
    }

    #[test]
    fn owner_falls_back_to_url_segment() {
        assert_eq!(
            owner_from_url("https://www.kickstarter.com/projects/future-tech-co/smart-widget"),
            Some("Future Tech Co".to_string())
        );
    }
}
