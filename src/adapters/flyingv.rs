// src/adapters/flyingv.rs
//! FlyingV: Taiwanese platform, TWD amounts (`NT$`). Category browsing
//! only; the owner line carries a `提案者` prefix that has to be stripped.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::extract::{
    self, cascade_attr, cascade_text, first_of, iso_dates, percent, title_from_slug,
    truncate_chars, twd_amount, twd_goal,
};
use super::{CategoryTaxonomy, PlatformAdapter, ScrapeOptions};
use crate::config::ScraperConfig;
use crate::record::{CampaignRecord, ProjectStatus};
use crate::renderer::{PageRenderer, WaitStrategy};
use crate::taxonomy::Taxonomy;

const BASE_URL: &str = "https://www.flyingv.cc";
const LISTING_LINK_CAP: usize = 10;

/// Frontend category keys and site terms -> FlyingV category slug.
const CATEGORY_SLUGS: &[(&str, &str)] = &[
    ("technology design", "product"),
    ("technology", "product"),
    ("product", "product"),
    ("design", "product"),
    ("music", "music"),
    ("art films", "art"),
    ("art", "art"),
    ("film", "art"),
    ("life", "life"),
    ("public place", "community"),
    ("community", "community"),
    ("game publishing", "publishing"),
    ("game", "publishing"),
    ("publishing", "publishing"),
];

/// zh-TW -> EN term table, substitution only.
static ZH_EN_TERMS: &[(&str, &str)] = &[
    ("專案", "Project"),
    ("計畫", "Project"),
    ("募資", "Crowdfunding"),
    ("贊助", "Support"),
    ("限量", "Limited"),
    ("預購", "Pre-order"),
    ("設計", "Design"),
    ("音樂", "Music"),
    ("遊戲", "Game"),
    ("電影", "Film"),
    ("科技", "Technology"),
    ("台灣", "Taiwan"),
    ("桌遊", "Board Game"),
    ("出版", "Publishing"),
];

fn translate_zh_terms(text: &str) -> String {
    let mut out = text.to_string();
    for (zh, en) in ZH_EN_TERMS {
        if out.contains(zh) {
            out = out.replace(zh, en);
        }
    }
    out
}

/// Strip the proposer-line prefixes the owner block carries.
fn clean_owner(owner: &str) -> String {
    let mut s = owner.trim();
    for prefix in ["提案者：", "提案者:", "提案者", "發起人：", "發起人:", "by "] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim();
        }
    }
    s.lines()
        .next()
        .unwrap_or_default()
        .split(['，', ','])
        .next()
        .unwrap_or_default()
        .chars()
        .take(100)
        .collect::<String>()
        .trim()
        .to_string()
}

pub struct FlyingVAdapter {
    renderer: Arc<dyn PageRenderer>,
    cfg: ScraperConfig,
    taxonomy: Arc<Taxonomy>,
}

impl FlyingVAdapter {
    pub fn new(renderer: Arc<dyn PageRenderer>, cfg: ScraperConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            renderer,
            cfg,
            taxonomy,
        }
    }

    fn listing_urls(category: &str, keyword: &str) -> Vec<String> {
        let lookup = |term: &str| {
            let term = term.to_lowercase();
            CATEGORY_SLUGS
                .iter()
                .find(|(k, _)| *k == term)
                .map(|(_, slug)| *slug)
        };
        match first_of([lookup(category), lookup(keyword)]) {
            Some(slug) => vec![format!("{BASE_URL}/projects?category={slug}")],
            None => vec![format!("{BASE_URL}/projects")],
        }
    }

    fn is_project_link(url: &str) -> bool {
        url.contains("flyingv.cc/projects/") && !url.contains("?category=")
    }

    async fn extract_detail(&self, url: String, language: &str) -> Option<CampaignRecord> {
        let timeout = Duration::from_secs(self.cfg.nav_timeout_secs);
        let translate = language == "en";

        let result = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                sess.navigate(&url, WaitStrategy::DomContentLoaded, timeout)
                    .await?;

                let mut rec = CampaignRecord::new("FlyingV", &url);

                let title = first_of([
                    cascade_text(sess, &["h1", ".project-title", ".proj-title"]).await,
                    cascade_attr(sess, &[("meta[property=\"og:title\"]", "content")]).await,
                    title_from_slug(&url),
                ])
                .unwrap_or_default();
                rec.original_title = title.clone();
                rec.title = if translate {
                    translate_zh_terms(&title)
                } else {
                    title
                };

                let description = cascade_attr(
                    sess,
                    &[
                        ("meta[name=\"description\"]", "content"),
                        ("meta[property=\"og:description\"]", "content"),
                    ],
                )
                .await
                .map(|d| truncate_chars(&extract::normalize_text(&d), 500))
                .unwrap_or_default();
                rec.description = if translate {
                    translate_zh_terms(&description)
                } else {
                    description
                };

                rec.image_url =
                    cascade_attr(sess, &[("meta[property=\"og:image\"]", "content")]).await;

                let body = sess.body_text().await.unwrap_or_default();
                rec.raised = twd_amount(&body);
                rec.goal = twd_goal(&body);
                rec.supporters = extract::backers(&body).or_else(|| {
                    // 贊助人數 N 人
                    extract::jp_supporters(&body)
                });
                rec.achievement_rate = percent(&body);

                let dates = iso_dates(&body);
                rec.start_date = dates.first().copied();
                rec.end_date = dates.get(1).copied();

                rec.status = if body.contains("已結束") || body.contains("募資結束") {
                    ProjectStatus::Ended
                } else if matches!(rec.achievement_rate, Some(p) if p >= 100.0) {
                    ProjectStatus::Successful
                } else {
                    ProjectStatus::Live
                };

                let owner = cascade_text(
                    sess,
                    &[".proposer-name", ".owner-name", "[class*=\"proposer\"]"],
                )
                .await
                .unwrap_or_default();
                rec.project_owner = clean_owner(&owner);
                rec.owner_sns = first_of([
                    cascade_attr(sess, &[("a[href*=\"facebook\"]", "href")]).await,
                    cascade_attr(sess, &[("a[href*=\"instagram\"]", "href")]).await,
                ]);
                rec.owner_country = Some("Taiwan".to_string());

                Ok(rec)
            })
        })
        .await;

        match result {
            Ok(rec) if !rec.title.is_empty() => Some(rec),
            Ok(_) => None,
            Err(e) => {
                warn!(%url, error = ?e, "flyingv: detail extraction failed");
                None
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for FlyingVAdapter {
    fn name(&self) -> &'static str {
        "flyingv"
    }

    fn display_name(&self) -> &'static str {
        "FlyingV"
    }

    fn description(&self) -> &'static str {
        "Taiwan's crowdfunding platform for creative and civic projects"
    }

    fn categories(&self) -> CategoryTaxonomy {
        let mut out = CategoryTaxonomy::new();
        let entries: BTreeMap<String, String> = CATEGORY_SLUGS
            .iter()
            .map(|(k, slug)| (k.to_string(), slug.to_string()))
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
