// src/adapters/campfire.rs
//! CAMPFIRE: Japanese platform, JPY amounts. Search accepts keyword and
//! category query params together, so a single listing strategy suffices.
//! Status words and category labels are bilingual on the site; both forms
//! appear in the tables below.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::extract::{
    self, cascade_attr, cascade_text, first_of, iso_dates, jp_supporters, jpy_goal, jpy_total,
    percent, structured_number, structured_string, title_from_slug, truncate_chars,
};
use super::makuake::translate_jp_terms;
use super::{CategoryTaxonomy, PlatformAdapter, ScrapeOptions};
use crate::config::ScraperConfig;
use crate::record::{CampaignRecord, Currency, Money, ProjectStatus};
use crate::renderer::{PageRenderer, WaitStrategy};
use crate::taxonomy::Taxonomy;

const BASE_URL: &str = "https://camp-fire.jp";
const LISTING_LINK_CAP: usize = 12;

/// keyword/category term (EN or JP) -> CAMPFIRE category id.
const CATEGORY_IDS: &[(&str, &str)] = &[
    ("food", "food"),
    ("グルメ", "food"),
    ("料理", "food"),
    ("レストラン", "food"),
    ("technology", "tech"),
    ("tech", "tech"),
    ("テクノロジー", "tech"),
    ("game", "game"),
    ("games", "game"),
    ("ゲーム", "game"),
    ("art", "art"),
    ("アート", "art"),
    ("music", "music"),
    ("音楽", "music"),
    ("movie", "movie"),
    ("film", "movie"),
    ("映画", "movie"),
    ("fashion", "fashion"),
    ("ファッション", "fashion"),
    ("product", "product"),
    ("プロダクト", "product"),
    ("social", "social"),
    ("ソーシャル", "social"),
    ("business", "business"),
    ("ビジネス", "business"),
];

pub struct CampfireAdapter {
    renderer: Arc<dyn PageRenderer>,
    cfg: ScraperConfig,
    taxonomy: Arc<Taxonomy>,
}

impl CampfireAdapter {
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
        let mut params = Vec::new();
        if !keyword.trim().is_empty() {
            params.push(format!("keyword={}", keyword.trim().replace(' ', "+")));
        }
        if let Some(id) = Self::category_id(category, keyword) {
            params.push(format!("category={id}"));
        }
        let url = if params.is_empty() {
            format!("{BASE_URL}/projects")
        } else {
            format!("{BASE_URL}/projects?{}", params.join("&"))
        };
        vec![url]
    }

    fn is_project_link(url: &str) -> bool {
        url.contains("camp-fire.jp/projects/view/")
    }

    async fn extract_detail(&self, url: String, language: &str) -> Option<CampaignRecord> {
        let timeout = Duration::from_secs(self.cfg.nav_timeout_secs);
        let translate = language == "en";

        let result = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                sess.navigate(&url, WaitStrategy::DomContentLoaded, timeout)
                    .await?;

                // CAMPFIRE ships a server-injected state blob; prefer it,
                // fall back to the visible summary panel.
                let blobs = sess.structured_data().await.unwrap_or_default();

                let mut rec = CampaignRecord::new("CAMPFIRE", &url);

                let title = first_of([
                    cascade_text(sess, &["h1.project-title", "h1", ".project__title"]).await,
                    structured_string(&blobs, &["title", "name"]),
                    title_from_slug(&url),
                ])
                .unwrap_or_default();
                rec.original_title = title.clone();
                rec.title = if translate {
                    translate_jp_terms(&title)
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
                    translate_jp_terms(&description)
                } else {
                    description
                };

                rec.image_url =
                    cascade_attr(sess, &[("meta[property=\"og:image\"]", "content")]).await;

                let body = sess.body_text().await.unwrap_or_default();
                rec.raised = first_of([
                    structured_number(&blobs, &["collected_money", "total_amount"])
                        .map(|v| Money::new(v, Currency::Jpy)),
                    jpy_total(&body),
                ]);
                rec.goal = first_of([
                    structured_number(&blobs, &["goal_amount", "target_amount"])
                        .map(|v| Money::new(v, Currency::Jpy)),
                    jpy_goal(&body),
                ]);
                rec.supporters = first_of([
                    structured_number(&blobs, &["patron_count", "backers_count"])
                        .map(|v| v as u64),
                    jp_supporters(&body),
                ]);
                rec.achievement_rate = percent(&body);

                let dates = iso_dates(&body);
                rec.start_date = dates.first().copied();
                rec.end_date = dates.get(1).copied();

                rec.status = if body.contains("終了しました") || body.contains("募集終了") {
                    ProjectStatus::Ended
                } else if body.contains("達成") || body.contains("SUCCESS") {
                    ProjectStatus::Successful
                } else {
                    ProjectStatus::Live
                };

                rec.project_owner = first_of([
                    cascade_text(
                        sess,
                        &[".owner__name", ".project-owner-name", "a[href*=\"/profile/\"]"],
                    )
                    .await,
                    structured_string(&blobs, &["owner_name"]),
                ])
                .unwrap_or_default();
                rec.owner_website =
                    cascade_attr(sess, &[("a[href*=\"/profile/\"]", "href")]).await;
                rec.owner_sns = first_of([
                    cascade_attr(sess, &[("a[href*=\"twitter.com\"]", "href")]).await,
                    cascade_attr(sess, &[("a[href*=\"instagram.com\"]", "href")]).await,
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
                warn!(%url, error = ?e, "campfire: detail extraction failed");
                None
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for CampfireAdapter {
    fn name(&self) -> &'static str {
        "campfire"
    }

    fn display_name(&self) -> &'static str {
        "CAMPFIRE"
    }

    fn description(&self) -> &'static str {
        "Japan's largest crowdfunding community"
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
            "食べ物・レストラン",
            &[
                ("food", "food"),
                ("グルメ", "food"),
                ("料理", "food"),
                ("レストラン", "food"),
            ],
        );
        add(
            "テクノロジー・ガジェット",
            &[
                ("tech", "tech"),
                ("technology", "tech"),
                ("テクノロジー", "tech"),
                ("ガジェット", "tech"),
            ],
        );
        add(
            "プロダクト",
            &[("product", "product"), ("プロダクト", "product")],
        );
        add(
            "ファッション",
            &[("fashion", "fashion"), ("ファッション", "fashion")],
        );
        add("音楽", &[("music", "music"), ("音楽", "music")]);
        add(
            "ゲーム・サービス開発",
            &[("game", "game"), ("games", "game"), ("ゲーム", "game")],
        );
        add("アート・写真", &[("art", "art"), ("アート", "art")]);
        add(
            "ソーシャルグッド",
            &[("social", "social"), ("ソーシャル", "social")],
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
            "a[href*=\"/projects/view/\"]",
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
