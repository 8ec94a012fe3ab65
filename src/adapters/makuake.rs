// src/adapters/makuake.rs
//! Makuake: Japanese platform, JPY amounts. The summary panel is rendered
//! client-side with unstable markup, so most numbers come from the regex
//! tier over page text (応援購入総額 / 目標金額 / サポーター). Titles and
//! descriptions are translated term-by-term for the English view.

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
    percent, title_from_slug, truncate_chars,
};
use super::{CategoryTaxonomy, PlatformAdapter, ScrapeOptions};
use crate::config::ScraperConfig;
use crate::record::{CampaignRecord, ProjectStatus};
use crate::renderer::{PageRenderer, WaitStrategy};
use crate::taxonomy::Taxonomy;

const BASE_URL: &str = "https://www.makuake.com";
const LISTING_LINK_CAP: usize = 10;

const CATEGORY_SLUGS: &[(&str, &str)] = &[
    ("product", "product"),
    ("fashion", "fashion"),
    ("food", "food"),
    ("restaurants and bars", "restaurant-bar"),
    ("technology", "technology"),
    ("tech", "technology"),
    ("cosmetics and beauty", "beauty"),
    ("beauty", "beauty"),
    ("art and photography", "art-photo"),
    ("art", "art-photo"),
    ("movies and videos", "movie-video"),
    ("film", "movie-video"),
    ("anime and manga", "anime-manga"),
    ("music", "music"),
    ("game", "game"),
    ("games", "game"),
    ("theatre and performance", "theatre-performance"),
    ("comedy/entertainment", "entertainment"),
    ("publishing and journalism", "publishing-journalism"),
    ("education", "education"),
    ("sports", "sports"),
    ("startups", "startup"),
    ("regional revitalization", "regional"),
    ("contribution to society", "contribution"),
    ("around the world", "world"),
];

/// JP -> EN term table for best-effort title/description translation.
/// A curated find-and-replace list, not a translator.
static JP_EN_TERMS: &[(&str, &str)] = &[
    ("プロジェクト", "Project"),
    ("開発", "Development"),
    ("制作", "Production"),
    ("応援購入", "Support Purchase"),
    ("支援", "Support"),
    ("限定", "Limited"),
    ("先行", "Advance"),
    ("予約", "Reservation"),
    ("販売", "Sale"),
    ("最新", "Latest"),
    ("オリジナル", "Original"),
    ("長財布", "Long Wallet"),
    ("財布", "Wallet"),
    ("最小", "Smallest"),
    ("大容量", "Large Capacity"),
    ("日本製", "Made in Japan"),
    ("本革", "Genuine Leather"),
    ("革", "Leather"),
    ("品質", "Quality"),
    ("職人", "Craftsman"),
    ("手作り", "Handmade"),
    ("上質", "High Quality"),
    ("快適", "Comfortable"),
    ("便利", "Convenient"),
    ("暮らし", "Lifestyle"),
    ("日常", "Daily Life"),
    ("ファッション", "Fashion"),
    ("テクノロジー", "Technology"),
    ("フード", "Food"),
    ("料理", "Food"),
    ("ゲーム", "Game"),
    ("音楽", "Music"),
    ("映画", "Movie"),
    ("アニメ", "Anime"),
    ("漫画", "Manga"),
    ("書籍", "Book"),
    ("アート", "Art"),
    ("写真", "Photography"),
    ("教育", "Education"),
    ("スポーツ", "Sports"),
    ("美容", "Beauty"),
    ("健康", "Health"),
    ("地域", "Regional"),
    ("社会", "Society"),
    ("貢献", "Contribution"),
    ("デザイン", "Design"),
    ("サポーター", "Supporters"),
    ("目標金額", "Goal Amount"),
];

static JP_CATEGORIES: &[(&str, &str)] = &[
    ("ファッション", "Fashion"),
    ("テクノロジー", "Technology"),
    ("フード", "Food"),
    ("プロダクト", "Product"),
    ("美容", "Beauty"),
    ("アート", "Art"),
    ("音楽", "Music"),
    ("ゲーム", "Game"),
    ("映画", "Movie"),
    ("教育", "Education"),
    ("スポーツ", "Sports"),
    ("地域活性化", "Regional Revitalization"),
    ("社会貢献", "Social Contribution"),
];

pub(crate) fn translate_jp_terms(text: &str) -> String {
    let mut out = text.to_string();
    for (jp, en) in JP_EN_TERMS {
        if out.contains(jp) {
            out = out.replace(jp, en);
        }
    }
    out
}

fn translate_jp_category(category: &str) -> String {
    JP_CATEGORIES
        .iter()
        .find(|(jp, _)| *jp == category.trim())
        .map(|(_, en)| en.to_string())
        .unwrap_or_else(|| category.to_string())
}

static RE_COMPANY_REP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:株式会社|有限会社)?\s*代表\s*([^\s\n]{2,20})").unwrap());
static RE_COMPANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\s]{1,20})\s*株式会社|株式会社\s*([^\s]{1,20})").unwrap());

pub struct MakuakeAdapter {
    renderer: Arc<dyn PageRenderer>,
    cfg: ScraperConfig,
    taxonomy: Arc<Taxonomy>,
}

impl MakuakeAdapter {
    pub fn new(renderer: Arc<dyn PageRenderer>, cfg: ScraperConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            renderer,
            cfg,
            taxonomy,
        }
    }

    fn category_slug(category: &str, keyword: &str) -> &'static str {
        let lookup = |term: &str| {
            let term = term.to_lowercase();
            CATEGORY_SLUGS
                .iter()
                .find(|(k, _)| *k == term)
                .map(|(_, slug)| *slug)
        };
        // Keyword inference, then category; food has the broadest inventory
        // and serves as the default landing page.
        first_of([lookup(keyword), lookup(category)]).unwrap_or("food")
    }

    fn listing_urls(category: &str, keyword: &str) -> Vec<String> {
        vec![format!(
            "{BASE_URL}/discover/categories/{}?sort=popular",
            Self::category_slug(category, keyword)
        )]
    }

    fn is_project_link(url: &str) -> bool {
        url.contains("/project/")
    }

    async fn extract_detail(&self, url: String, language: &str) -> Option<CampaignRecord> {
        let timeout = Duration::from_secs(self.cfg.nav_timeout_secs);
        let translate = language == "en";

        let result = crate::renderer::with_session(self.renderer.as_ref(), |sess| {
            let url = url.clone();
            Box::pin(async move {
                sess.navigate(&url, WaitStrategy::DomContentLoaded, timeout)
                    .await?;

                let mut rec = CampaignRecord::new("Makuake", &url);

                let title = first_of([
                    cascade_text(sess, &["h1", ".project-title"]).await,
                    title_from_slug(&url),
                ])
                .unwrap_or_default();
                rec.original_title = title.clone();
                rec.title = if translate {
                    translate_jp_terms(&title)
                } else {
                    title
                };

                let description = first_of([
                    cascade_attr(
                        sess,
                        &[
                            ("meta[name=\"description\"]", "content"),
                            ("meta[property=\"og:description\"]", "content"),
                        ],
                    )
                    .await,
                    cascade_text(sess, &[".project-description p", ".story p", "p"]).await,
                ])
                .map(|d| truncate_chars(&extract::normalize_text(&d), 500))
                .unwrap_or_default();
                rec.description = if translate {
                    translate_jp_terms(&description)
                } else {
                    description
                };

                rec.image_url = first_of([
                    cascade_attr(sess, &[("meta[property=\"og:image\"]", "content")]).await,
                    cascade_attr(sess, &[("img[src*=\"/upload/project/\"]", "src")]).await,
                ]);

                let body = sess.body_text().await.unwrap_or_default();
                rec.raised = jpy_total(&body);
                rec.goal = jpy_goal(&body);
                rec.supporters = jp_supporters(&body);
                rec.achievement_rate = percent(&body);

                let dates = iso_dates(&body);
                rec.start_date = dates.first().copied();
                rec.end_date = dates.get(1).copied();

                rec.status = if body.contains("このプロジェクトは終了しました")
                    || body.contains("Makuake STORE")
                {
                    ProjectStatus::Ended
                } else if body.contains("Success!") || body.contains("達成") {
                    ProjectStatus::Successful
                } else {
                    ProjectStatus::Live
                };

                let category = cascade_text(sess, &["a[href*=\"/discover/categories/\"]"])
                    .await
                    .unwrap_or_default();
                rec.category = if translate {
                    translate_jp_category(&category)
                } else {
                    category
                };

                // Owner: member-profile link first, then the company
                // representative patterns that appear in the executor box.
                let owner = first_of([
                    cascade_attr(sess, &[("a[href*=\"/member/index/\"] img", "alt")]).await,
                    cascade_text(
                        sess,
                        &[
                            ".owner-info_name",
                            ".project-executor .name",
                            ".project-owner .name",
                            ".creator-name",
                        ],
                    )
                    .await,
                    RE_COMPANY_REP
                        .captures(&body)
                        .map(|c| c[1].trim().to_string()),
                    RE_COMPANY.captures(&body).and_then(|c| {
                        c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string())
                    }),
                ])
                .unwrap_or_default();
                rec.project_owner = clean_owner(&owner);

                rec.owner_sns = first_of([
                    cascade_attr(sess, &[("a[href*=\"twitter.com\"]", "href")]).await,
                    cascade_attr(sess, &[("a[href*=\"instagram.com\"]", "href")]).await,
                    cascade_attr(sess, &[("a[href*=\"facebook.com\"]", "href")]).await,
                ]);
                rec.contact_info = cascade_attr(sess, &[("a[href^=\"mailto:\"]", "href")])
                    .await
                    .map(|href| href.trim_start_matches("mailto:").to_string());
                rec.owner_website =
                    cascade_attr(sess, &[("a[href*=\"/member/index/\"]", "href")]).await;
                rec.owner_country = Some("Japan".to_string());

                Ok(rec)
            })
        })
        .await;

        match result {
            Ok(rec) if !rec.title.is_empty() => Some(rec),
            Ok(_) => None,
            Err(e) => {
                warn!(%url, error = ?e, "makuake: detail extraction failed");
                None
            }
        }
    }
}

/// Owner strings mined from page text pick up trailing UI noise; keep the
/// first line and cap the length.
fn clean_owner(owner: &str) -> String {
    let first_line = owner.lines().next().unwrap_or_default().trim();
    let cut = first_line
        .find("実行者にメッセージ")
        .or_else(|| first_line.find("活動レポート"))
        .unwrap_or(first_line.len());
    first_line[..cut].chars().take(50).collect::<String>().trim().to_string()
}

#[async_trait]
impl PlatformAdapter for MakuakeAdapter {
    fn name(&self) -> &'static str {
        "makuake"
    }

    fn display_name(&self) -> &'static str {
        "Makuake"
    }

    fn description(&self) -> &'static str {
        "Japanese crowdfunding for new products and experiences"
    }

    fn categories(&self) -> CategoryTaxonomy {
        let mut groups = CategoryTaxonomy::new();
        let entries: BTreeMap<String, String> = CATEGORY_SLUGS
            .iter()
            .map(|(k, slug)| (k.to_string(), slug.to_string()))
            .collect();
        groups.insert("All Categories".to_string(), entries);
        groups
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
            "a[href*=\"/project/\"]",
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
    fn keyword_infers_category_slug() {
        assert_eq!(MakuakeAdapter::category_slug("all", "game"), "game");
        assert_eq!(MakuakeAdapter::category_slug("fashion", ""), "fashion");
        assert_eq!(MakuakeAdapter::category_slug("all", ""), "food");
    }

    #[test]
    fn term_translation_is_substitution_only() {
        assert_eq!(
            translate_jp_terms("日本製 長財布 プロジェクト"),
            "Made in Japan Long Wallet Project"
        );
        // Unknown text passes through untouched.
        assert_eq!(translate_jp_terms("Plain English"), "Plain English");
    }

    #[test]
    fn owner_cleanup_drops_ui_noise() {
        assert_eq!(
            clean_owner("山田太郎実行者にメッセージを送る\n他の行"),
            "山田太郎"
        );
        assert_eq!(clean_owner("Acme Inc"), "Acme Inc");
    }

    #[test]
    fn company_rep_pattern() {
        let caps = RE_COMPANY_REP.captures("アクメ株式会社 代表 山田太郎 です").unwrap();
        assert_eq!(&caps[1], "山田太郎");
    }
}
