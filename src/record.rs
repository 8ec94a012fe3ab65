// src/record.rs
//! Canonical campaign data: typed fields internally, display strings only at
//! the materializer boundary.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state as reported by the source site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Live,
    Successful,
    Ended,
    Canceled,
    Suspended,
    Failed,
    Unknown,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Live => "live",
            ProjectStatus::Successful => "successful",
            ProjectStatus::Ended => "ended",
            ProjectStatus::Canceled => "canceled",
            ProjectStatus::Suspended => "suspended",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Unknown => "unknown",
        }
    }

    /// Loose parse accepting the status words the sites actually emit.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" | "active" | "open" | "進行中" => ProjectStatus::Live,
            "successful" | "success" | "funded" | "達成" => ProjectStatus::Successful,
            "ended" | "finished" | "closed" | "終了" => ProjectStatus::Ended,
            "canceled" | "cancelled" => ProjectStatus::Canceled,
            "suspended" => ProjectStatus::Suspended,
            "failed" => ProjectStatus::Failed,
            _ => ProjectStatus::Unknown,
        }
    }
}

/// Derived two-state view used by the persisted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Current,
    Completed,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Current => "Current",
            Completion::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Jpy,
    Twd,
    Eur,
    Krw,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Jpy => "¥",
            Currency::Twd => "NT$",
            Currency::Eur => "€",
            Currency::Krw => "₩",
        }
    }
}

/// A monetary value kept numeric until rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Render with the currency symbol and thousands separators
    /// (`$45,000`, `¥1,234,567`).
    pub fn display(&self) -> String {
        format!("{}{}", self.currency.symbol(), format_thousands(self.amount))
    }
}

/// Normalized extracted data for one crowdfunding project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub url: String,
    pub title: String,
    pub original_title: String,
    pub project_owner: String,
    pub owner_website: Option<String>,
    pub owner_sns: Option<String>,
    pub owner_country: Option<String>,
    pub contact_info: Option<String>,
    pub status: ProjectStatus,
    /// Percentage funded, e.g. 128.0 for "128%".
    pub achievement_rate: Option<f64>,
    pub supporters: Option<u64>,
    /// Amount raised so far.
    pub raised: Option<Money>,
    /// Funding goal (`support_amount` in the persisted documents).
    pub goal: Option<Money>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: String,
    pub platform: String,
    pub description: String,
    pub image_url: Option<String>,
}

impl CampaignRecord {
    /// Empty skeleton for an adapter to fill field by field.
    pub fn new(platform: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            original_title: String::new(),
            project_owner: String::new(),
            owner_website: None,
            owner_sns: None,
            owner_country: None,
            contact_info: None,
            status: ProjectStatus::Unknown,
            achievement_rate: None,
            supporters: None,
            raised: None,
            goal: None,
            start_date: None,
            end_date: None,
            category: String::new(),
            platform: platform.to_string(),
            description: String::new(),
            image_url: None,
        }
    }

    pub fn completion(&self) -> Completion {
        match self.status {
            ProjectStatus::Live | ProjectStatus::Unknown => Completion::Current,
            _ => Completion::Completed,
        }
    }

    /// Render the display document persisted to result files and the
    /// database audit column. Missing fields render as empty strings, the
    /// notation downstream consumers already expect.
    pub fn to_document(&self) -> Map<String, Value> {
        fn s(v: &str) -> Value {
            Value::String(v.to_string())
        }
        fn opt(v: &Option<String>) -> Value {
            Value::String(v.clone().unwrap_or_default())
        }

        let mut doc = Map::new();
        doc.insert("url".into(), s(&self.url));
        doc.insert("title".into(), s(&self.title));
        doc.insert("original_title".into(), s(&self.original_title));
        doc.insert("project_owner".into(), s(&self.project_owner));
        doc.insert("owner_website".into(), opt(&self.owner_website));
        doc.insert("owner_sns".into(), opt(&self.owner_sns));
        doc.insert("owner_country".into(), opt(&self.owner_country));
        doc.insert("contact_info".into(), opt(&self.contact_info));
        doc.insert("status".into(), s(self.status.as_str()));
        doc.insert(
            "achievement_rate".into(),
            s(&self
                .achievement_rate
                .map(display_percent)
                .unwrap_or_default()),
        );
        doc.insert(
            "supporters".into(),
            s(&self
                .supporters
                .map(|n| format_thousands(n as f64))
                .unwrap_or_default()),
        );
        doc.insert(
            "amount".into(),
            s(&self.raised.map(|m| m.display()).unwrap_or_default()),
        );
        doc.insert(
            "support_amount".into(),
            s(&self.goal.map(|m| m.display()).unwrap_or_default()),
        );
        doc.insert(
            "crowdfund_start_date".into(),
            s(&self
                .start_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()),
        );
        doc.insert(
            "crowdfund_end_date".into(),
            s(&self
                .end_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()),
        );
        doc.insert(
            "current_or_completed_project".into(),
            s(self.completion().as_str()),
        );
        doc.insert("category".into(), s(&self.category));
        doc.insert("platform".into(), s(&self.platform));
        doc.insert("description".into(), s(&self.description));
        doc.insert("image_url".into(), opt(&self.image_url));
        doc
    }

    /// Re-ingest a persisted display document (used by re-enhancement of
    /// existing result files). Unparseable display strings fold back to
    /// `None` rather than failing the whole document.
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        fn text(doc: &Map<String, Value>, key: &str) -> String {
            doc.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        }
        fn opt_text(doc: &Map<String, Value>, key: &str) -> Option<String> {
            let v = text(doc, key);
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        }

        let platform = text(doc, "platform");
        let mut rec = CampaignRecord::new(&platform, &text(doc, "url"));
        rec.title = text(doc, "title");
        rec.original_title = text(doc, "original_title");
        rec.project_owner = text(doc, "project_owner");
        rec.owner_website = opt_text(doc, "owner_website");
        rec.owner_sns = opt_text(doc, "owner_sns");
        rec.owner_country = opt_text(doc, "owner_country");
        rec.contact_info = opt_text(doc, "contact_info");
        rec.status = ProjectStatus::parse(&text(doc, "status"));
        rec.achievement_rate = parse_percent(&text(doc, "achievement_rate"));
        rec.supporters = parse_count(&text(doc, "supporters"));
        rec.raised = parse_money(&text(doc, "amount"));
        rec.goal = parse_money(&text(doc, "support_amount"));
        rec.start_date = parse_date(&text(doc, "crowdfund_start_date"));
        rec.end_date = parse_date(&text(doc, "crowdfund_end_date"));
        rec.category = text(doc, "category");
        rec.description = text(doc, "description");
        rec.image_url = opt_text(doc, "image_url");
        rec
    }
}

fn display_percent(p: f64) -> String {
    if (p - p.round()).abs() < f64::EPSILON {
        format!("{}%", p.round() as i64)
    } else {
        format!("{:.1}%", p)
    }
}

/// Thousands-separated integer rendering; fractional cents are dropped, the
/// sites themselves only ever show whole units.
pub fn format_thousands(v: f64) -> String {
    let n = v.round() as i64;
    let raw = n.abs().to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9][0-9,\.]*").expect("number regex"));

/// Recognized currency notations, longest prefix first so `NT$` is not read
/// as `$`.
const CURRENCY_MARKS: &[(&str, Currency)] = &[
    ("NT$", Currency::Twd),
    ("NTD", Currency::Twd),
    ("TWD", Currency::Twd),
    ("US$", Currency::Usd),
    ("USD", Currency::Usd),
    ("JPY", Currency::Jpy),
    ("KRW", Currency::Krw),
    ("EUR", Currency::Eur),
    ("￥", Currency::Jpy),
    ("¥", Currency::Jpy),
    ("円", Currency::Jpy),
    ("€", Currency::Eur),
    ("₩", Currency::Krw),
    ("$", Currency::Usd),
];

/// Does the string already carry any recognized currency notation?
pub fn has_currency_notation(s: &str) -> bool {
    CURRENCY_MARKS.iter().any(|(mark, _)| s.contains(mark))
}

/// Parse a display amount like `$45,000`, `￥1,234,567 JPY` or `NT$ 98,000`.
/// Bare numbers parse as USD; empty or non-numeric input is `None`.
pub fn parse_money(s: &str) -> Option<Money> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let currency = CURRENCY_MARKS
        .iter()
        .find(|(mark, _)| trimmed.contains(mark))
        .map(|(_, c)| *c)
        .unwrap_or(Currency::Usd);
    let amount = parse_number(trimmed)?;
    Some(Money::new(amount, currency))
}

/// Parse a count like `1,234` or `523 people`.
pub fn parse_count(s: &str) -> Option<u64> {
    parse_number(s).map(|v| v.max(0.0) as u64)
}

/// Parse a percentage like `128%` or `128.5`.
pub fn parse_percent(s: &str) -> Option<f64> {
    parse_number(s)
}

fn parse_number(s: &str) -> Option<f64> {
    let m = RE_NUMBER.find(s)?;
    m.as_str().replace(',', "").parse::<f64>().ok()
}

/// Accepts `2026-07-01` and `2026/07/01`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_roundtrip_display() {
        let m = parse_money("$45,000").expect("usd");
        assert_eq!(m.currency, Currency::Usd);
        assert_eq!(m.display(), "$45,000");

        let y = parse_money("￥1,234,567").expect("jpy");
        assert_eq!(y.currency, Currency::Jpy);
        assert_eq!(y.display(), "¥1,234,567");

        let nt = parse_money("NT$ 98,000").expect("twd");
        assert_eq!(nt.currency, Currency::Twd);
        assert_eq!(nt.display(), "NT$98,000");
    }

    #[test]
    fn twd_is_not_misread_as_usd() {
        assert_eq!(
            parse_money("NT$5,000").map(|m| m.currency),
            Some(Currency::Twd)
        );
    }

    #[test]
    fn counts_and_percents() {
        assert_eq!(parse_count("1,234 people"), Some(1234));
        assert_eq!(parse_percent("128%"), Some(128.0));
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn status_parse_accepts_site_words() {
        assert_eq!(ProjectStatus::parse("達成"), ProjectStatus::Successful);
        assert_eq!(ProjectStatus::parse("active"), ProjectStatus::Live);
        assert_eq!(ProjectStatus::parse("whatever"), ProjectStatus::Unknown);
    }

    #[test]
    fn completion_derivation() {
        let mut r = CampaignRecord::new("kickstarter", "https://example.com/p/1");
        r.status = ProjectStatus::Live;
        assert_eq!(r.completion(), Completion::Current);
        r.status = ProjectStatus::Successful;
        assert_eq!(r.completion(), Completion::Completed);
    }

    #[test]
    fn document_roundtrip_preserves_typed_fields() {
        let mut r = CampaignRecord::new("makuake", "https://www.makuake.com/project/x/");
        r.title = "Leather Wallet".into();
        r.original_title = "長財布".into();
        r.status = ProjectStatus::Live;
        r.achievement_rate = Some(231.0);
        r.supporters = Some(412);
        r.raised = Some(Money::new(2_310_000.0, Currency::Jpy));
        r.goal = Some(Money::new(1_000_000.0, Currency::Jpy));
        r.start_date = parse_date("2026-05-01");

        let doc = r.to_document();
        assert_eq!(doc["amount"], "¥2,310,000");
        assert_eq!(doc["achievement_rate"], "231%");
        assert_eq!(doc["current_or_completed_project"], "Current");

        let back = CampaignRecord::from_document(&doc);
        assert_eq!(back.supporters, Some(412));
        assert_eq!(back.raised, r.raised);
        assert_eq!(back.start_date, r.start_date);
    }
}
