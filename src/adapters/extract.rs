// src/adapters/extract.rs
//! Shared extraction strategies: selector cascades, text normalization, and
//! the regex fallbacks over full page text. Every adapter runs the same
//! three tiers: selectors -> embedded structured data -> regex patterns.

use crate::record::{Currency, Money};
use crate::renderer::PageSession;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// First non-`None` candidate wins; mirrors the per-field strategy chains
/// the site adapters are built from.
pub fn first_of<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

/// Try selectors in priority order, returning the first non-empty text.
pub async fn cascade_text(sess: &mut dyn PageSession, selectors: &[&str]) -> Option<String> {
    for sel in selectors {
        if let Ok(Some(t)) = sess.text(sel).await {
            let t = normalize_text(&t);
            if !t.is_empty() {
                return Some(t);
            }
        }
    }
    None
}

/// Try (selector, attribute) pairs in priority order.
pub async fn cascade_attr(sess: &mut dyn PageSession, pairs: &[(&str, &str)]) -> Option<String> {
    for (sel, attr) in pairs {
        if let Ok(Some(v)) = sess.attr(sel, attr).await {
            let v = v.trim().to_string();
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

/// Normalize extracted text: decode HTML entities, strip tags, unify
/// quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = RE_TAGS.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    out = RE_WS.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Character-boundary-safe truncation for long descriptions.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Derive a human title from a URL slug: `smart-lamp-mini` -> `Smart Lamp Mini`.
pub fn title_from_slug(url: &str) -> Option<String> {
    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .split('?')
        .next()?;
    if slug.is_empty() {
        return None;
    }
    let words: Vec<String> = slug
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(first) => first.to_uppercase().collect::<String>() + cs.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/* ----------------------------
Regex fallbacks over page text
---------------------------- */

static RE_USD_PLEDGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$([\d,]+)\s*(?:pledged|raised|funded)").unwrap());
static RE_USD_GOAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:of|goal)\s*\$([\d,]+)").unwrap());
static RE_BACKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d,]+)\s*backers?").unwrap());
static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d,]+)\s*%").unwrap());
static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[-/](\d{2})[-/](\d{2})").unwrap());

// Japanese sites: 応援購入総額 (Makuake), 現在 / 支援総額 (CAMPFIRE,
// GREEN FUNDING), 目標金額, サポーター/支援者 counts.
static RE_JPY_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:応援購入総額|支援総額|現在)\s*([\d,]+)\s*円").unwrap()
});
static RE_JPY_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]{4,})\s*円|[￥¥]([\d,]{4,})").unwrap());
static RE_JPY_GOAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"目標金額\s*(?:は)?\s*([\d,]+)\s*円").unwrap());
static RE_JP_SUPPORTERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:サポーター|支援者|パトロン)\s*(?:数)?\s*([\d,]+)\s*人").unwrap()
});

// FlyingV (Taiwan): NT$ amounts, 目標 goal lines.
static RE_TWD_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"NT\$\s*([\d,]+)").unwrap());
static RE_TWD_GOAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"目標\s*NT\$\s*([\d,]+)").unwrap());

fn cap_to_f64(m: &str) -> Option<f64> {
    m.replace(',', "").parse::<f64>().ok()
}

pub fn usd_pledged(text: &str) -> Option<Money> {
    let caps = RE_USD_PLEDGED.captures(text)?;
    Some(Money::new(cap_to_f64(&caps[1])?, Currency::Usd))
}

pub fn usd_goal(text: &str) -> Option<Money> {
    let caps = RE_USD_GOAL.captures(text)?;
    Some(Money::new(cap_to_f64(&caps[1])?, Currency::Usd))
}

pub fn backers(text: &str) -> Option<u64> {
    let caps = RE_BACKERS.captures(text)?;
    cap_to_f64(&caps[1]).map(|v| v as u64)
}

pub fn percent(text: &str) -> Option<f64> {
    let caps = RE_PERCENT.captures(text)?;
    cap_to_f64(&caps[1])
}

pub fn jpy_total(text: &str) -> Option<Money> {
    if let Some(caps) = RE_JPY_TOTAL.captures(text) {
        return Some(Money::new(cap_to_f64(&caps[1])?, Currency::Jpy));
    }
    // Weakest fallback: any large yen figure on the page.
    let caps = RE_JPY_ANY.captures(text)?;
    let m = caps.get(1).or_else(|| caps.get(2))?;
    Some(Money::new(cap_to_f64(m.as_str())?, Currency::Jpy))
}

pub fn jpy_goal(text: &str) -> Option<Money> {
    let caps = RE_JPY_GOAL.captures(text)?;
    Some(Money::new(cap_to_f64(&caps[1])?, Currency::Jpy))
}

pub fn jp_supporters(text: &str) -> Option<u64> {
    let caps = RE_JP_SUPPORTERS.captures(text)?;
    cap_to_f64(&caps[1]).map(|v| v as u64)
}

pub fn twd_amount(text: &str) -> Option<Money> {
    let caps = RE_TWD_AMOUNT.captures(text)?;
    Some(Money::new(cap_to_f64(&caps[1])?, Currency::Twd))
}

pub fn twd_goal(text: &str) -> Option<Money> {
    let caps = RE_TWD_GOAL.captures(text)?;
    Some(Money::new(cap_to_f64(&caps[1])?, Currency::Twd))
}

/// First two distinct ISO-style dates on the page, in document order.
pub fn iso_dates(text: &str) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    for caps in RE_ISO_DATE.captures_iter(text) {
        let (y, m, d) = (
            caps[1].parse::<i32>().ok(),
            caps[2].parse::<u32>().ok(),
            caps[3].parse::<u32>().ok(),
        );
        if let (Some(y), Some(m), Some(d)) = (y, m, d) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                if !out.contains(&date) {
                    out.push(date);
                }
            }
        }
        if out.len() >= 2 {
            break;
        }
    }
    out
}

/* ----------------------------
Structured-data mining
---------------------------- */

/// Walk embedded JSON blobs (ld+json products, injected state) and return
/// the first string at any of the given keys.
pub fn structured_string(blobs: &[Value], keys: &[&str]) -> Option<String> {
    for blob in blobs {
        if let Some(v) = find_key(blob, keys) {
            match v {
                Value::String(s) if !s.trim().is_empty() => {
                    return Some(normalize_text(s));
                }
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    None
}

/// Like `structured_string` but parses the hit as a number.
pub fn structured_number(blobs: &[Value], keys: &[&str]) -> Option<f64> {
    for blob in blobs {
        if let Some(v) = find_key(blob, keys) {
            match v {
                Value::Number(n) => return n.as_f64(),
                Value::String(s) => {
                    if let Some(n) = cap_to_f64(s.trim()) {
                        return Some(n);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn find_key<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            for k in keys {
                if let Some(v) = map.get(*k) {
                    return Some(v);
                }
            }
            map.values().find_map(|v| find_key(v, keys))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, keys)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_of_takes_first_hit() {
        assert_eq!(first_of([None, Some(2), Some(3)]), Some(2));
        assert_eq!(first_of::<i32>([None, None]), None);
    }

    #[test]
    fn normalize_strips_entities_and_tags() {
        assert_eq!(
            normalize_text("  Hello,&nbsp;<b>world</b>  "),
            "Hello, world"
        );
    }

    #[test]
    fn slug_titles() {
        assert_eq!(
            title_from_slug("https://x.com/projects/maker/smart-lamp-mini"),
            Some("Smart Lamp Mini".to_string())
        );
        assert_eq!(
            title_from_slug("https://x.com/projects/maker/thing?ref=nav"),
            Some("Thing".to_string())
        );
    }

    #[test]
    fn usd_patterns() {
        let text = "1,234 backers $45,678 pledged of $50,000 goal 91%";
        assert_eq!(usd_pledged(text).map(|m| m.amount), Some(45678.0));
        assert_eq!(usd_goal(text).map(|m| m.amount), Some(50000.0));
        assert_eq!(backers(text), Some(1234));
        assert_eq!(percent(text), Some(91.0));
    }

    #[test]
    fn jpy_patterns() {
        let text = "応援購入総額 2,310,000 円 目標金額は 1,000,000 円 サポーター 412 人 残り 12 日";
        assert_eq!(jpy_total(text).map(|m| m.amount), Some(2_310_000.0));
        assert_eq!(jpy_goal(text).map(|m| m.amount), Some(1_000_000.0));
        assert_eq!(jp_supporters(text), Some(412));
    }

    #[test]
    fn jpy_weak_fallback_needs_four_digits() {
        assert!(jpy_total("手数料 300 円").is_none());
        assert_eq!(
            jpy_total("￥1,234,567").map(|m| m.amount),
            Some(1_234_567.0)
        );
    }

    #[test]
    fn twd_patterns() {
        let text = "已募得 NT$ 765,432 目標 NT$ 500,000";
        assert_eq!(twd_amount(text).map(|m| m.amount), Some(765_432.0));
        assert_eq!(twd_goal(text).map(|m| m.amount), Some(500_000.0));
    }

    #[test]
    fn iso_dates_in_order_and_distinct() {
        let ds = iso_dates("start 2026-05-01 end 2026/07/01 again 2026-05-01");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].to_string(), "2026-05-01");
        assert_eq!(ds[1].to_string(), "2026-07-01");
    }

    #[test]
    fn structured_mining_walks_nested_blobs() {
        let blob = json!([{
            "@type": "Product",
            "name": "GF Speaker",
            "brand": { "name": "Acme Audio" },
            "offers": { "price": "12800" }
        }]);
        assert_eq!(
            structured_string(&[blob.clone()], &["name"]),
            Some("GF Speaker".to_string())
        );
        assert_eq!(structured_number(&[blob], &["price"]), Some(12800.0));
    }
}
