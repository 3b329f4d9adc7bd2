// src/providers/mod.rs
//! Upstream adapters plus the normalization helpers they share.

pub mod coin_news;
pub mod global;
pub mod market;
pub mod rss_json;
pub mod rss_xml;
pub mod sentiment;
pub mod wallet;

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::OnceCell;
use regex::Regex;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

pub use coin_news::CoinNewsClient;
pub use global::GlobalStatsClient;
pub use market::MarketDataClient;
pub use rss_json::RssJsonSource;
pub use rss_xml::RawXmlSource;
pub use sentiment::SentimentClient;
pub use wallet::WalletClient;

pub const DESCRIPTION_MAX_CHARS: usize = 240;

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|</?[^>]+>").expect("tag regex"))
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn re_img() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("img regex")
    })
}

/// Plain text from an HTML fragment: decode entities, strip tags, collapse
/// whitespace, cap at `max_chars` (an ellipsis marks truncation).
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // Entities are decoded twice: once so escaped markup becomes real tags,
    // once more for entities that were inside that markup.
    let decoded = html_escape::decode_html_entities(s).to_string();
    let stripped = re_tags().replace_all(&decoded, " ");
    let decoded = html_escape::decode_html_entities(&stripped).to_string();

    let out = decoded
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");
    let out = re_ws().replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        let mut cut: String = out.chars().take(max_chars).collect();
        cut = cut.trim_end().to_string();
        cut.push_str("...");
        cut
    } else {
        out
    }
}

/// Short plain-text description for a news card.
pub fn snippet(s: &str) -> String {
    normalize_text(s, DESCRIPTION_MAX_CHARS)
}

/// Single-line title; titles are not length-capped.
pub fn clean_title(s: &str) -> String {
    normalize_text(s, usize::MAX)
}

/// First `<img src>` inside an HTML fragment.
pub fn first_image_in_html(html: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(html);
    re_img()
        .captures_iter(&decoded)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|u| u.starts_with("http"))
}

pub fn unix_seconds_to_ms(secs: i64) -> i64 {
    secs.saturating_mul(1000)
}

/// Epoch milliseconds from any timestamp shape seen upstream:
/// Unix seconds or milliseconds, ISO-8601/RFC-3339, RFC-822/2822, or
/// `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = s.parse().ok()?;
        // 10^12 ms is Sept 2001; anything below is a seconds value.
        return Some(if n >= 1_000_000_000_000 {
            n
        } else {
            unix_seconds_to_ms(n)
        });
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    None
}
