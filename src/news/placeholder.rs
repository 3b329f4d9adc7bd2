// src/news/placeholder.rs
//! Last rung of the news fallback ladder: fixed cards that say live data is
//! unavailable, so the UI never renders an empty panel.

use crate::types::{Language, NewsItem};

pub const PLACEHOLDER_SOURCE: &str = "System";

pub fn placeholder_items(lang: Language, now_ms: i64) -> Vec<NewsItem> {
    let texts: [(&str, &str); 2] = match lang {
        Language::En => [
            (
                "Live news temporarily unavailable",
                "News sources could not be reached. Market data is unaffected; news will refresh automatically.",
            ),
            (
                "Check back shortly",
                "Upstream feeds are rate limited or offline. Try again in a minute.",
            ),
        ],
        Language::Zh => [
            (
                "实时新闻暂时不可用",
                "无法连接新闻源。行情数据不受影响，新闻将自动刷新。",
            ),
            ("请稍后再试", "上游新闻源限流或离线，请一分钟后重试。"),
        ],
    };
    texts
        .iter()
        .enumerate()
        .map(|(i, (title, description))| NewsItem {
            title: (*title).to_string(),
            url: String::new(),
            description: (*description).to_string(),
            source: PLACEHOLDER_SOURCE.to_string(),
            created_at: now_ms - i as i64,
            image_url: None,
        })
        .collect()
}

pub fn is_placeholder(item: &NewsItem) -> bool {
    item.source == PLACEHOLDER_SOURCE && item.url.is_empty()
}
