// src/providers/rss_json.rs
//! RSS feeds read through an RSS-to-JSON conversion proxy.

use async_trait::async_trait;
use serde::Deserialize;

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::providers::{clean_title, first_image_in_html, parse_timestamp_ms, snippet};
use crate::types::{NewsItem, NewsSource};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    title: String,
    link: String,
    #[serde(rename = "pubDate")]
    pub_date: String,
    author: String,
    thumbnail: String,
    description: String,
    content: String,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Enclosure {
    link: Option<String>,
    #[serde(rename = "type")]
    mime: Option<String>,
}

impl Item {
    fn image(&self) -> Option<String> {
        if self.thumbnail.starts_with("http") {
            return Some(self.thumbnail.clone());
        }
        if let Some(enc) = &self.enclosure {
            let is_image = enc
                .mime
                .as_deref()
                .map(|m| m.is_empty() || m.starts_with("image/"))
                .unwrap_or(true);
            if let Some(link) = enc.link.as_deref().filter(|l| l.starts_with("http")) {
                if is_image {
                    return Some(link.to_string());
                }
            }
        }
        first_image_in_html(&self.content).or_else(|| first_image_in_html(&self.description))
    }
}

pub struct RssJsonSource {
    core: FetchCore,
    proxy_url: String,
    feed_url: String,
    name: String,
}

impl RssJsonSource {
    pub fn new(
        core: FetchCore,
        proxy_url: impl Into<String>,
        feed_url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            core,
            proxy_url: proxy_url.into(),
            feed_url: feed_url.into(),
            name: name.into(),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}?rss_url={}",
            self.proxy_url,
            urlencoding::encode(&self.feed_url)
        )
    }

    fn map_items(&self, env: Envelope) -> Result<Vec<NewsItem>, FetchError> {
        if !env.status.eq_ignore_ascii_case("ok") {
            return Err(FetchError::Decode(format!(
                "rss proxy status '{}': {}",
                env.status,
                env.message.unwrap_or_default()
            )));
        }
        let out = env
            .items
            .into_iter()
            .filter(|it| !it.title.trim().is_empty())
            .map(|it| {
                let image_url = it.image();
                let body = if it.description.trim().is_empty() {
                    &it.content
                } else {
                    &it.description
                };
                let source = if self.name.is_empty() {
                    it.author.clone()
                } else {
                    self.name.clone()
                };
                NewsItem {
                    title: clean_title(&it.title),
                    url: it.link.clone(),
                    description: snippet(body),
                    source,
                    created_at: parse_timestamp_ms(&it.pub_date).unwrap_or(0),
                    image_url,
                }
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl NewsSource for RssJsonSource {
    async fn fetch_items(&self) -> Result<Vec<NewsItem>, FetchError> {
        let req = FetchRequest::json(self.request_url()).retries(2, 1500);
        let v = self.core.fetch_json(req).await?;
        let env: Envelope =
            serde_json::from_value(v).map_err(|e| FetchError::Decode(e.to_string()))?;
        self.map_items(env)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MockTransport;
    use std::sync::Arc;

    fn source() -> RssJsonSource {
        let core = FetchCore::with_transport(Arc::new(MockTransport::new()));
        RssJsonSource::new(core, "https://proxy.test/api.json", "https://feed.test/rss", "Feed")
    }

    #[test]
    fn maps_items_and_picks_images() {
        let env: Envelope = serde_json::from_str(
            r#"{
                "status": "ok",
                "items": [
                    {"title": "A", "link": "https://a", "pubDate": "2024-01-01 12:00:00",
                     "thumbnail": "https://img/a.png", "description": "<b>desc</b>"},
                    {"title": "B", "link": "https://b", "pubDate": "2024-01-01 11:00:00",
                     "thumbnail": "", "enclosure": {"link": "https://img/b.jpg", "type": "image/jpeg"}},
                    {"title": "C", "link": "https://c", "pubDate": "2024-01-01 10:00:00",
                     "content": "<p><img src=\"https://img/c.png\">text</p>"},
                    {"title": "  ", "link": "https://skip"}
                ]
            }"#,
        )
        .unwrap();
        let items = source().map_items(env).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].image_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(items[0].description, "desc");
        assert_eq!(items[0].created_at, 1_704_110_400_000);
        assert_eq!(items[1].image_url.as_deref(), Some("https://img/b.jpg"));
        assert_eq!(items[2].image_url.as_deref(), Some("https://img/c.png"));
        assert_eq!(items[2].description, "text");
        assert!(items.iter().all(|i| i.source == "Feed"));
    }

    #[test]
    fn non_ok_status_is_an_error() {
        let env: Envelope =
            serde_json::from_str(r#"{"status": "error", "message": "bad feed"}"#).unwrap();
        assert!(matches!(source().map_items(env), Err(FetchError::Decode(_))));
    }

    #[test]
    fn feed_url_is_encoded_into_proxy_query() {
        assert_eq!(
            source().request_url(),
            "https://proxy.test/api.json?rss_url=https%3A%2F%2Ffeed.test%2Frss"
        );
    }
}
