// src/providers/rss_xml.rs
//! Raw RSS/Atom read through a pass-through proxy and walked with a pull
//! parser.
//!
//! Used for feeds whose images live in `media:content`/`enclosure`
//! attributes, which the JSON conversion proxy drops. Always bypasses the
//! cache: the request carries a cache-busting parameter and `use_cache=false`.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::providers::{clean_title, first_image_in_html, parse_timestamp_ms, snippet};
use crate::types::{NewsItem, NewsSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    Published,
    Author,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" => Some(Field::Description),
            b"content:encoded" | b"content" => Some(Field::Content),
            b"pubDate" | b"dc:date" | b"published" | b"updated" => Some(Field::Published),
            b"dc:creator" | b"author" | b"name" => Some(Field::Author),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RawItem {
    title: String,
    link: String,
    description: String,
    content: String,
    published: String,
    author: String,
    image: Option<String>,
}

impl RawItem {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Author => &mut self.author,
        };
        slot.push_str(text);
    }

    /// Pick up attribute-borne data: media images, enclosures, Atom links.
    fn absorb_attrs(&mut self, tag: &[u8], e: &BytesStart<'_>) {
        let mut url = None;
        let mut href = None;
        let mut mime = None;
        let mut medium = None;
        for attr in e.attributes().flatten() {
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => continue,
            };
            match attr.key.as_ref() {
                b"url" => url = Some(value),
                b"href" => href = Some(value),
                b"type" => mime = Some(value),
                b"medium" => medium = Some(value),
                _ => {}
            }
        }
        match tag {
            b"media:content" | b"media:thumbnail" => {
                let is_image = medium.as_deref().map_or(true, |m| m == "image")
                    && mime.as_deref().map_or(true, |m| m.starts_with("image/"));
                if is_image && self.image.is_none() {
                    self.image = url.filter(|u| u.starts_with("http"));
                }
            }
            b"enclosure" => {
                let is_image = mime.as_deref().is_some_and(|m| m.starts_with("image/"));
                if is_image && self.image.is_none() {
                    self.image = url.filter(|u| u.starts_with("http"));
                }
            }
            b"link" => {
                if self.link.is_empty() {
                    if let Some(h) = href {
                        self.link = h;
                    }
                }
            }
            _ => {}
        }
    }

    fn into_news_item(self, source: &str) -> Option<NewsItem> {
        let title = clean_title(&self.title);
        if title.is_empty() {
            return None;
        }
        let image_url = self
            .image
            .or_else(|| first_image_in_html(&self.content))
            .or_else(|| first_image_in_html(&self.description));
        let body = if self.description.trim().is_empty() {
            &self.content
        } else {
            &self.description
        };
        let source = if source.is_empty() {
            clean_title(&self.author)
        } else {
            source.to_string()
        };
        Some(NewsItem {
            title,
            url: self.link.trim().to_string(),
            description: snippet(body),
            source,
            created_at: parse_timestamp_ms(&self.published).unwrap_or(0),
            image_url,
        })
    }
}

/// Walk an RSS 2.0 or Atom document and normalize its items.
///
/// A parse error after at least one complete item returns what was read so
/// far; an error before any item is returned as `Decode`.
pub fn parse_feed(xml: &str, source: &str) -> Result<Vec<NewsItem>, FetchError> {
    let mut reader = Reader::from_str(xml);
    {
        let cfg = reader.config_mut();
        cfg.trim_text(true);
        // Feeds routinely embed sloppy HTML outside CDATA.
        cfg.check_end_names = false;
    }

    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let tag = name.as_ref();
                if tag == b"item" || tag == b"entry" {
                    current = Some(RawItem::default());
                    field = None;
                } else if let Some(it) = current.as_mut() {
                    it.absorb_attrs(tag, &e);
                    if let Some(f) = Field::from_tag(tag) {
                        field = Some(f);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(it) = current.as_mut() {
                    let name = e.name();
                    it.absorb_attrs(name.as_ref(), &e);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(it), Some(f)) = (current.as_mut(), field) {
                    let text = match t.unescape() {
                        Ok(s) => s.into_owned(),
                        // Unknown HTML entities: keep raw, normalization decodes them.
                        Err(_) => String::from_utf8_lossy(&t).into_owned(),
                    };
                    it.push(f, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(it), Some(f)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    it.push(f, &text);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let tag = name.as_ref();
                if tag == b"item" || tag == b"entry" {
                    if let Some(item) = current.take().and_then(|it| it.into_news_item(source)) {
                        items.push(item);
                    }
                    field = None;
                } else if Field::from_tag(tag).is_some() {
                    field = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if items.is_empty() {
                    return Err(FetchError::Decode(format!(
                        "feed xml at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
                warn!(target: "news", source, error = %e, kept = items.len(), "feed xml truncated");
                break;
            }
            _ => {}
        }
    }
    Ok(items)
}

pub struct RawXmlSource {
    core: FetchCore,
    proxy_url: String,
    feed_url: String,
    name: String,
}

impl RawXmlSource {
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

    fn request_url(&self, bust: i64) -> String {
        format!(
            "{}?url={}&_={}",
            self.proxy_url,
            urlencoding::encode(&self.feed_url),
            bust
        )
    }
}

#[async_trait]
impl NewsSource for RawXmlSource {
    async fn fetch_items(&self) -> Result<Vec<NewsItem>, FetchError> {
        let url = self.request_url(chrono::Utc::now().timestamp_millis());
        let req = FetchRequest::text(url).retries(2, 1500).cached(false);
        let body = self.core.fetch_text(req).await?;
        parse_feed(&body, &self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example Feed</title>
    <item>
      <title><![CDATA[Bitcoin tops $100K]]></title>
      <link>https://news.test/btc</link>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <dc:creator>Jane</dc:creator>
      <description><![CDATA[<p>Price &amp; volume surge.</p>]]></description>
      <media:content url="https://img.test/btc.jpg" medium="image" width="1200"/>
    </item>
    <item>
      <title>Ether&nbsp;update</title>
      <link>https://news.test/eth</link>
      <pubDate>Mon, 01 Jan 2024 11:00:00 +0000</pubDate>
      <description>Plain text</description>
      <enclosure url="https://img.test/eth.png" type="image/png" length="0"/>
    </item>
    <item>
      <title>Audio only</title>
      <link>https://news.test/pod</link>
      <enclosure url="https://cdn.test/pod.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn walks_rss_items_with_media_images() {
        let items = parse_feed(FEED, "Example").unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].title, "Bitcoin tops $100K");
        assert_eq!(items[0].url, "https://news.test/btc");
        assert_eq!(items[0].description, "Price & volume surge.");
        assert_eq!(items[0].created_at, 1_704_110_400_000);
        assert_eq!(items[0].image_url.as_deref(), Some("https://img.test/btc.jpg"));
        assert_eq!(items[0].source, "Example");

        assert_eq!(items[1].title, "Ether update");
        assert_eq!(items[1].image_url.as_deref(), Some("https://img.test/eth.png"));

        assert_eq!(items[2].image_url, None);
        assert_eq!(items[2].created_at, 0);
    }

    #[test]
    fn walks_atom_entries() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry>
              <title>Atom post</title>
              <link href="https://atom.test/1"/>
              <updated>2024-01-01T12:00:00Z</updated>
              <summary>Short</summary>
            </entry>
        </feed>"#;
        let items = parse_feed(atom, "Atom").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://atom.test/1");
        assert_eq!(items[0].created_at, 1_704_110_400_000);
    }

    #[test]
    fn proxy_error_page_yields_no_items() {
        let items = parse_feed("<html><body>Upstream blocked</body></html>", "X").unwrap();
        assert!(items.is_empty());
    }
}
