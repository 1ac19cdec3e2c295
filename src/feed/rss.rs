use super::types::FeedEntry;
use super::FeedFetcher;
use crate::error::{RefreshError, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;

/// Fetches RSS 2.0 or Atom documents over HTTP.
pub struct HttpFeedFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("inky-refresh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RefreshError::SourceUnavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, e: reqwest::Error) -> RefreshError {
        if e.is_timeout() {
            RefreshError::Timeout {
                what: "feed fetch",
                budget: self.timeout,
            }
        } else {
            RefreshError::SourceUnavailable(format!("feed request failed: {}", e))
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let resp = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RefreshError::SourceUnavailable(format!(
                "feed {} returned {}",
                url, status
            )));
        }

        let body = resp.text().await.map_err(|e| self.classify(e))?;
        parse_feed(&body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    ContentEncoded,
    Content,
    Summary,
    Description,
}

impl Field {
    fn from_qname(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"content:encoded" => Some(Field::ContentEncoded),
            b"content" => Some(Field::Content),
            b"summary" => Some(Field::Summary),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PartialEntry {
    /// `<entry>` rather than `<item>`.
    atom: bool,
    title: String,
    content_encoded: String,
    content: String,
    summary: String,
    description: String,
}

impl PartialEntry {
    fn buffer(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::ContentEncoded => &mut self.content_encoded,
            Field::Content => &mut self.content,
            Field::Summary => &mut self.summary,
            Field::Description => &mut self.description,
        }
    }

    /// RSS items lead with the short `<description>`; full `content:encoded`
    /// is only a fallback. Atom entries prefer `<content>` over `<summary>`.
    fn finish(self) -> FeedEntry {
        let candidates = if self.atom {
            [self.content, self.content_encoded, self.summary, self.description]
        } else {
            [self.description, self.content, self.content_encoded, self.summary]
        };
        let body = candidates
            .into_iter()
            .find(|b| !b.trim().is_empty())
            .unwrap_or_default();
        FeedEntry {
            title: self.title,
            body,
        }
    }
}

/// Parse `<item>` (RSS) or `<entry>` (Atom) elements in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<PartialEntry> = None;
    // Field being captured and the qualified tag that closes it.
    let mut field: Option<(Field, Vec<u8>)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RefreshError::SourceUnavailable(format!("malformed feed: {}", e)))?;
        match event {
            Event::Start(e) => {
                let local = e.local_name();
                if matches!(local.as_ref(), b"item" | b"entry") {
                    current = Some(PartialEntry {
                        atom: local.as_ref() == b"entry",
                        ..PartialEntry::default()
                    });
                    field = None;
                } else if current.is_some() && field.is_none() {
                    let qname = e.name().as_ref().to_vec();
                    field = Field::from_qname(&qname).map(|f| (f, qname));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if matches!(local.as_ref(), b"item" | b"entry") {
                    if let Some(done) = current.take() {
                        entries.push(done.finish());
                    }
                    field = None;
                } else if field.as_ref().is_some_and(|(_, tag)| tag.as_slice() == e.name().as_ref()) {
                    field = None;
                }
            }
            Event::Text(t) => {
                if let (Some(entry), Some((f, _))) = (current.as_mut(), field.as_ref()) {
                    // HTML entities such as &nbsp; are not XML; keep them raw for strip_html.
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    entry.buffer(*f).push_str(&text);
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some((f, _))) = (current.as_mut(), field.as_ref()) {
                    entry.buffer(*f).push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}
