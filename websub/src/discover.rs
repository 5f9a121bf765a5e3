//! Hub discovery from a topic document.
//!
//! The topic is fetched and, when it is served as XML, parsed as an
//! Atom-style feed whose first `<link rel="hub">` names the hub. Parsing is
//! deliberately lenient: unknown elements are ignored and a document that
//! fails to parse simply has no hub.

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, SubscriptionError};

/// The parts of a feed discovery cares about.
#[derive(Debug, Default, Deserialize)]
struct Feed {
    #[serde(rename = "link", default)]
    links: Vec<FeedLink>,
}

#[derive(Debug, Deserialize)]
struct FeedLink {
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
    #[serde(rename = "@href", default)]
    href: Option<String>,
}

/// Fetch `topic` and extract the hub it advertises.
///
/// Returns `Ok(None)` when the document is XML but advertises no hub; the
/// caller decides whether that is fatal.
///
/// # Errors
///
/// - `SubscriptionError::Http` if the request or body read fails
/// - `SubscriptionError::MalformedContentType` if the Content-Type is missing
///   or unparsable
/// - `SubscriptionError::Response` if the document is not XML; the error
///   keeps the response for diagnostics
/// - `SubscriptionError::Url` if the advertised hub is not a valid URL
pub async fn discover(topic: &Url, client: &reqwest::Client) -> Result<Option<Url>> {
    tracing::debug!(topic = %topic, "discovering hub");
    let response = client.get(topic.clone()).send().await?;

    let raw_content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if media_subtype(&raw_content_type)? != "xml" {
        return Err(SubscriptionError::response("Unrecognized response type", response).await);
    }

    let body = response.text().await?;
    match find_hub_link(&body) {
        Some(href) => {
            let hub = topic.join(&href)?;
            tracing::debug!(topic = %topic, hub = %hub, "discovered hub");
            Ok(Some(hub))
        }
        None => {
            tracing::debug!(topic = %topic, "topic document advertises no hub");
            Ok(None)
        }
    }
}

/// The `href` of the first `<link rel="hub">` directly under the document
/// root, if any.
pub fn find_hub_link(xml: &str) -> Option<String> {
    let feed: Feed = match quick_xml::de::from_str(xml) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparsable topic document");
            return None;
        }
    };

    feed.links
        .into_iter()
        .filter(|link| link.rel.as_deref() == Some("hub"))
        .find_map(|link| link.href.filter(|href| !href.is_empty()))
}

/// Lowercased subtype of a media type, parameters ignored.
fn media_subtype(raw: &str) -> Result<String> {
    let essence = raw.split(';').next().unwrap_or_default().trim();

    match essence.split_once('/') {
        Some((kind, subtype)) if !kind.trim().is_empty() && !subtype.trim().is_empty() => {
            Ok(subtype.trim().to_ascii_lowercase())
        }
        _ => Err(SubscriptionError::MalformedContentType(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!--
  A static feed; the self link is the topic to subscribe to.
-->
<feed xmlns="http://www.w3.org/2005/Atom">
  <link rel="hub" href="http://pubsubhubbub.appspot.com"/>
  <link rel="self" href="https://www.youtube.com/xml/feeds/videos.xml" />
  <title>YouTube video feed</title>
</feed>"#;

    #[test]
    fn test_find_hub_in_atom_feed() {
        assert_eq!(
            find_hub_link(ATOM).as_deref(),
            Some("http://pubsubhubbub.appspot.com")
        );
    }

    #[test]
    fn test_first_hub_link_wins_across_other_elements() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <link rel="self" href="https://example.com/feed"/>
  <title>Interleaved</title>
  <link rel="hub" href="https://first.example.com/hub"/>
  <updated>2020-01-01T00:00:00Z</updated>
  <link rel="hub" href="https://second.example.com/hub"/>
</feed>"#;

        assert_eq!(
            find_hub_link(xml).as_deref(),
            Some("https://first.example.com/hub")
        );
    }

    #[test]
    fn test_unknown_elements_are_ignored() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:yt="http://www.youtube.com/xml/schemas/2015">
  <yt:channelId>UC123</yt:channelId>
  <author><name>Someone</name><uri>https://example.com</uri></author>
  <entry><id>1</id><link rel="alternate" href="https://example.com/1"/></entry>
  <link rel="hub" href="https://hub.example.com/"/>
</feed>"#;

        assert_eq!(find_hub_link(xml).as_deref(), Some("https://hub.example.com/"));
    }

    #[rstest]
    #[case::no_links("<feed><title>none</title></feed>")]
    #[case::no_hub_rel(r#"<feed><link rel="self" href="https://example.com/feed"/></feed>"#)]
    #[case::hub_without_href(r#"<feed><link rel="hub"/></feed>"#)]
    #[case::malformed("<feed><link rel=\"hub\" href=")]
    #[case::not_xml("this is not xml at all")]
    fn test_documents_without_hub(#[case] xml: &str) {
        assert_eq!(find_hub_link(xml), None);
    }

    #[rstest]
    #[case("text/xml", "xml")]
    #[case("application/xml; charset=utf-8", "xml")]
    #[case("TEXT/XML", "xml")]
    #[case("application/atom+xml", "atom+xml")]
    #[case("text/html;charset=UTF-8", "html")]
    fn test_media_subtype(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(media_subtype(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("xml")]
    #[case("text/")]
    #[case("/xml")]
    fn test_malformed_media_types(#[case] raw: &str) {
        assert!(matches!(
            media_subtype(raw),
            Err(SubscriptionError::MalformedContentType(_))
        ));
    }
}
