//! Serialization of the merged timeline into a podcast RSS document.
//!
//! Output is a complete RSS 2.0 document with the iTunes and content
//! namespaces, indented, returned as one string. The document contains
//! no build timestamp: identical inputs on the same day must serialize
//! byte-identically.

use crate::config::Config;
use crate::merge::MergedEpisode;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

/// Channel title used when no `FEED_TITLE` is configured.
pub const DEFAULT_TITLE: &str = "My Combined Podcast Feed";
const CHANNEL_DESCRIPTION: &str = "A combined feed of all my favorite podcasts";
const CHANNEL_AUTHOR: &str = "RSS Feed Combiner";
const GENERATOR: &str = concat!("feedmux ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to serialize feed document: {0}")]
    Write(#[from] std::io::Error),
    #[error("Serialized feed document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Renders the combined feed document for the given channel settings and
/// numbered episode sequence. An empty sequence produces a valid document
/// with an empty channel.
pub fn build_document(config: &Config, episodes: &[MergedEpisode]) -> Result<String, BuildError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:itunes", ITUNES_NS));
    rss.push_attribute(("xmlns:content", CONTENT_NS));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_channel_meta(&mut writer, config)?;
    for episode in episodes {
        write_item(&mut writer, episode)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_channel_meta(writer: &mut Writer<Vec<u8>>, config: &Config) -> Result<(), BuildError> {
    let title = config.title.as_deref().unwrap_or(DEFAULT_TITLE);
    let site_url = config.site_url.as_deref();

    text_element(writer, "title", title)?;
    text_element(writer, "description", CHANNEL_DESCRIPTION)?;
    if let Some(url) = site_url {
        text_element(writer, "link", url)?;
    }
    text_element(writer, "generator", GENERATOR)?;
    text_element(writer, "language", "en")?;

    if let Some(image_url) = config.image_url.as_deref() {
        writer.write_event(Event::Start(BytesStart::new("image")))?;
        text_element(writer, "url", image_url)?;
        text_element(writer, "title", title)?;
        text_element(writer, "link", site_url.unwrap_or(""))?;
        writer.write_event(Event::End(BytesEnd::new("image")))?;
    }

    text_element(writer, "itunes:author", CHANNEL_AUTHOR)?;
    text_element(writer, "itunes:explicit", "false")?;
    text_element(writer, "itunes:type", "episodic")?;
    writer
        .create_element("itunes:category")
        .with_attribute(("text", "Technology"))
        .write_empty()?;
    if let Some(image_url) = config.image_url.as_deref() {
        writer
            .create_element("itunes:image")
            .with_attribute(("href", image_url))
            .write_empty()?;
    }
    Ok(())
}

fn write_item(writer: &mut Writer<Vec<u8>>, episode: &MergedEpisode) -> Result<(), BuildError> {
    let item = &episode.item;
    let title = format!("{} - {}", item.title, episode.feed_title);
    let description = item
        .description
        .as_deref()
        .or(item.summary.as_deref())
        .unwrap_or("");
    let link = item.link.as_deref().unwrap_or("");
    let (guid, is_permalink) = match &item.guid {
        Some(guid) if !guid.value.is_empty() => (guid.value.as_str(), guid.is_permalink),
        _ => (link, false),
    };

    writer.write_event(Event::Start(BytesStart::new("item")))?;
    text_element(writer, "title", &title)?;
    text_element(writer, "description", description)?;
    text_element(writer, "link", link)?;
    writer
        .create_element("guid")
        .with_attribute(("isPermaLink", if is_permalink { "true" } else { "false" }))
        .write_text_content(BytesText::new(guid))?;
    text_element(writer, "pubDate", &item.sort_date.to_rfc2822())?;
    if let Some(enclosure) = &item.enclosure {
        writer
            .create_element("enclosure")
            .with_attribute(("url", enclosure.url.as_str()))
            .with_attribute(("type", enclosure.mime_type.as_str()))
            .with_attribute(("length", enclosure.length.as_str()))
            .write_empty()?;
    }
    text_element(writer, "itunes:title", &title)?;
    text_element(writer, "itunes:duration", item.duration.as_deref().unwrap_or(""))?;
    text_element(writer, "itunes:summary", description)?;
    text_element(
        writer,
        "itunes:episodeType",
        item.episode_type.as_deref().unwrap_or("full"),
    )?;
    text_element(
        writer,
        "itunes:explicit",
        item.explicit.as_deref().unwrap_or("false"),
    )?;
    text_element(writer, "itunes:season", &episode.season.to_string())?;
    text_element(writer, "itunes:episode", &episode.episode.to_string())?;
    text_element(writer, "pubDateOriginal", &item.original_date.to_rfc2822())?;
    if let Some(image) = item.image.as_deref().or(episode.feed_image.as_deref()) {
        writer
            .create_element("itunes:image")
            .with_attribute(("href", image))
            .write_empty()?;
    }
    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), BuildError> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}
