//! RSS/iTunes podcast dialect parsing.
//!
//! Upstream feeds disagree on structure: `guid` is sometimes a bare
//! scalar and sometimes carries an `isPermaLink` attribute, channel
//! artwork is `itunes:image@href` in one feed and a nested
//! `<image><url>` block in the next. Everything dialect-specific is
//! flattened here into one canonical shape so the merge step never sees
//! a quirk.
//!
//! Only the subset of RSS 2.0 and iTunes podcast elements the combined
//! feed actually emits is extracted; unknown elements are skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid XML attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("Document has no <channel> element")]
    MissingChannel,
}

/// `<guid>` value with its permalink flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guid {
    pub value: String,
    pub is_permalink: bool,
}

/// `<enclosure>` attributes, passed through to the combined feed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    pub length: String,
}

/// One upstream item in canonical form. Optional fields are `None` when
/// the element is absent or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: Option<String>,
    pub guid: Option<Guid>,
    pub description: Option<String>,
    /// `itunes:summary`, the description fallback.
    pub summary: Option<String>,
    /// Raw `pubDate` text; date parsing happens during normalization.
    pub pub_date: Option<String>,
    pub enclosure: Option<Enclosure>,
    pub duration: Option<String>,
    /// Item-level `itunes:image@href`.
    pub image: Option<String>,
    pub explicit: Option<String>,
    pub episode_type: Option<String>,
}

/// Parsed upstream channel: title, artwork, and items in document order.
#[derive(Debug, Clone, Default)]
pub struct ParsedChannel {
    pub title: String,
    /// `itunes:image@href` preferred, `<image><url>` as fallback.
    pub image: Option<String>,
    pub items: Vec<RawItem>,
}

/// Leaf element whose text content is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ChannelTitle,
    ChannelImageUrl,
    Title,
    Link,
    Guid,
    Description,
    Summary,
    PubDate,
    Duration,
    Explicit,
    EpisodeType,
}

/// Parses an RSS document into its canonical channel representation.
pub fn parse_channel(bytes: &[u8]) -> Result<ParsedChannel, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut state = ChannelState::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => state.open(&e, false)?,
            Event::Empty(e) => state.open(&e, true)?,
            Event::End(e) => state.close(e.name().as_ref()),
            Event::Text(t) => state.text(&t.unescape()?),
            Event::CData(t) => {
                let raw = t.into_inner();
                state.text(&String::from_utf8_lossy(&raw));
            }
            _ => {}
        }
        buf.clear();
    }

    if !state.saw_channel {
        return Err(ParseError::MissingChannel);
    }

    let mut channel = state.channel;
    channel.image = state.itunes_image.or(state.rss_image_url);
    Ok(channel)
}

#[derive(Default)]
struct ChannelState {
    channel: ParsedChannel,
    saw_channel: bool,
    in_image_block: bool,
    item: Option<RawItem>,
    field: Option<Field>,
    text_buf: String,
    itunes_image: Option<String>,
    rss_image_url: Option<String>,
}

impl ChannelState {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), ParseError> {
        let name = e.name();
        let name = name.as_ref();
        match name {
            b"channel" => self.saw_channel = true,
            b"item" => self.item = Some(RawItem::default()),
            b"image" if self.item.is_none() => self.in_image_block = !empty,
            b"itunes:image" => {
                let href = attribute(e, "href")?;
                match &mut self.item {
                    Some(item) => item.image = href.filter(|h| !h.is_empty()),
                    None => self.itunes_image = href.filter(|h| !h.is_empty()),
                }
            }
            b"enclosure" => {
                if let Some(item) = &mut self.item {
                    item.enclosure = Some(Enclosure {
                        url: attribute(e, "url")?.unwrap_or_default(),
                        mime_type: attribute(e, "type")?.unwrap_or_default(),
                        length: attribute(e, "length")?.unwrap_or_default(),
                    });
                }
            }
            b"guid" => {
                if let Some(item) = &mut self.item {
                    item.guid = Some(Guid {
                        value: String::new(),
                        is_permalink: attribute(e, "isPermaLink")?.as_deref() == Some("true"),
                    });
                    self.begin(Field::Guid, empty);
                }
            }
            _ => {
                if let Some(field) = self.field_for(name) {
                    self.begin(field, empty);
                }
            }
        }
        Ok(())
    }

    fn field_for(&self, name: &[u8]) -> Option<Field> {
        if self.item.is_some() {
            match name {
                b"title" => Some(Field::Title),
                b"link" => Some(Field::Link),
                b"description" => Some(Field::Description),
                b"itunes:summary" => Some(Field::Summary),
                b"pubDate" => Some(Field::PubDate),
                b"itunes:duration" => Some(Field::Duration),
                b"itunes:explicit" => Some(Field::Explicit),
                b"itunes:episodeType" => Some(Field::EpisodeType),
                _ => None,
            }
        } else if self.in_image_block {
            match name {
                b"url" => Some(Field::ChannelImageUrl),
                _ => None,
            }
        } else {
            match name {
                b"title" if self.saw_channel => Some(Field::ChannelTitle),
                _ => None,
            }
        }
    }

    fn begin(&mut self, field: Field, empty: bool) {
        if empty {
            // Self-closing leaf carries no text; commit the empty value.
            self.text_buf.clear();
            self.field = Some(field);
            self.commit();
        } else {
            self.field = Some(field);
            self.text_buf.clear();
        }
    }

    fn text(&mut self, content: &str) {
        if self.field.is_some() {
            self.text_buf.push_str(content);
        }
    }

    fn close(&mut self, name: &[u8]) {
        if self.field.is_some() {
            self.commit();
        }
        match name {
            b"item" => {
                if let Some(item) = self.item.take() {
                    self.channel.items.push(item);
                }
            }
            b"image" => self.in_image_block = false,
            _ => {}
        }
    }

    fn commit(&mut self) {
        let Some(field) = self.field.take() else {
            return;
        };
        let value = std::mem::take(&mut self.text_buf);
        let opt = || if value.is_empty() { None } else { Some(value.clone()) };

        match field {
            Field::ChannelTitle => {
                if self.channel.title.is_empty() {
                    self.channel.title = value.clone();
                }
            }
            Field::ChannelImageUrl => self.rss_image_url = opt(),
            _ => {
                let Some(item) = &mut self.item else { return };
                match field {
                    Field::Title => item.title = value.clone(),
                    Field::Link => item.link = opt(),
                    Field::Guid => {
                        if let Some(guid) = &mut item.guid {
                            guid.value = value.clone();
                        }
                    }
                    Field::Description => item.description = opt(),
                    Field::Summary => item.summary = opt(),
                    Field::PubDate => item.pub_date = opt(),
                    Field::Duration => item.duration = opt(),
                    Field::Explicit => item.explicit = opt(),
                    Field::EpisodeType => item.episode_type = opt(),
                    Field::ChannelTitle | Field::ChannelImageUrl => {}
                }
            }
        }
    }
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ParseError> {
    Ok(match e.try_get_attribute(name)? {
        Some(attr) => Some(attr.unescape_value()?.into_owned()),
        None => None,
    })
}
