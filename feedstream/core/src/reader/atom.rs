//! Atom Entry Reader
//!
//! Pulls `<entry>` elements out of an Atom document one at a time using
//! `quick_xml`'s streaming reader. Only the bytes of the current entry are
//! held in memory; the cursor moves forward only.
//!
//! # Layout Handled
//!
//! ```text
//! <feed>
//!   <id/> <title/> <updated/>          -> FeedMetadata
//!   <link rel="next" href="..."/>      -> next_link() (may follow the entries)
//!   <entry>
//!     <id/> <title/> <updated/> <author><name/></author>
//!     <link rel=".." href=".."/> <category term=".."/>
//!     <content type="..">
//!       <m:properties> <d:Name>value</d:Name> ... </m:properties>
//!     </content>
//!   </entry>
//! </feed>
//! ```
//!
//! Namespace prefixes are ignored; elements are matched by local name.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::RecordReader;
use crate::error::DecodeError;

// ============================================================================
// Records
// ============================================================================

/// A link element (`<link rel=".." href=".."/>`)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomLink {
    /// Link relation (`self`, `edit`, `next`, ...)
    pub rel: Option<String>,
    /// Target address
    pub href: String,
}

/// One parsed `<entry>`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomEntry {
    /// Entry identifier
    pub id: Option<String>,
    /// Entry title
    pub title: Option<String>,
    /// Last update timestamp, as written in the document
    pub updated: Option<String>,
    /// Author name
    pub author: Option<String>,
    /// Links declared on the entry
    pub links: Vec<AtomLink>,
    /// Category terms
    pub categories: Vec<String>,
    /// `type` attribute of `<content>`
    pub content_type: Option<String>,
    /// Text content, when `<content>` has no child elements
    pub content: Option<String>,
    /// Leaf elements under `<properties>`, keyed by local name
    pub properties: BTreeMap<String, String>,
}

impl AtomEntry {
    /// Get a property value
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Parse a property into `T`
    ///
    /// Missing properties are `Ok(None)`; unparsable ones are
    /// `DecodeError::InvalidRecord`.
    pub fn property_as<T>(&self, name: &str) -> Result<Option<T>, DecodeError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.property(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    DecodeError::InvalidRecord(format!("property {name}={raw:?}: {e}"))
                })
            })
            .transpose()
    }

    /// Parse `updated` as an RFC 3339 timestamp
    pub fn updated_at(&self) -> Result<Option<DateTime<FixedOffset>>, DecodeError> {
        self.updated
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| DecodeError::InvalidRecord(format!("updated={raw:?}: {e}")))
            })
            .transpose()
    }

    /// Find the first link with the given relation
    #[must_use]
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel.as_deref() == Some(rel))
            .map(|l| l.href.as_str())
    }
}

/// Feed-level header fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMetadata {
    /// Feed identifier
    pub id: Option<String>,
    /// Feed title
    pub title: Option<String>,
    /// Feed update timestamp
    pub updated: Option<String>,
}

// ============================================================================
// Reader
// ============================================================================

/// Owned view of one parser event
enum Node {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Close(String),
    Eof,
    Other,
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn read_attrs(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, String> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = local_name(attr.key.local_name().as_ref());
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        attrs.push((key, value.into_owned()));
    }
    Ok(attrs)
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn to_node(event: Event<'_>) -> Result<Node, String> {
    Ok(match event {
        Event::Start(e) => Node::Open {
            name: local_name(e.local_name().as_ref()),
            attrs: read_attrs(&e)?,
        },
        Event::Empty(e) => Node::Empty {
            name: local_name(e.local_name().as_ref()),
            attrs: read_attrs(&e)?,
        },
        Event::Text(t) => Node::Text(t.unescape().map_err(|e| e.to_string())?.into_owned()),
        Event::CData(c) => Node::Text(String::from_utf8_lossy(&c.into_inner()).into_owned()),
        Event::End(e) => Node::Close(local_name(e.local_name().as_ref())),
        Event::Eof => Node::Eof,
        _ => Node::Other,
    })
}

fn link_from(attrs: &[(String, String)]) -> Option<AtomLink> {
    attr(attrs, "href").map(|href| AtomLink {
        rel: attr(attrs, "rel").map(str::to_owned),
        href: href.to_owned(),
    })
}

/// Streaming reader yielding one [`AtomEntry`] per `<entry>` element
pub struct AtomEntryReader<B> {
    reader: Reader<B>,
    buf: Vec<u8>,
    /// Elements open outside any entry, outermost first
    open: Vec<String>,
    /// Text collected for the innermost header element
    text: String,
    metadata: FeedMetadata,
    next_link: Option<String>,
    entries_read: u64,
    finished: bool,
}

impl<B: BufRead> AtomEntryReader<B> {
    /// Create a reader positioned at the start of an Atom document
    pub fn new(source: B) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            open: Vec::new(),
            text: String::new(),
            metadata: FeedMetadata::default(),
            next_link: None,
            entries_read: 0,
            finished: false,
        }
    }

    /// Feed header fields seen so far
    #[must_use]
    pub fn metadata(&self) -> &FeedMetadata {
        &self.metadata
    }

    /// Feed-level `next` link, once the parser has passed it
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Number of entries yielded so far
    #[must_use]
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Whether the end of the document was reached
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn next_node(&mut self) -> Result<Node, DecodeError> {
        self.buf.clear();
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(e) => {
                return Err(DecodeError::Xml {
                    position: self.reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
        };
        to_node(event).map_err(|message| DecodeError::Xml {
            position: self.reader.buffer_position() as u64,
            message,
        })
    }

    fn feed_link(&mut self, attrs: &[(String, String)]) {
        if attr(attrs, "rel") == Some("next") {
            self.next_link = attr(attrs, "href").map(str::to_owned);
        }
    }

    /// Read the remainder of an entry whose start tag was just consumed
    fn read_entry(&mut self) -> Result<AtomEntry, DecodeError> {
        let mut entry = AtomEntry::default();
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();

        loop {
            match self.next_node()? {
                Node::Open { name, attrs } => {
                    if path.is_empty() {
                        entry_child(&mut entry, &name, &attrs);
                    }
                    path.push(name);
                    text.clear();
                }
                Node::Empty { name, attrs } => {
                    if path.is_empty() {
                        entry_child(&mut entry, &name, &attrs);
                    } else if in_properties(&path) {
                        entry.properties.insert(name, String::new());
                    }
                }
                Node::Text(t) => text.push_str(&t),
                Node::Close(name) => {
                    if path.is_empty() {
                        // </entry>
                        return Ok(entry);
                    }
                    let value = std::mem::take(&mut text);
                    let parent: Vec<&str> = path[..path.len() - 1]
                        .iter()
                        .map(String::as_str)
                        .collect();
                    match (parent.as_slice(), name.as_str()) {
                        ([], "id") => entry.id = Some(value),
                        ([], "title") => entry.title = Some(value),
                        ([], "updated") => entry.updated = Some(value),
                        (["author"], "name") => entry.author = Some(value),
                        ([], "content") if !value.is_empty() => entry.content = Some(value),
                        (["content", "properties"] | ["properties"], _) => {
                            entry.properties.insert(name, value);
                        }
                        _ => {}
                    }
                    path.pop();
                }
                Node::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: path.last().cloned().unwrap_or_else(|| "entry".to_string()),
                    })
                }
                Node::Other => {}
            }
        }
    }

    /// Advance to the next entry, collecting header fields on the way
    pub fn next_entry(&mut self) -> Result<Option<AtomEntry>, DecodeError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.next_node()? {
                Node::Open { name, attrs } => {
                    if name == "entry" {
                        let entry = self.read_entry()?;
                        self.entries_read += 1;
                        return Ok(Some(entry));
                    }
                    if self.open.len() == 1 && name == "link" {
                        self.feed_link(&attrs);
                    }
                    self.open.push(name);
                    self.text.clear();
                }
                Node::Empty { name, attrs } => {
                    if name == "entry" {
                        self.entries_read += 1;
                        return Ok(Some(AtomEntry::default()));
                    }
                    if self.open.len() == 1 && name == "link" {
                        self.feed_link(&attrs);
                    }
                }
                Node::Text(t) => self.text.push_str(&t),
                Node::Close(name) => {
                    if self.open.len() == 2 {
                        let value = std::mem::take(&mut self.text);
                        match name.as_str() {
                            "id" => self.metadata.id = Some(value),
                            "title" => self.metadata.title = Some(value),
                            "updated" => self.metadata.updated = Some(value),
                            _ => {}
                        }
                    }
                    self.open.pop();
                    self.text.clear();
                }
                Node::Eof => {
                    if let Some(element) = self.open.last() {
                        return Err(DecodeError::UnexpectedEof {
                            element: element.clone(),
                        });
                    }
                    self.finished = true;
                    return Ok(None);
                }
                Node::Other => {}
            }
        }
    }
}

fn in_properties(path: &[String]) -> bool {
    matches!(
        path.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
        ["content", "properties"] | ["properties"]
    )
}

/// Apply a direct child of `<entry>` that carries its data in attributes
fn entry_child(entry: &mut AtomEntry, name: &str, attrs: &[(String, String)]) {
    match name {
        "link" => entry.links.extend(link_from(attrs)),
        "category" => entry.categories.extend(attr(attrs, "term").map(str::to_owned)),
        "content" => entry.content_type = attr(attrs, "type").map(str::to_owned),
        _ => {}
    }
}

impl<B: BufRead + Send + 'static> RecordReader for AtomEntryReader<B> {
    type Record = AtomEntry;

    fn read_next(&mut self) -> Result<Option<AtomEntry>, DecodeError> {
        self.next_entry()
    }
}
