use quick_xml::events::Event;
use quick_xml::Reader;

use super::error::ParseError;

/// The fields of one `<item>` that decide whether it changed between runs.
///
/// Values are kept exactly as they appear in the feed (after entity
/// unescaping). `pub_date` is never parsed: two spellings of the same instant
/// are different values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Episode {
    pub guid: String,
    pub title: String,
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Guid,
    Title,
    PubDate,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"guid" => Some(Field::Guid),
            b"title" => Some(Field::Title),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }
}

/// Fields collected so far for the item being read. `None` means the
/// element has not been seen; only the first occurrence of each is used.
#[derive(Debug, Default)]
struct PartialEpisode {
    guid: Option<String>,
    title: Option<String>,
    pub_date: Option<String>,
}

impl PartialEpisode {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Guid => &mut self.guid,
            Field::Title => &mut self.title,
            Field::PubDate => &mut self.pub_date,
        }
    }

    fn has(&self, field: Field) -> bool {
        match field {
            Field::Guid => self.guid.is_some(),
            Field::Title => self.title.is_some(),
            Field::PubDate => self.pub_date.is_some(),
        }
    }

    fn finish(self) -> Episode {
        Episode {
            guid: self.guid.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            pub_date: self.pub_date.unwrap_or_default(),
        }
    }
}

enum Scope {
    Root,
    Channel,
    Item,
    Field(Field),
    Other,
}

#[derive(Default)]
struct Extractor {
    stack: Vec<Scope>,
    episodes: Vec<Episode>,
    current: Option<PartialEpisode>,
    seen_root: bool,
    seen_channel: bool,
}

impl Extractor {
    fn open(&mut self, name: &[u8]) -> Result<Scope, ParseError> {
        let scope = match self.stack.last() {
            None if self.seen_root => return Err(ParseError::OutsideRoot),
            None => {
                self.seen_root = true;
                Scope::Root
            }
            Some(Scope::Root) if !self.seen_channel && name == b"channel" => {
                self.seen_channel = true;
                Scope::Channel
            }
            Some(Scope::Channel) if name == b"item" => {
                self.current = Some(PartialEpisode::default());
                Scope::Item
            }
            Some(Scope::Item) => match (Field::from_name(name), self.current.as_mut()) {
                (Some(field), Some(partial)) if !partial.has(field) => {
                    *partial.slot(field) = Some(String::new());
                    Scope::Field(field)
                }
                _ => Scope::Other,
            },
            Some(_) => Scope::Other,
        };
        Ok(scope)
    }

    fn close(&mut self, scope: Scope) {
        if let Scope::Item = scope {
            if let Some(partial) = self.current.take() {
                self.episodes.push(partial.finish());
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let (Some(Scope::Field(field)), Some(partial)) = (self.stack.last(), self.current.as_mut())
        {
            if let Some(value) = partial.slot(*field) {
                value.push_str(text);
            }
        }
    }

    fn finish(self) -> Result<Vec<Episode>, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::Truncated(self.stack.len()));
        }
        if !self.seen_root {
            return Err(ParseError::NoRoot);
        }
        if !self.seen_channel {
            return Err(ParseError::MissingChannel);
        }
        Ok(self.episodes)
    }
}

/// Reads the episodes of a feed document in document order.
///
/// Only direct `<item>` children of the root's first `<channel>` count, and
/// only their direct `<guid>`, `<title>` and `<pubDate>` children are read.
/// Missing fields become empty strings; a missing field is never an error.
///
/// # Errors
///
/// Returns [`ParseError`] when the document is not well-formed XML or has
/// no `<channel>`.
pub fn extract_episodes(xml: &str) -> Result<Vec<Episode>, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut extractor = Extractor::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ParseError::xml(reader.error_position() as u64, e))?;

        match event {
            Event::Start(e) => {
                let scope = extractor.open(e.name().as_ref())?;
                extractor.stack.push(scope);
            }
            Event::Empty(e) => {
                let scope = extractor.open(e.name().as_ref())?;
                extractor.close(scope);
            }
            Event::End(_) => match extractor.stack.pop() {
                Some(scope) => extractor.close(scope),
                None => return Err(ParseError::OutsideRoot),
            },
            Event::Text(e) => {
                if extractor.stack.is_empty() {
                    if !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(ParseError::OutsideRoot);
                    }
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|err| ParseError::xml(reader.buffer_position() as u64, err))?;
                extractor.text(&text);
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|err| ParseError::xml(reader.buffer_position() as u64, err))?;
                extractor.text(text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    extractor.finish()
}
