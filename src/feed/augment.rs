//! Streaming rewrite of a feed into the shape Spotify for Podcasters expects.
//!
//! The document is copied event by event. Elements the directory requires are
//! appended just before the closing tag of their parent, once the parent's
//! existing children are known, so nothing already present is touched.
//!
//! Namespace resolution follows the document as written out, not as read:
//! the root's declarations may be rebound, and an element counts as Spotify
//! only if it is in the Spotify namespace in the output.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use super::error::ParseError;
use super::namespaces::{self, NAMESPACES, SPOTIFY};
use crate::config::PlatformConfig;

/// Spotify children already present on the channel.
#[derive(Debug, Default)]
struct ChannelTags {
    email: bool,
    limit: bool,
    country: bool,
    items: usize,
}

impl ChannelTags {
    fn mark(&mut self, local_name: &[u8]) {
        match local_name {
            b"email" => self.email = true,
            b"limit" => self.limit = true,
            b"countryOfOrigin" => self.country = true,
            _ => {}
        }
    }
}

/// `xmlns` declarations in effect in the output, one frame per open element.
#[derive(Debug, Default)]
struct Bindings {
    frames: Vec<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl Bindings {
    fn push(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let mut frame = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| ParseError::Attribute(err.to_string()))?;
            let key = attr.key.as_ref();
            let prefix = match key.strip_prefix(b"xmlns") {
                Some(b"") => &[][..],
                Some(rest) => match rest.strip_prefix(b":") {
                    Some(prefix) => prefix,
                    None => continue,
                },
                None => continue,
            };
            frame.push((prefix.to_vec(), attr.value.into_owned()));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Innermost URI bound to `prefix`; the empty prefix is the default namespace.
    fn resolve(&self, prefix: &[u8]) -> Option<&[u8]> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(bound, _)| bound.as_slice() == prefix)
            .map(|(_, uri)| uri.as_slice())
    }

    fn is_spotify(&self, name: QName<'_>) -> bool {
        let prefix = name.prefix().map(|p| p.into_inner()).unwrap_or_default();
        self.resolve(prefix) == Some(SPOTIFY.uri.as_bytes())
    }
}

enum Scope {
    Root,
    Channel(ChannelTags),
    Item { position: usize, has_order: bool },
    Other,
}

struct Augmenter<'p> {
    platform: &'p PlatformConfig,
    writer: Writer<Cursor<Vec<u8>>>,
    stack: Vec<Scope>,
    bindings: Bindings,
    seen_root: bool,
    seen_channel: bool,
}

impl<'p> Augmenter<'p> {
    fn new(platform: &'p PlatformConfig) -> Result<Self, ParseError> {
        let mut augmenter = Self {
            platform,
            writer: Writer::new(Cursor::new(Vec::new())),
            stack: Vec::new(),
            bindings: Bindings::default(),
            seen_root: false,
            seen_channel: false,
        };
        // The input declaration (if any) is dropped; output is always UTF-8.
        augmenter.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        augmenter.write(Event::Text(BytesText::new("\n")))?;
        Ok(augmenter)
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        self.writer
            .write_event(event)
            .map_err(|e| ParseError::Write(e.to_string()))
    }

    /// Writes `<spotify:local_name>text</spotify:local_name>`, declaring the
    /// prefix on the element itself when an enclosing scope binds it elsewhere.
    fn write_spotify_element(&mut self, local_name: &str, text: &str) -> Result<(), ParseError> {
        let name = format!("{}:{}", SPOTIFY.prefix, local_name);
        let mut start = BytesStart::new(name.as_str());
        if self.bindings.resolve(SPOTIFY.prefix.as_bytes()) != Some(SPOTIFY.uri.as_bytes()) {
            start.push_attribute((SPOTIFY.attribute_name().as_str(), SPOTIFY.uri));
        }
        self.write(Event::Start(start))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.write(Event::End(BytesEnd::new(name.as_str())))
    }

    /// Classifies a new element against its parent and records what the
    /// parent already contains.
    fn open(&mut self, e: &BytesStart<'_>, in_spotify: bool) -> Result<Scope, ParseError> {
        let scope = match self.stack.last_mut() {
            None if self.seen_root => return Err(ParseError::OutsideRoot),
            None => {
                self.seen_root = true;
                Scope::Root
            }
            Some(Scope::Root) if !self.seen_channel && e.name().as_ref() == b"channel" => {
                self.seen_channel = true;
                Scope::Channel(ChannelTags::default())
            }
            Some(Scope::Channel(tags)) => {
                if e.name().as_ref() == b"item" {
                    tags.items += 1;
                    Scope::Item {
                        position: tags.items,
                        has_order: false,
                    }
                } else {
                    if in_spotify {
                        tags.mark(e.local_name().as_ref());
                    }
                    Scope::Other
                }
            }
            Some(Scope::Item { has_order, .. }) => {
                if in_spotify && e.local_name().as_ref() == b"order" {
                    *has_order = true;
                }
                Scope::Other
            }
            Some(_) => Scope::Other,
        };
        Ok(scope)
    }

    /// Emits whatever the closing element is missing, then its end tag.
    fn close(&mut self, scope: Scope, end: BytesEnd<'_>) -> Result<(), ParseError> {
        match scope {
            Scope::Channel(tags) => {
                let platform = self.platform;
                if !tags.email && !platform.email.is_empty() {
                    self.write_spotify_element("email", &platform.email)?;
                }
                if !tags.limit {
                    self.write_spotify_element("limit", &platform.limit.to_string())?;
                }
                if !tags.country {
                    self.write_spotify_element("countryOfOrigin", &platform.country_of_origin)?;
                }
            }
            Scope::Item {
                position,
                has_order: false,
            } => {
                self.write_spotify_element("order", &position.to_string())?;
            }
            _ => {}
        }
        self.write(Event::End(end))
    }

    /// Copies the root element, guaranteeing every namespace in the table is
    /// declared with the table's URI.
    fn root_with_namespaces(e: &BytesStart<'_>) -> Result<BytesStart<'static>, ParseError> {
        let mut root = e.to_owned();
        root.clear_attributes();
        let mut declared: Vec<&'static str> = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(|err| ParseError::Attribute(err.to_string()))?;
            let known = attr
                .key
                .as_ref()
                .strip_prefix(b"xmlns:")
                .and_then(|prefix| std::str::from_utf8(prefix).ok())
                .and_then(namespaces::by_prefix);

            match known {
                Some(ns) if attr.value.as_ref() != ns.uri.as_bytes() => {
                    tracing::warn!(
                        prefix = ns.prefix,
                        found = %String::from_utf8_lossy(&attr.value),
                        expected = ns.uri,
                        "Rebinding namespace prefix on feed root"
                    );
                    declared.push(ns.prefix);
                    root.push_attribute((ns.attribute_name().as_str(), ns.uri));
                }
                Some(ns) => {
                    declared.push(ns.prefix);
                    root.push_attribute(attr);
                }
                None => root.push_attribute(attr),
            }
        }

        for ns in NAMESPACES.iter().filter(|ns| !declared.contains(&ns.prefix)) {
            root.push_attribute((ns.attribute_name().as_str(), ns.uri));
        }
        Ok(root)
    }

    /// The start tag as it will be written, with its bindings pushed.
    fn enter<'a>(&mut self, e: BytesStart<'a>) -> Result<(BytesStart<'a>, Scope), ParseError> {
        let start = if self.stack.is_empty() && !self.seen_root {
            Self::root_with_namespaces(&e)?
        } else {
            e
        };
        self.bindings.push(&start)?;
        let in_spotify = self.bindings.is_spotify(start.name());
        let scope = self.open(&start, in_spotify)?;
        Ok((start, scope))
    }

    fn handle(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(e) => {
                let (start, scope) = self.enter(e)?;
                self.write(Event::Start(start))?;
                self.stack.push(scope);
            }
            Event::Empty(e) => {
                let (start, scope) = self.enter(e)?;
                match scope {
                    // Expanded so the required children have somewhere to go.
                    Scope::Channel(_) | Scope::Item { .. } => {
                        self.write(Event::Start(start.borrow()))?;
                        self.close(scope, start.to_end())?;
                    }
                    Scope::Root | Scope::Other => self.write(Event::Empty(start))?,
                }
                self.bindings.pop();
            }
            Event::End(e) => match self.stack.pop() {
                Some(scope) => {
                    self.close(scope, e)?;
                    self.bindings.pop();
                }
                None => return Err(ParseError::OutsideRoot),
            },
            Event::Text(e) if self.stack.is_empty() => {
                if !e.iter().all(u8::is_ascii_whitespace) {
                    return Err(ParseError::OutsideRoot);
                }
            }
            Event::Decl(_) | Event::Eof => {}
            other => self.write(other)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<String, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::Truncated(self.stack.len()));
        }
        if !self.seen_root {
            return Err(ParseError::NoRoot);
        }
        if !self.seen_channel {
            return Err(ParseError::MissingChannel);
        }
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| ParseError::Write(e.to_string()))
    }
}

/// Adds the Spotify-specific elements and namespace declarations to a feed.
///
/// - The channel gains `spotify:email` (only when configured),
///   `spotify:limit` and `spotify:countryOfOrigin` unless already present.
/// - Each `<item>` gains `spotify:order` holding its 1-based position,
///   unless it already has one. Existing markers are left as they are.
/// - The root element declares every namespace in [`NAMESPACES`].
/// - Output starts with `<?xml version="1.0" encoding="UTF-8"?>`.
///
/// Presence checks match on namespace URI, so a feed that binds the Spotify
/// namespace to another prefix is recognised. Inserted elements carry their
/// own `xmlns:spotify` where an enclosing element rebinds the prefix. Running
/// this on its own output returns the same document.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not well-formed or has no
/// `<channel>`. No partial output is produced.
pub fn augment(raw: &str, platform: &PlatformConfig) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(raw);
    let mut augmenter = Augmenter::new(platform)?;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(ParseError::xml(reader.error_position() as u64, e)),
        };
        if let Event::Eof = event {
            break;
        }
        augmenter.handle(event)?;
    }

    augmenter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::extract_episodes;
    use pretty_assertions::assert_eq;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
<channel>
<title>Show &amp; Tell</title>
<item><guid>a</guid><title>One</title></item>
<item><guid>b</guid><title>Two</title></item>
<item><guid>c</guid><title>Three</title></item>
</channel>
</rss>
"#;

    fn platform() -> PlatformConfig {
        PlatformConfig::default()
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_adds_channel_elements_and_orders() {
        let out = augment(FEED, &platform()).unwrap();

        assert_eq!(
            out,
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<rss version=\"2.0\" xmlns:itunes=\"http://www.itunes.com/dtds/podcast-1.0.dtd\"",
                " xmlns:content=\"http://purl.org/rss/1.0/modules/content/\"",
                " xmlns:wfw=\"http://wellformedweb.org/CommentAPI/\"",
                " xmlns:dc=\"http://purl.org/dc/elements/1.1/\"",
                " xmlns:atom=\"http://www.w3.org/2005/Atom\"",
                " xmlns:googleplay=\"http://www.google.com/schemas/play-podcasts/1.0\"",
                " xmlns:spotify=\"http://www.spotify.com/ns/rss\"",
                " xmlns:podcast=\"https://podcastindex.org/namespace/1.0\"",
                " xmlns:media=\"http://search.yahoo.com/mrss/\">\n",
                "<channel>\n",
                "<title>Show &amp; Tell</title>\n",
                "<item><guid>a</guid><title>One</title><spotify:order>1</spotify:order></item>\n",
                "<item><guid>b</guid><title>Two</title><spotify:order>2</spotify:order></item>\n",
                "<item><guid>c</guid><title>Three</title><spotify:order>3</spotify:order></item>\n",
                "<spotify:limit>100</spotify:limit>",
                "<spotify:countryOfOrigin>il</spotify:countryOfOrigin></channel>\n",
                "</rss>",
            )
        );
    }

    #[test]
    fn test_is_idempotent() {
        let once = augment(FEED, &platform()).unwrap();
        let twice = augment(&once, &platform()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(count(&twice, "<spotify:limit>"), 1);
        assert_eq!(count(&twice, "<spotify:countryOfOrigin>"), 1);
        assert_eq!(count(&twice, "<spotify:order>"), 3);
    }

    #[test]
    fn test_email_only_when_configured() {
        let without = augment(FEED, &platform()).unwrap();
        assert!(!without.contains("spotify:email"));

        let mut config = platform();
        config.email = "host@example.com".to_string();
        let with = augment(FEED, &config).unwrap();
        assert!(with.contains("<spotify:email>host@example.com</spotify:email>"));
        assert!(with.find("<spotify:email>") < with.find("<spotify:limit>"));
    }

    #[test]
    fn test_configured_values_are_used() {
        let config = PlatformConfig {
            email: String::new(),
            limit: 25,
            country_of_origin: "us".to_string(),
        };
        let out = augment(FEED, &config).unwrap();
        assert!(out.contains("<spotify:limit>25</spotify:limit>"));
        assert!(out.contains("<spotify:countryOfOrigin>us</spotify:countryOfOrigin>"));
    }

    #[test]
    fn test_existing_values_are_not_overwritten() {
        let feed = r#"<rss xmlns:spotify="http://www.spotify.com/ns/rss"><channel>
<spotify:limit>7</spotify:limit>
<spotify:countryOfOrigin>de</spotify:countryOfOrigin>
<item><spotify:order>9</spotify:order></item>
<item/>
</channel></rss>"#;

        let out = augment(feed, &platform()).unwrap();
        assert!(out.contains("<spotify:limit>7</spotify:limit>"));
        assert!(out.contains("<spotify:countryOfOrigin>de</spotify:countryOfOrigin>"));
        assert!(out.contains("<item><spotify:order>9</spotify:order></item>"));
        // Positions count every item, including ones that already had a marker.
        assert!(out.contains("<item><spotify:order>2</spotify:order></item>"));
        assert_eq!(count(&out, "<spotify:limit>"), 1);
        assert_eq!(count(&out, "<spotify:countryOfOrigin>"), 1);
    }

    #[test]
    fn test_existing_email_is_kept() {
        let feed = r#"<rss xmlns:spotify="http://www.spotify.com/ns/rss"><channel>
<spotify:email>owner@example.com</spotify:email>
</channel></rss>"#;
        let mut config = platform();
        config.email = "someone-else@example.com".to_string();

        let out = augment(feed, &config).unwrap();
        assert!(out.contains("<spotify:email>owner@example.com</spotify:email>"));
        assert!(!out.contains("someone-else@example.com"));
        assert_eq!(count(&out, "<spotify:email>"), 1);
    }

    #[test]
    fn test_root_rebinding_makes_existing_children_spotify() {
        let feed = r#"<rss xmlns:spotify="urn:wrong"><channel><spotify:limit>5</spotify:limit><item><spotify:order>9</spotify:order></item></channel></rss>"#;

        let out = augment(feed, &platform()).unwrap();
        assert!(!out.contains("urn:wrong"));
        assert_eq!(count(&out, "<spotify:limit>"), 1);
        assert_eq!(count(&out, "<spotify:order>"), 1);
        assert!(out.contains("<spotify:limit>5</spotify:limit>"));
        assert!(out.contains("<item><spotify:order>9</spotify:order></item>"));
        assert_eq!(count(&out, "<spotify:countryOfOrigin>"), 1);
        assert_eq!(augment(&out, &platform()).unwrap(), out);
    }

    #[test]
    fn test_nested_rebinding_gets_local_declaration() {
        let feed = r#"<rss><channel xmlns:spotify="urn:x"><spotify:limit>5</spotify:limit><item/></channel></rss>"#;

        let out = augment(feed, &platform()).unwrap();
        assert!(out.contains(r#"<channel xmlns:spotify="urn:x"><spotify:limit>5</spotify:limit>"#));
        assert!(out.contains(
            r#"<item><spotify:order xmlns:spotify="http://www.spotify.com/ns/rss">1</spotify:order></item>"#
        ));
        assert!(out.contains(
            r#"<spotify:limit xmlns:spotify="http://www.spotify.com/ns/rss">100</spotify:limit>"#
        ));
        assert!(out.contains(
            r#"<spotify:countryOfOrigin xmlns:spotify="http://www.spotify.com/ns/rss">il</spotify:countryOfOrigin></channel>"#
        ));
        assert_eq!(augment(&out, &platform()).unwrap(), out);
    }

    #[test]
    fn test_presence_matched_by_namespace_not_prefix() {
        let feed = r#"<rss xmlns:sp="http://www.spotify.com/ns/rss"><channel>
<sp:limit>50</sp:limit>
<item><sp:order>1</sp:order></item>
</channel></rss>"#;

        let out = augment(feed, &platform()).unwrap();
        assert!(!out.contains("<spotify:limit>"));
        assert!(!out.contains("<spotify:order>"));
        assert!(out.contains("<spotify:countryOfOrigin>il</spotify:countryOfOrigin>"));
    }

    #[test]
    fn test_same_local_name_in_other_namespace_does_not_count() {
        let feed = r#"<rss xmlns:x="urn:other"><channel>
<x:limit>5</x:limit>
<item><x:order>4</x:order></item>
</channel></rss>"#;

        let out = augment(feed, &platform()).unwrap();
        assert!(out.contains("<spotify:limit>100</spotify:limit>"));
        assert!(out.contains("<spotify:order>1</spotify:order>"));
    }

    #[test]
    fn test_order_follows_document_order() {
        let out = augment(FEED, &platform()).unwrap();
        let episodes = extract_episodes(&out).unwrap();
        let titles: Vec<_> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two", "Three"]);

        let one = out.find("<spotify:order>1<").unwrap();
        let two = out.find("<spotify:order>2<").unwrap();
        let three = out.find("<spotify:order>3<").unwrap();
        assert!(one < two && two < three);
    }

    #[test]
    fn test_rebinds_conflicting_prefix() {
        let feed = r#"<rss xmlns:spotify="urn:wrong"><channel/></rss>"#;
        let out = augment(feed, &platform()).unwrap();
        assert!(!out.contains("urn:wrong"));
        assert_eq!(count(&out, "xmlns:spotify="), 1);
        assert!(out.contains(r#"xmlns:spotify="http://www.spotify.com/ns/rss""#));
    }

    #[test]
    fn test_all_namespaces_declared_once() {
        let out = augment(FEED, &platform()).unwrap();
        for ns in NAMESPACES {
            let decl = format!("{}=\"{}\"", ns.attribute_name(), ns.uri);
            assert_eq!(count(&out, &decl), 1, "{} declared once", ns.prefix);
        }
    }

    #[test]
    fn test_self_closing_channel_is_expanded() {
        let out = augment("<rss><channel/></rss>", &platform()).unwrap();
        assert!(out.ends_with(
            "<channel><spotify:limit>100</spotify:limit><spotify:countryOfOrigin>il</spotify:countryOfOrigin></channel></rss>"
        ));
    }

    #[test]
    fn test_declaration_is_replaced() {
        let feed = "<?xml version='1.0' encoding='ISO-8859-1'?><rss><channel/></rss>";
        let out = augment(feed, &platform()).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss "));
        assert_eq!(count(&out, "<?xml"), 1);
    }

    #[test]
    fn test_preserves_cdata_and_comments() {
        let feed = "<rss><channel><!-- note --><item><description><![CDATA[<b>hi</b>]]></description></item></channel></rss>";
        let out = augment(feed, &platform()).unwrap();
        assert!(out.contains("<!-- note -->"));
        assert!(out.contains("<![CDATA[<b>hi</b>]]>"));
    }

    #[test]
    fn test_malformed_input_is_parse_error() {
        assert!(augment("<not valid xml", &platform()).is_err());
        assert!(matches!(
            augment("<rss><channel><item>", &platform()),
            Err(ParseError::Truncated(3))
        ));
        assert!(matches!(
            augment("<rss><item/></rss>", &platform()),
            Err(ParseError::MissingChannel)
        ));
        assert!(matches!(augment("", &platform()), Err(ParseError::NoRoot)));
    }
}
