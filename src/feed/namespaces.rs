//! Namespace declarations the published feed must always carry.
//!
//! Directory crawlers check the root element for these bindings even when the
//! visible content never uses a prefix, so the table is written out in full.

/// A `(prefix, URI)` binding declared on the root element as `xmlns:prefix="uri"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlNamespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

impl XmlNamespace {
    /// Attribute name used to declare this namespace, e.g. `xmlns:itunes`.
    pub fn attribute_name(&self) -> String {
        format!("xmlns:{}", self.prefix)
    }
}

/// Spotify for Podcasters namespace. Every element the augmenter inserts lives here.
pub const SPOTIFY: XmlNamespace = XmlNamespace {
    prefix: "spotify",
    uri: "http://www.spotify.com/ns/rss",
};

/// Declaration order on the output `<rss>` element.
pub const NAMESPACES: [XmlNamespace; 9] = [
    XmlNamespace {
        prefix: "content",
        uri: "http://purl.org/rss/1.0/modules/content/",
    },
    XmlNamespace {
        prefix: "wfw",
        uri: "http://wellformedweb.org/CommentAPI/",
    },
    XmlNamespace {
        prefix: "dc",
        uri: "http://purl.org/dc/elements/1.1/",
    },
    XmlNamespace {
        prefix: "atom",
        uri: "http://www.w3.org/2005/Atom",
    },
    XmlNamespace {
        prefix: "itunes",
        uri: "http://www.itunes.com/dtds/podcast-1.0.dtd",
    },
    XmlNamespace {
        prefix: "googleplay",
        uri: "http://www.google.com/schemas/play-podcasts/1.0",
    },
    SPOTIFY,
    XmlNamespace {
        prefix: "podcast",
        uri: "https://podcastindex.org/namespace/1.0",
    },
    XmlNamespace {
        prefix: "media",
        uri: "http://search.yahoo.com/mrss/",
    },
];

/// Looks up the table entry bound to `prefix`.
pub fn by_prefix(prefix: &str) -> Option<&'static XmlNamespace> {
    NAMESPACES.iter().find(|ns| ns.prefix == prefix)
}
