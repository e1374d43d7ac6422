use thiserror::Error;

/// Errors raised while reading a feed document.
///
/// Shared by the episode extractor and the augmenter so the orchestrator can
/// treat "the document is not a usable feed" uniformly, whatever stage found it.
#[derive(Debug, Error)]
pub enum ParseError {
    /// quick-xml rejected the input (bad syntax, mismatched end tag, bad escape).
    #[error("XML parse error at position {position}: {message}")]
    Xml { position: u64, message: String },

    /// The input contains no element at all.
    #[error("Document has no root element")]
    NoRoot,

    /// End of input reached with elements still open.
    #[error("Document is truncated: {0} element(s) left open")]
    Truncated(usize),

    /// A second root element, or non-whitespace text outside the root.
    #[error("Unexpected content outside the root element")]
    OutsideRoot,

    /// An attribute on the root element could not be read.
    #[error("Malformed attribute: {0}")]
    Attribute(String),

    /// The root element has no `<channel>` child.
    #[error("Feed has no <channel> element")]
    MissingChannel,

    /// Re-serializing the document failed.
    #[error("Failed to write feed XML: {0}")]
    Write(String),
}

impl ParseError {
    pub(crate) fn xml(position: u64, err: impl std::fmt::Display) -> Self {
        ParseError::Xml {
            position,
            message: err.to_string(),
        }
    }
}
