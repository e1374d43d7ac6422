//! Feed handling: download, episode extraction, and platform augmentation.
//!
//! - [`fetcher`] - single HTTP GET with a bounded timeout
//! - [`episodes`] - projects a feed document into [`Episode`] records
//! - [`augment`] - adds the Spotify elements and namespace declarations
//! - [`namespaces`] - the ordered namespace table written on the root element
//!
//! Extraction and augmentation both stream the document with `quick-xml` and
//! report problems through the shared [`ParseError`].

mod augment;
mod episodes;
mod error;
mod fetcher;
pub mod namespaces;

pub use augment::augment;
pub use episodes::{extract_episodes, Episode};
pub use error::ParseError;
pub use fetcher::{build_client, fetch_feed, FetchError};
