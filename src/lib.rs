//! Republishes a podcast RSS feed in the shape Spotify for Podcasters
//! expects, writing it only when the source feed's episodes change.

pub mod config;
pub mod diff;
pub mod feed;
pub mod publish;
pub mod report;
pub mod util;
