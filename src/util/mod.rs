//! Utility functions for common operations.
//!
//! - **URL validation**: scheme and host checks for the configured feed URL
//! - **Atomic writes**: replace output files without leaving partial content

mod fs;
mod url_validator;

pub use fs::write_atomic;
pub use url_validator::{validate_feed_url, UrlValidationError};
