//! Utility functions for common operations.
//!
//! - **URL decoding**: form-style percent decoding applied to request URLs
//!
//! # Examples
//!
//! ```
//! use atomclient::util::url_decode;
//!
//! let url = url_decode("https://example.com/feeds/my%20list").unwrap();
//! assert_eq!(url, "https://example.com/feeds/my list");
//! ```

mod url_decode;

pub use url_decode::{url_decode, UrlDecodeError};
