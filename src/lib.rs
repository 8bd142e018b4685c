//! Client layer for XML/Atom web APIs.
//!
//! Issues authenticated HTTP requests, parses Atom responses into a
//! namespace-aware DOM and hands each entry to a caller-supplied extractor.

pub mod atom;
pub mod client;
pub mod config;
pub mod util;
pub mod xml;

pub use client::{FeedClient, FeedError};
pub use config::Config;
