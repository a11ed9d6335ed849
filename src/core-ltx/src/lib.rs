pub mod artifacts;
pub mod blob;
pub mod common;
pub mod content;
pub mod crawl;
pub mod diff;
mod errors;
pub mod llms;
pub mod retry;
mod web;

pub use common::*;
pub use errors::Error;
pub use web::{is_valid_url, normalize_hostname, normalize_page_url, site_url};
