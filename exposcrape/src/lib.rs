// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod browser;
pub mod cascade;
pub mod cli;
pub mod click_collect;
pub mod config;
pub mod contact;
pub mod dedup;
pub mod export;
pub mod extract;
pub mod load_more;
pub mod logger;
pub mod navigation;
pub mod record;
pub mod session;
pub mod social;
pub mod store;
pub mod surface;
pub mod url_utils;

pub use record::EntityRecord;
pub use session::{RunSummary, ScraperSession};
pub use surface::{HtmlSurface, Surface};
