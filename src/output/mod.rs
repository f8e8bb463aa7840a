//! Output module for crawl summaries
//!
//! Reports what the database holds after one or more crawl runs.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
