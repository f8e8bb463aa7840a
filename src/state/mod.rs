//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: the named states one crawl scope moves through
//! - `PhaseTracker`: holds the current phase and rejects invalid transitions

mod crawl_phase;

// Re-export main types
pub use crawl_phase::{CrawlPhase, PhaseTracker};
