//! Output module for spider results
//!
//! This module handles:
//! - Persisting items saved by handlers (MessagePack backup file)
//! - Recording run statistics and printing them

mod items;
pub mod stats;

pub use items::{read_items, ItemError, ItemProcessor, ItemSaver};
pub use stats::{print_statistics, RunStatistics};
