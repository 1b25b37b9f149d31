//! Gator - a multi-user RSS aggregator for the command line.
//!
//! Users register, add and follow feeds, and browse the newest posts from
//! the feeds they follow. The `agg` command runs a loop that fetches one
//! feed per tick and stores its items as posts.

pub mod browser;
pub mod cache;
pub mod commands;
pub mod config;
pub mod dates;
pub mod db;
pub mod fetcher;
pub mod ingest;
pub mod sanitize;
pub mod scheduler;
pub mod state;
