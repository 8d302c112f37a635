// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod crawl;
mod domain;
mod report;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, DnsConfig, FilterConfig, PathsConfig, ProbeConfig, RenderConfig,
    SchedulerConfig,
};
pub use crawl::{AddressSet, CrawlOutcome, CrawlState, CrawlTask, Page};
pub use domain::NormalizedDomain;
pub use report::{ClassifiedResult, DomainEntry, InputRow, join_addresses, split_addresses};
