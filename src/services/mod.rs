//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Address extraction (`extractor`)
//! - MX validation with a run-wide cache (`MxValidator`)
//! - Secure-port reachability (`TcpProber`)
//! - Site crawling (`SiteCrawler`) over a swappable `PageSource`

pub mod circuit_breaker;
mod crawler;
pub mod extractor;
mod fetch;
pub mod links;
mod mx;
mod probe;
#[cfg(feature = "render")]
mod render;

pub use crawler::SiteCrawler;
pub use fetch::{PageSource, StaticFetcher};
pub use mx::{DnsMxResolver, MxResolver, MxValidator, RetryPolicy};
pub use probe::{ProbeResult, ReachabilityProbe, TcpProber};
#[cfg(feature = "render")]
pub use render::RenderedFetcher;
