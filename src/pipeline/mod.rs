//! Pipeline entry points for harvester operations.
//!
//! - `run_harvest`: Read the input file, crawl every unique domain, write the report
//! - `inspect_site`: Probe, crawl and classify a single URL

pub mod dedup;
pub mod harvest;
pub mod schedule;

pub use dedup::dedupe;
pub use harvest::{build_scheduler, inspect_site, run_harvest};
pub use schedule::{AddressClass, BatchScheduler, RunSummary, SiteReport};
