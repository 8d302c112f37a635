// src/lib.rs

//! Contact Address Harvester Library
//!
//! Reads a list of company websites, crawls each reachable site for contact
//! addresses and writes a report separating the site's own addresses from
//! third-party ones. Addresses whose domain cannot receive mail are dropped.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
