//! Domain deduplication.

use std::collections::HashSet;

use crate::models::{DomainEntry, InputRow};

/// Collapse input rows to one entry per normalized domain.
///
/// The first row for a domain wins and input order is preserved. Rows whose
/// URL cannot be parsed share the empty domain, so only the first of them
/// survives.
pub fn dedupe(rows: &[InputRow]) -> Vec<DomainEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for row in rows {
        let domain = row.domain();
        if seen.insert(domain.clone()) {
            entries.push(DomainEntry {
                name: row.name.clone(),
                domain,
            });
        } else {
            log::debug!("Skipping duplicate domain '{}' ({})", domain, row.name);
        }
    }
    entries
}
