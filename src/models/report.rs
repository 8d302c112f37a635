//! Input rows and report rows.

use serde::Serialize;

use crate::models::NormalizedDomain;

/// One `name;url` line of the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    pub name: String,
    pub raw_url: String,
}

impl InputRow {
    pub fn new(name: impl Into<String>, raw_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_url: raw_url.into(),
        }
    }

    pub fn domain(&self) -> NormalizedDomain {
        NormalizedDomain::from_url(&self.raw_url)
    }
}

/// A unique company/domain pair, ready to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub name: String,
    pub domain: NormalizedDomain,
}

/// Final per-domain result, written once to the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedResult {
    pub name: String,
    pub domain: NormalizedDomain,
    pub https_reachable: bool,
    pub host_emails: Vec<String>,
    pub third_party_emails: Vec<String>,
}

impl ClassifiedResult {
    /// Row for a domain that was never crawled.
    pub fn unreachable(entry: &DomainEntry) -> Self {
        Self {
            name: entry.name.clone(),
            domain: entry.domain.clone(),
            ..Self::default()
        }
    }

    /// Report columns in header order.
    pub fn to_record(&self) -> [String; 5] {
        [
            self.name.clone(),
            self.domain.to_string(),
            self.https_reachable.to_string(),
            join_addresses(&self.host_emails),
            join_addresses(&self.third_party_emails),
        ]
    }
}

/// Address lists are comma-joined; addresses never contain `,` or `;`.
pub fn join_addresses(addresses: &[String]) -> String {
    addresses.join(",")
}

/// Inverse of [`join_addresses`].
pub fn split_addresses(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, domain: &str) -> DomainEntry {
        DomainEntry {
            name: name.to_string(),
            domain: NormalizedDomain::from_host(domain),
        }
    }

    #[test]
    fn test_unreachable_record() {
        let result = ClassifiedResult::unreachable(&entry("Acme", "acme.test"));
        assert_eq!(
            result.to_record(),
            ["Acme", "acme.test", "false", "", ""].map(String::from)
        );
    }

    #[test]
    fn test_address_lists_survive_join_and_split() {
        let addresses = vec!["info@example.com".to_string(), "sales@example.com".to_string()];
        let field = join_addresses(&addresses);
        assert_eq!(field, "info@example.com,sales@example.com");
        assert_eq!(split_addresses(&field), addresses);
        assert!(split_addresses("").is_empty());
    }
}
