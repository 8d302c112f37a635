//! Address extraction from page text and `mailto:` anchors.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::models::AddressSet;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid address pattern")
});

/// Literal `\r` / `\n` escapes as they appear inside inline scripts or JSON.
static ESCAPED_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[rn]").expect("valid escape pattern"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

const MAILTO: &str = "mailto:";

/// Scan free text for address-like substrings. Returns the number of new addresses.
pub fn extract_from_text(text: &str, addresses: &mut AddressSet) -> usize {
    let text = ESCAPED_BREAK.replace_all(text, " ");
    ADDRESS_PATTERN
        .find_iter(&text)
        .filter(|m| addresses.insert(m.as_str()))
        .count()
}

/// Collect addresses from a single `mailto:` link target.
///
/// The scheme and any `?query` suffix are stripped; whatever remains is
/// scanned with the address pattern, so multi-recipient targets yield each
/// recipient and empty or junk targets yield nothing.
pub fn extract_from_mail_link(href: &str, addresses: &mut AddressSet) -> usize {
    let Some(target) = strip_mailto(href) else {
        return 0;
    };
    extract_from_text(target, addresses)
}

/// Collect addresses from every `mailto:` anchor of a parsed document.
pub fn extract_from_anchors(document: &Html, addresses: &mut AddressSet) -> usize {
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| extract_from_mail_link(href, addresses))
        .sum()
}

/// Whether an `href` uses the mail-link scheme.
pub fn is_mail_link(href: &str) -> bool {
    href.trim_start()
        .get(..MAILTO.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(MAILTO))
}

fn strip_mailto(href: &str) -> Option<&str> {
    if !is_mail_link(href) {
        return None;
    }
    let rest = href.trim_start().get(MAILTO.len()..)?;
    let target = rest.split('?').next().unwrap_or_default().trim();
    (!target.is_empty()).then_some(target)
}

/// Mail-domain of an address (the part after the last `@`).
pub fn mail_domain(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}
