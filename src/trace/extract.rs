// Hop address extraction from raw path trace output

use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

/// Four dot-separated groups of 1-3 digits
static DOTTED_QUAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("dotted quad pattern is valid")
});

/// Extract the ordered, de-duplicated hop addresses from trace output.
///
/// Each line contributes at most one address: the first dotted-quad on it
/// that is a real IPv4 address (octets in 0-255). Loopback addresses and
/// repeats are skipped, first occurrence wins, and at most `max_hops`
/// addresses are returned.
pub fn extract_addresses(output: &str, max_hops: usize) -> Vec<Ipv4Addr> {
    let mut found: Vec<Ipv4Addr> = Vec::new();

    for line in output.lines() {
        if found.len() >= max_hops {
            break;
        }

        let Some(ip) = first_address(line) else {
            continue;
        };

        if ip.is_loopback() || found.contains(&ip) {
            continue;
        }

        found.push(ip);
    }

    found
}

fn first_address(line: &str) -> Option<Ipv4Addr> {
    DOTTED_QUAD
        .find_iter(line)
        .find_map(|m| m.as_str().parse::<Ipv4Addr>().ok())
}
