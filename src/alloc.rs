//! Port and subnet allocation.
//!
//! Pure proposal logic: callers pass in what is already claimed (by the
//! configuration and by the host's existing networks) and get back a
//! non-conflicting value. Nothing here touches the runtime.

use std::collections::BTreeSet;

use crate::config::NetworkChoice;
use crate::error::{BerthError, BerthResult};

/// Tier-1 subnet candidates: large, conventionally-private /16 blocks.
/// Preferred first to minimize future collision probability with the
/// operator's other networks. 172.17.0.0/16 is skipped because container
/// runtimes commonly claim it for their default bridge.
const TIER1_SUBNETS: [&str; 14] = [
    "172.18.0.0/16",
    "172.19.0.0/16",
    "172.20.0.0/16",
    "172.21.0.0/16",
    "172.22.0.0/16",
    "172.23.0.0/16",
    "172.24.0.0/16",
    "172.25.0.0/16",
    "172.26.0.0/16",
    "172.27.0.0/16",
    "172.28.0.0/16",
    "172.29.0.0/16",
    "172.30.0.0/16",
    "172.31.0.0/16",
];

/// Tier-2 fallback: small /24 blocks in the 192.168 range.
const TIER2_SUBNETS: [&str; 15] = [
    "192.168.100.0/24",
    "192.168.110.0/24",
    "192.168.120.0/24",
    "192.168.130.0/24",
    "192.168.140.0/24",
    "192.168.150.0/24",
    "192.168.160.0/24",
    "192.168.170.0/24",
    "192.168.180.0/24",
    "192.168.190.0/24",
    "192.168.200.0/24",
    "192.168.210.0/24",
    "192.168.220.0/24",
    "192.168.230.0/24",
    "192.168.240.0/24",
];

/// Propose a free port, scanning upward from the preferred default.
///
/// `suggest_port(5432, {5432})` proposes `5433`.
pub fn suggest_port(preferred: u16, claimed: &BTreeSet<u16>) -> BerthResult<u16> {
    let mut candidate = preferred;
    loop {
        if !claimed.contains(&candidate) {
            return Ok(candidate);
        }
        candidate = match candidate.checked_add(1) {
            Some(next) => next,
            None => {
                return Err(BerthError::AllocationExhausted {
                    resource: "port".to_string(),
                    ranges: format!("{preferred}..65535"),
                })
            }
        };
    }
}

/// Choose a subnet that does not overlap any existing one.
///
/// Walks the tier-1 /16 candidates, then the tier-2 /24 fallbacks, and
/// returns the runtime-default sentinel only when every candidate in both
/// tiers overlaps an existing network. Overlap is checked by numeric range
/// intersection, never by string comparison.
pub fn choose_subnet<'a, I>(existing: I) -> NetworkChoice
where
    I: IntoIterator<Item = &'a str>,
{
    // Unparseable entries in the host inventory are skipped rather than
    // treated as blocking the whole range.
    let taken: Vec<(u32, u32)> = existing
        .into_iter()
        .filter_map(parse_cidr)
        .map(range_of)
        .collect();

    for candidate in TIER1_SUBNETS.iter().chain(TIER2_SUBNETS.iter()) {
        let parsed = match parse_cidr(candidate) {
            Some(p) => p,
            None => continue,
        };
        let range = range_of(parsed);
        if taken.iter().all(|t| !ranges_overlap(*t, range)) {
            return NetworkChoice::Subnet((*candidate).to_string());
        }
    }

    NetworkChoice::RuntimeDefault
}

/// Parse `a.b.c.d/prefix` into the masked network address and prefix
/// length. Returns `None` for anything that is not valid IPv4 CIDR.
pub fn parse_cidr(cidr: &str) -> Option<(u32, u8)> {
    let (addr, prefix) = cidr.split_once('/')?;
    let prefix: u8 = prefix.parse().ok()?;
    if prefix > 32 {
        return None;
    }
    let addr: std::net::Ipv4Addr = addr.parse().ok()?;
    let base = u32::from(addr);
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    Some((base & mask, prefix))
}

/// Half-open numeric range `[start, end)` covered by a network. A /0
/// covers the whole space; `end` saturates at `u32::MAX` which is close
/// enough for overlap purposes.
fn range_of((base, prefix): (u32, u8)) -> (u32, u32) {
    let size = if prefix == 0 {
        u32::MAX
    } else {
        1u32.checked_shl(32 - prefix as u32).unwrap_or(u32::MAX)
    };
    (base, base.saturating_add(size))
}

fn ranges_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
