//! Tagged-variant selectors for rule header fields (IP and port matching).

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A rule's IP address selector.
#[derive(Debug, Clone, PartialEq)]
pub enum IpSelector {
    Any,
    Literal(Ipv4Addr),
    Cidr(Ipv4Network),
}

impl IpSelector {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("any") {
            return Some(IpSelector::Any);
        }
        if raw.contains('/') {
            return Ipv4Network::from_str(raw).ok().map(IpSelector::Cidr);
        }
        Ipv4Addr::from_str(raw).ok().map(IpSelector::Literal)
    }

    /// True CIDR arithmetic matching -- no prefix-string fallback. A
    /// previous implementation of this engine fell back to naive string
    /// prefix comparison when network parsing failed; that is a bug, not
    /// a feature, and is deliberately not replicated here.
    pub fn matches(&self, addr: Ipv4Addr) -> bool {
        match self {
            IpSelector::Any => true,
            IpSelector::Literal(ip) => *ip == addr,
            IpSelector::Cidr(net) => net.contains(addr),
        }
    }
}

/// A rule's port selector.
#[derive(Debug, Clone, PartialEq)]
pub enum PortSelector {
    Any,
    Literal(u16),
    Range(u16, u16),
    Set(Vec<u16>),
}

impl PortSelector {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("any") {
            return Some(PortSelector::Any);
        }
        if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some((lo, hi)) = inner.split_once('-') {
                return Some(PortSelector::Range(lo.parse().ok()?, hi.parse().ok()?));
            }
            if let Some((lo, hi)) = inner.split_once(':') {
                return Some(PortSelector::Range(lo.parse().ok()?, hi.parse().ok()?));
            }
            let ports: Option<Vec<u16>> = inner.split(',').map(|p| p.trim().parse().ok()).collect();
            return ports.map(PortSelector::Set);
        }
        if let Some((lo, hi)) = raw.split_once(':') {
            return Some(PortSelector::Range(lo.parse().ok()?, hi.parse().ok()?));
        }
        raw.parse().ok().map(PortSelector::Literal)
    }

    /// A rule port selector matches `None` (no L4 port, e.g. ICMP) only
    /// via `Any`; every other variant requires a concrete packet port.
    pub fn matches(&self, port: Option<u16>) -> bool {
        match (self, port) {
            (PortSelector::Any, _) => true,
            (_, None) => false,
            (PortSelector::Literal(p), Some(v)) => *p == v,
            (PortSelector::Range(lo, hi), Some(v)) => (*lo..=*hi).contains(&v),
            (PortSelector::Set(set), Some(v)) => set.contains(&v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_matches_arithmetic_not_string_prefix() {
        let sel = IpSelector::parse("192.168.1.0/24").unwrap();
        assert!(sel.matches("192.168.1.200".parse().unwrap()));
        // 192.168.10.5 shares the string prefix "192.168.1" but is outside
        // the /24 -- a naive prefix-string match would wrongly accept it.
        assert!(!sel.matches("192.168.10.5".parse().unwrap()));
    }

    #[test]
    fn port_bracket_forms() {
        assert_eq!(
            PortSelector::parse("[1-1024]").unwrap(),
            PortSelector::Range(1, 1024)
        );
        assert_eq!(
            PortSelector::parse("[22,23,3389]").unwrap(),
            PortSelector::Set(vec![22, 23, 3389])
        );
        assert!(PortSelector::parse("[5900:5999]")
            .unwrap()
            .matches(Some(5950)));
    }

    #[test]
    fn any_port_does_not_match_absent_port() {
        assert!(PortSelector::Any.matches(None));
        assert!(!PortSelector::Literal(22).matches(None));
    }
}
