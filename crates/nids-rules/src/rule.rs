//! The parsed representation of one signature rule.

use crate::selector::{IpSelector, PortSelector};
use nids_common::Severity;
use std::collections::HashMap;

/// Action a rule requests when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Alert,
    Drop,
    Reject,
    Pass,
}

impl RuleAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alert" => Some(RuleAction::Alert),
            "drop" => Some(RuleAction::Drop),
            "reject" => Some(RuleAction::Reject),
            "pass" => Some(RuleAction::Pass),
            _ => None,
        }
    }
}

/// Protocol a rule header restricts matching to. `Ip` matches any L3/L4
/// protocol, mirroring the "or equals event.protocol" clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleProtocol {
    Tcp,
    Udp,
    Icmp,
    Ip,
}

impl RuleProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(RuleProtocol::Tcp),
            "udp" => Some(RuleProtocol::Udp),
            "icmp" => Some(RuleProtocol::Icmp),
            "ip" => Some(RuleProtocol::Ip),
            _ => None,
        }
    }

    pub fn matches(&self, observed: nids_common::Protocol) -> bool {
        use nids_common::Protocol as P;
        match self {
            RuleProtocol::Ip => true,
            RuleProtocol::Tcp => observed == P::Tcp,
            RuleProtocol::Udp => observed == P::Udp,
            RuleProtocol::Icmp => observed == P::Icmp,
        }
    }
}

/// Rule direction: unidirectional or bidirectional. The minimum viable
/// matcher treats both the same way (bidirectional rules match either
/// packet orientation); direction is retained for fidelity to the rule
/// text and future use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDirection {
    Uni,
    Bi,
}

impl RuleDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "->" => Some(RuleDirection::Uni),
            "<>" => Some(RuleDirection::Bi),
            _ => None,
        }
    }
}

/// One parsed signature rule. Keyed by `sid`; a duplicate `sid` on load
/// replaces the prior rule.
#[derive(Debug, Clone)]
pub struct SignatureRule {
    pub sid: u32,
    pub action: RuleAction,
    pub protocol: RuleProtocol,
    pub src_ip: IpSelector,
    pub src_port: PortSelector,
    pub direction: RuleDirection,
    pub dst_ip: IpSelector,
    pub dst_port: PortSelector,
    pub msg: String,
    pub options: HashMap<String, String>,
    pub enabled: bool,
    pub category: String,
    pub raw: String,
}

/// Ports whose presence on either side of a match escalates severity to
/// critical: telnet, SMB, RPC, RDP.
const CRITICAL_PORTS: [u16; 4] = [23, 135, 445, 3389];
/// Ports that escalate to high: SSH, VNC.
const HIGH_PORTS: [u16; 3] = [22, 5900, 5901];

impl SignatureRule {
    /// Severity for an alert produced by this rule matching a packet with
    /// the given destination port. Port class takes precedence; a
    /// drop/reject action escalates an otherwise-medium match to high.
    pub fn severity_for(&self, dst_port: Option<u16>) -> Severity {
        if let Some(p) = dst_port {
            if CRITICAL_PORTS.contains(&p) {
                return Severity::Critical;
            }
            if HIGH_PORTS.contains(&p) {
                return Severity::High;
            }
        }
        match self.action {
            RuleAction::Drop | RuleAction::Reject => Severity::High,
            _ => Severity::Medium,
        }
    }
}
