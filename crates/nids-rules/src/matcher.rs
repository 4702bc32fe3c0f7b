//! Stateless-after-load rule matcher.
//!
//! The rule set is an append-mostly list behind a single-writer/many-reader
//! lock: rule installs happen on an administrative path (hot-reload), so
//! lock contention against the packet-matching hot path is negligible.

use crate::alert::SignatureAlert;
use crate::rule::{RuleDirection, SignatureRule};
use crate::RulesError;
use nids_common::PacketEvent;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Holds the active rule set and matches packets against it.
pub struct RuleMatcher {
    rules: RwLock<Vec<SignatureRule>>,
    index: RwLock<HashMap<u32, usize>>,
}

impl RuleMatcher {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the rule set wholesale. Used both for the initial load and
    /// for hot-reload: readers in flight keep matching against the old
    /// `Vec` snapshot behind the lock until they next acquire it.
    pub fn load(&self, rules: Vec<SignatureRule>) {
        let mut index = HashMap::with_capacity(rules.len());
        for (i, r) in rules.iter().enumerate() {
            index.insert(r.sid, i);
        }
        *self.rules.write() = rules;
        *self.index.write() = index;
    }

    /// Insert or replace a single rule without disturbing the rest of the
    /// set -- the hot-reload path used by the administrative API.
    pub fn upsert(&self, rule: SignatureRule) {
        let mut rules = self.rules.write();
        let mut index = self.index.write();
        if let Some(&pos) = index.get(&rule.sid) {
            rules[pos] = rule;
        } else {
            index.insert(rule.sid, rules.len());
            rules.push(rule);
        }
    }

    pub fn load_from_text(&self, text: &str) -> Result<usize, RulesError> {
        let mut parser = crate::parser::RuleParser::new();
        parser.parse_content(text)?;
        for (lineno, err) in parser.errors() {
            tracing::warn!(line = lineno, error = %err, "rejected malformed signature rule");
        }
        let n = parser.rules().len();
        tracing::info!(loaded = n, rejected = parser.errors().len(), "loaded signature rule set");
        self.load(parser.into_rules());
        Ok(n)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Match one packet against every enabled rule, emitting one alert per
    /// match. A malformed packet field (empty src/dst) simply fails to
    /// match anything; it never panics or aborts the scan.
    pub fn match_packet(&self, event: &PacketEvent) -> Vec<SignatureAlert> {
        let rules = self.rules.read();
        let mut alerts = Vec::new();
        let Ok(src_ip) = event.src_ip.parse() else {
            return alerts;
        };
        let Ok(dst_ip) = event.dst_ip.parse() else {
            return alerts;
        };

        for rule in rules.iter() {
            if !rule.enabled {
                continue;
            }
            if !rule.protocol.matches(event.protocol) {
                continue;
            }

            let forward = rule.src_ip.matches(src_ip)
                && rule.dst_ip.matches(dst_ip)
                && rule.src_port.matches(event.src_port)
                && rule.dst_port.matches(event.dst_port);

            // Bidirectional rules also match the reverse orientation.
            let reverse = rule.direction == RuleDirection::Bi
                && rule.src_ip.matches(dst_ip)
                && rule.dst_ip.matches(src_ip)
                && rule.src_port.matches(event.dst_port)
                && rule.dst_port.matches(event.src_port);

            if forward || reverse {
                let severity = rule.severity_for(event.dst_port);
                let alert = SignatureAlert::new(
                    event.timestamp,
                    rule.sid,
                    format!("Signature {}: {}", rule.sid, rule.msg),
                    severity,
                )
                .with_source(event.src_ip.clone(), event.src_port)
                .with_destination(event.dst_ip.clone(), event.dst_port)
                .with_protocol(event.protocol.as_str());
                alerts.push(alert);
            }
        }
        alerts
    }
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::{Direction, Protocol};

    fn event(dst_port: u16) -> PacketEvent {
        PacketEvent {
            timestamp: 1000.0,
            src_ip: "203.0.113.5".into(),
            dst_ip: "127.0.0.1".into(),
            src_port: Some(54321),
            dst_port: Some(dst_port),
            protocol: Protocol::Tcp,
            packet_size: 64,
            direction: Direction::In,
        }
    }

    #[test]
    fn rdp_rule_matches_and_is_critical() {
        let matcher = RuleMatcher::new();
        matcher
            .load_from_text(r#"alert tcp any any -> any 3389 (msg:"RDP"; sid:9001;)"#)
            .unwrap();
        let alerts = matcher.match_packet(&event(3389));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].sid, 9001);
        assert_eq!(alerts[0].severity, nids_common::Severity::Critical);
    }

    #[test]
    fn non_matching_port_produces_no_alert() {
        let matcher = RuleMatcher::new();
        matcher
            .load_from_text(r#"alert tcp any any -> any 22 (msg:"ssh"; sid:1;)"#)
            .unwrap();
        assert!(matcher.match_packet(&event(443)).is_empty());
    }

    #[test]
    fn hot_reload_upsert_is_visible_immediately() {
        let matcher = RuleMatcher::new();
        assert!(matcher.match_packet(&event(3389)).is_empty());
        matcher.upsert(crate::rule::SignatureRule {
            sid: 9001,
            action: crate::rule::RuleAction::Alert,
            protocol: crate::rule::RuleProtocol::Tcp,
            src_ip: crate::selector::IpSelector::Any,
            src_port: crate::selector::PortSelector::Any,
            direction: RuleDirection::Uni,
            dst_ip: crate::selector::IpSelector::Any,
            dst_port: crate::selector::PortSelector::Literal(3389),
            msg: "RDP".into(),
            options: Default::default(),
            enabled: true,
            category: "generic".into(),
            raw: String::new(),
        });
        let alerts = matcher.match_packet(&event(3389));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, nids_common::Severity::Critical);
    }

    #[test]
    fn malformed_packet_field_matches_nothing() {
        let matcher = RuleMatcher::new();
        matcher
            .load_from_text(r#"alert ip any any -> any any (msg:"any"; sid:1;)"#)
            .unwrap();
        let mut bad = event(80);
        bad.src_ip = String::new();
        assert!(matcher.match_packet(&bad).is_empty());
    }
}
