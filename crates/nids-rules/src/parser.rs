//! Signature rule parser.
//!
//! Parses the Suricata-style rule syntax described in the rule matcher
//! design into [`SignatureRule`] values. Malformed lines are rejected and
//! logged; they never abort parsing of the surrounding rule set.

use crate::rule::{RuleAction, RuleDirection, RuleProtocol, SignatureRule};
use crate::selector::{IpSelector, PortSelector};
use crate::RulesError;
use std::collections::HashMap;

/// Parses rule text into a set of [`SignatureRule`]s, collecting
/// per-line errors rather than failing the whole load.
#[derive(Default)]
pub struct RuleParser {
    rules: Vec<SignatureRule>,
    errors: Vec<(usize, String)>,
}

impl RuleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a full rule file's content: `#` comments, blank lines, and
    /// trailing-`\` line continuation are all honored.
    pub fn parse_content(&mut self, content: &str) -> Result<(), RulesError> {
        let mut buffer = String::new();
        for (lineno, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim_end();
            if let Some(stripped) = line.strip_suffix('\\') {
                buffer.push_str(stripped.trim_end());
                buffer.push(' ');
                continue;
            }
            buffer.push_str(line);
            let joined = std::mem::take(&mut buffer);
            let trimmed = joined.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_single_rule(trimmed) {
                Ok(rule) => {
                    if let Some(pos) = self.rules.iter().position(|r| r.sid == rule.sid) {
                        self.rules[pos] = rule;
                    } else {
                        self.rules.push(rule);
                    }
                }
                Err(e) => self.errors.push((lineno + 1, e.to_string())),
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    pub fn errors(&self) -> &[(usize, String)] {
        &self.errors
    }

    pub fn into_rules(self) -> Vec<SignatureRule> {
        self.rules
    }
}

fn parse_single_rule(line: &str) -> Result<SignatureRule, RulesError> {
    let open = line
        .find('(')
        .ok_or_else(|| RulesError::ParseError("missing options block '('".into()))?;
    let close = line
        .rfind(')')
        .ok_or_else(|| RulesError::ParseError("missing options block ')'".into()))?;
    if close < open {
        return Err(RulesError::ParseError("malformed options block".into()));
    }

    let header = line[..open].trim();
    let options_blob = &line[open + 1..close];

    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() != 7 {
        return Err(RulesError::ParseError(format!(
            "expected 7 header fields, got {}: {}",
            parts.len(),
            header
        )));
    }
    let [action, protocol, src_ip, src_port, direction, dst_ip, dst_port] = [
        parts[0], parts[1], parts[2], parts[3], parts[4], parts[5], parts[6],
    ];

    let action =
        RuleAction::parse(action).ok_or_else(|| RulesError::ParseError(format!("unknown action: {action}")))?;
    let protocol = RuleProtocol::parse(protocol)
        .ok_or_else(|| RulesError::ParseError(format!("unknown protocol: {protocol}")))?;
    let direction = RuleDirection::parse(direction)
        .ok_or_else(|| RulesError::ParseError(format!("unknown direction: {direction}")))?;
    let src_ip = IpSelector::parse(src_ip)
        .ok_or_else(|| RulesError::ParseError(format!("bad src ip selector: {src_ip}")))?;
    let dst_ip = IpSelector::parse(dst_ip)
        .ok_or_else(|| RulesError::ParseError(format!("bad dst ip selector: {dst_ip}")))?;
    let src_port = PortSelector::parse(src_port)
        .ok_or_else(|| RulesError::ParseError(format!("bad src port selector: {src_port}")))?;
    let dst_port = PortSelector::parse(dst_port)
        .ok_or_else(|| RulesError::ParseError(format!("bad dst port selector: {dst_port}")))?;

    let options = split_options(options_blob);
    let mut opt_map = HashMap::new();
    for opt in &options {
        let opt = opt.trim();
        if opt.is_empty() {
            continue;
        }
        if let Some((key, value)) = opt.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim().trim_matches('"').to_string();
            opt_map.insert(key, value);
        } else {
            opt_map.insert(opt.to_string(), String::new());
        }
    }

    let sid: u32 = opt_map
        .get("sid")
        .ok_or_else(|| RulesError::ParseError("missing mandatory 'sid' option".into()))?
        .parse()
        .map_err(|_| RulesError::ParseError("sid must be a positive integer".into()))?;
    let msg = opt_map
        .get("msg")
        .cloned()
        .ok_or_else(|| RulesError::ParseError("missing mandatory 'msg' option".into()))?;
    let category = opt_map
        .get("classtype")
        .cloned()
        .unwrap_or_else(|| "generic".to_string());

    Ok(SignatureRule {
        sid,
        action,
        protocol,
        src_ip,
        src_port,
        direction,
        dst_ip,
        dst_port,
        msg,
        options: opt_map,
        enabled: true,
        category,
        raw: line.to_string(),
    })
}

/// Splits a rule's options blob on `;`, respecting double-quoted values so
/// a `;` inside a quoted string doesn't terminate an option early.
fn split_options(blob: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in blob.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => {
                out.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_rule() {
        let mut parser = RuleParser::new();
        parser
            .parse_content(r#"alert tcp any any -> any 22 (msg:"SSH traffic"; sid:1000001;)"#)
            .unwrap();
        assert_eq!(parser.rules().len(), 1);
        let rule = &parser.rules()[0];
        assert_eq!(rule.sid, 1000001);
        assert_eq!(rule.msg, "SSH traffic");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut parser = RuleParser::new();
        parser
            .parse_content("# a comment\n\nalert tcp any any -> any 22 (msg:\"x\"; sid:1;)\n")
            .unwrap();
        assert_eq!(parser.rules().len(), 1);
    }

    #[test]
    fn line_continuation_is_joined() {
        let mut parser = RuleParser::new();
        parser
            .parse_content("alert tcp any any -> \\\nany 22 (msg:\"x\"; sid:1;)\n")
            .unwrap();
        assert_eq!(parser.rules().len(), 1);
    }

    #[test]
    fn duplicate_sid_replaces_prior_rule() {
        let mut parser = RuleParser::new();
        parser
            .parse_content(concat!(
                "alert tcp any any -> any 22 (msg:\"first\"; sid:1;)\n",
                "alert tcp any any -> any 23 (msg:\"second\"; sid:1;)\n"
            ))
            .unwrap();
        assert_eq!(parser.rules().len(), 1);
        assert_eq!(parser.rules()[0].msg, "second");
    }

    #[test]
    fn missing_sid_is_rejected_but_does_not_abort_load() {
        let mut parser = RuleParser::new();
        parser
            .parse_content(concat!(
                "alert tcp any any -> any 22 (msg:\"no sid\";)\n",
                "alert tcp any any -> any 23 (msg:\"ok\"; sid:2;)\n"
            ))
            .unwrap();
        assert_eq!(parser.rules().len(), 1);
        assert_eq!(parser.errors().len(), 1);
    }

    #[test]
    fn bracket_port_forms_parse() {
        let mut parser = RuleParser::new();
        parser
            .parse_content(
                r#"alert tcp any any -> any [1-1024] (msg:"privileged"; sid:1000003;)"#,
            )
            .unwrap();
        assert_eq!(parser.rules().len(), 1);
    }
}
