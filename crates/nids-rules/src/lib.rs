//! Signature-based rule matcher.
//!
//! Parses Suricata-style rules and matches them against decoded packet
//! events on L3/L4 header fields only -- no payload inspection. Rule
//! installs happen on an administrative path; matching itself is a
//! stateless read against the loaded rule set.

pub mod alert;
pub mod matcher;
pub mod parser;
pub mod rule;
pub mod selector;

pub use alert::SignatureAlert;
pub use matcher::RuleMatcher;
pub use parser::RuleParser;
pub use rule::{RuleAction, RuleDirection, RuleProtocol, SignatureRule};
pub use selector::{IpSelector, PortSelector};

use thiserror::Error;

/// Rule matcher errors.
#[derive(Error, Debug)]
pub enum RulesError {
    /// A rule line failed to parse. Logged, never fatal to the load.
    #[error("rule parse error: {0}")]
    ParseError(String),
}

/// Ten default rules covering the classes exercised in this engine's test
/// scenarios: SSH/telnet/privileged ports/DNS/ICMP/RDP/SMB/RPC/VNC.
pub const DEFAULT_RULES: &str = r#"
alert tcp any any -> any 22 (msg:"SSH access attempt"; sid:1000001; classtype:policy;)
alert tcp any any -> any 23 (msg:"Telnet access attempt"; sid:1000002; classtype:policy;)
alert tcp any any -> any [1-1024] (msg:"Privileged port access"; sid:1000003; classtype:scan;)
alert udp any any -> any 53 (msg:"DNS query"; sid:1000004; classtype:protocol;)
alert icmp any any -> any any (msg:"ICMP traffic"; sid:1000005; classtype:protocol;)
alert tcp any any -> any 3389 (msg:"RDP access attempt"; sid:1000006; classtype:policy;)
alert tcp any any -> any 445 (msg:"SMB access attempt"; sid:1000007; classtype:policy;)
alert tcp any any -> any 135 (msg:"RPC access attempt"; sid:1000008; classtype:policy;)
alert tcp any any -> any [5900:5999] (msg:"VNC access attempt"; sid:1000009; classtype:policy;)
alert tcp any any -> any any (msg:"High connection rate"; sid:1000010; classtype:scan;)
"#;
