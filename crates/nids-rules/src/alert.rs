//! Signature alert representation.

use nids_common::Severity;

/// One signature match: emitted every time the rule matcher matches a
/// packet against an enabled rule.
#[derive(Debug, Clone)]
pub struct SignatureAlert {
    pub timestamp: f64,
    pub sid: u32,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub protocol: String,
    pub msg: String,
    pub severity: Severity,
}

impl SignatureAlert {
    pub fn new(timestamp: f64, sid: u32, msg: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp,
            sid,
            src_ip: String::new(),
            dst_ip: String::new(),
            src_port: None,
            dst_port: None,
            protocol: String::new(),
            msg: msg.into(),
            severity,
        }
    }

    pub fn with_source(mut self, ip: impl Into<String>, port: Option<u16>) -> Self {
        self.src_ip = ip.into();
        self.src_port = port;
        self
    }

    pub fn with_destination(mut self, ip: impl Into<String>, port: Option<u16>) -> Self {
        self.dst_ip = ip.into();
        self.dst_port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }
}
