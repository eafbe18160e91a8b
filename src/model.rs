/*!
Core value types shared across the relay: the envelope that flows through the
pipeline, and the record extracted from one BGP UPDATE message.
*/
use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};

/// A rule's match mode, as described in spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Rule matches any update prefix contained within the rule's network.
    MoreSpecific,
    /// Rule matches any update prefix that contains the rule's network.
    LessSpecific,
}

impl MatchMode {
    pub fn from_token(token: &str) -> Option<MatchMode> {
        match token.to_ascii_lowercase().as_str() {
            "ms" => Some(MatchMode::MoreSpecific),
            "ls" => Some(MatchMode::LessSpecific),
            _ => None,
        }
    }
}

/// One IPv4 prefix rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixRule4 {
    pub network: Ipv4Net,
    pub mode: MatchMode,
}

/// One IPv6 prefix rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixRule6 {
    pub network: Ipv6Net,
    pub mode: MatchMode,
}

/// Record extracted from one raw XML message, per spec §4.2.
#[derive(Debug, Clone, Default)]
pub struct ExtractedUpdate {
    /// sorted, deduplicated
    pub v4_prefixes: Vec<Ipv4Net>,
    /// sorted, deduplicated
    pub v6_prefixes: Vec<Ipv6Net>,
    pub terminal_as: Option<u32>,
}

/// One raw XML message plus a monotonically increasing sequence id, used to
/// assert ordering in tests.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub seq: u64,
    pub xml: Bytes,
}

impl Envelope {
    pub fn new(seq: u64, xml: impl Into<Bytes>) -> Self {
        Envelope {
            seq,
            xml: xml.into(),
        }
    }
}
