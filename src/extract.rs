/*!
XML record extractor adapter, spec §4.2.

The real XML-to-record translator is an external collaborator (spec §1); this
module only adapts whatever it exposes — a small path-query interface — into
an [`ExtractedUpdate`]. [`XmlSource`] stands in for that translator's lookup
API.
*/
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::model::ExtractedUpdate;

/// Path-based lookup into one parsed XML message, as exposed by the external
/// translator. Each call returns the text content of every element matching
/// `path`; a path with no matches returns an empty vector (never an error —
/// per spec §7, a missing path is "no extractable prefixes/AS", not a
/// failure).
pub trait XmlSource {
    fn fields(&self, path: &str) -> Vec<String>;
}

const WITHDRAWN_PREFIX: &str = "/BGP_MESSAGE/ASCII_MSG/UPDATE/WITHDRAWN/PREFIX/*/ADDRESS";
const NLRI_PREFIX: &str = "/BGP_MESSAGE/ASCII_MSG/UPDATE/NLRI/PREFIX/ADDRESS";
const MP_REACH_PREFIX: &str = "/BGP_MESSAGE/ASCII_MSG/UPDATE/MP_REACH_NLRI/NLRI/PREFIX/ADDRESS";
const MP_UNREACH_PREFIX: &str =
    "/BGP_MESSAGE/ASCII_MSG/UPDATE/MP_UNREACH_NLRI/WITHDRAWN/PREFIX/ADDRESS";
const AS_PATH_SEGMENT: &str = "/BGP_MESSAGE/ASCII_MSG/UPDATE/AS_PATH/AS_SEG/AS/*";

/// Build an [`ExtractedUpdate`] from one XML message, per the path table in
/// spec §4.2.
///
/// Preserves the source's WITHDRAWN-is-always-v4 classification verbatim
/// (spec §9's open question): a v6 address appearing in a bare `WITHDRAWN`
/// block outside `MP_UNREACH_NLRI` is misclassified upstream and will fail to
/// parse as an IPv4 address here, which is treated as "not extractable" for
/// that entry rather than an error.
pub fn extract_update(source: &dyn XmlSource) -> ExtractedUpdate {
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();

    for addr in source.fields(WITHDRAWN_PREFIX) {
        if let Some(net) = parse_v4_prefix(&addr) {
            v4.push(net);
        }
    }

    for addr in source.fields(NLRI_PREFIX) {
        if let Some(net) = parse_v4_prefix(&addr) {
            v4.push(net);
        }
    }

    for addr in source.fields(MP_REACH_PREFIX) {
        classify_into(&addr, &mut v4, &mut v6);
    }

    for addr in source.fields(MP_UNREACH_PREFIX) {
        classify_into(&addr, &mut v4, &mut v6);
    }

    v4.sort();
    v4.dedup();
    v6.sort();
    v6.dedup();

    let terminal_as = source
        .fields(AS_PATH_SEGMENT)
        .last()
        .and_then(|s| s.parse::<u32>().ok());

    ExtractedUpdate {
        v4_prefixes: v4,
        v6_prefixes: v6,
        terminal_as,
    }
}

fn classify_into(addr: &str, v4: &mut Vec<Ipv4Net>, v6: &mut Vec<Ipv6Net>) {
    match parse_ip_prefix(addr) {
        Some(IpNet::V4(net)) => v4.push(net),
        Some(IpNet::V6(net)) => v6.push(net),
        None => {}
    }
}

fn parse_v4_prefix(addr: &str) -> Option<Ipv4Net> {
    if addr.contains('/') {
        Ipv4Net::from_str(addr).ok()
    } else {
        Ipv4Addr::from_str(addr)
            .ok()
            .map(|a| Ipv4Net::new(a, 32).unwrap())
    }
}

fn parse_v6_prefix(addr: &str) -> Option<Ipv6Net> {
    if addr.contains('/') {
        Ipv6Net::from_str(addr).ok()
    } else {
        Ipv6Addr::from_str(addr)
            .ok()
            .map(|a| Ipv6Net::new(a, 128).unwrap())
    }
}

fn parse_ip_prefix(addr: &str) -> Option<IpNet> {
    parse_v4_prefix(addr)
        .map(IpNet::V4)
        .or_else(|| parse_v6_prefix(addr).map(IpNet::V6))
}

#[cfg(test)]
pub(crate) struct MapXmlSource(pub std::collections::HashMap<&'static str, Vec<String>>);

#[cfg(test)]
impl XmlSource for MapXmlSource {
    fn fields(&self, path: &str) -> Vec<String> {
        self.0.get(path).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_paths_yield_empty_record() {
        let source = MapXmlSource(HashMap::new());
        let record = extract_update(&source);
        assert!(record.v4_prefixes.is_empty());
        assert!(record.v6_prefixes.is_empty());
        assert!(record.terminal_as.is_none());
    }

    #[test]
    fn scenario_b_withdrawn_and_nlri() {
        let mut fields = HashMap::new();
        fields.insert(
            WITHDRAWN_PREFIX,
            vec!["205.94.224.0/20".to_string(), "150.196.29.0/24".to_string()],
        );
        let source = MapXmlSource(fields);
        let record = extract_update(&source);
        assert_eq!(record.v4_prefixes.len(), 2);
    }

    #[test]
    fn mp_reach_nlri_classifies_v6() {
        let mut fields = HashMap::new();
        fields.insert(MP_REACH_PREFIX, vec!["2a02:1378::/32".to_string()]);
        let source = MapXmlSource(fields);
        let record = extract_update(&source);
        assert_eq!(record.v6_prefixes.len(), 1);
        assert!(record.v4_prefixes.is_empty());
    }

    #[test]
    fn as_path_takes_last_element() {
        let mut fields = HashMap::new();
        fields.insert(AS_PATH_SEGMENT, vec!["174".into(), "1916".into(), "53175".into()]);
        let source = MapXmlSource(fields);
        let record = extract_update(&source);
        assert_eq!(record.terminal_as, Some(53175));
    }

    #[test]
    fn dedup_and_sort_prefixes() {
        let mut fields = HashMap::new();
        fields.insert(
            NLRI_PREFIX,
            vec![
                "10.0.0.0/24".to_string(),
                "1.0.0.0/24".to_string(),
                "10.0.0.0/24".to_string(),
            ],
        );
        let source = MapXmlSource(fields);
        let record = extract_update(&source);
        assert_eq!(record.v4_prefixes.len(), 2);
        assert!(record.v4_prefixes.windows(2).all(|w| w[0] <= w[1]));
    }
}
