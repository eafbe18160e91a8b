/*!
Rule-file parser, spec §4.1 ("Parser behavior") and §6 ("Rule file").

Each non-blank, non-`#` line has `kind value mode?`. Malformed lines are
fatal at startup and name their line number, mirroring the config-file error
taxonomy in spec §7.
*/
use std::fs;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::{Ipv4Net, Ipv6Net};

use crate::error::RuleParseError;
use crate::model::{MatchMode, PrefixRule4, PrefixRule6};

#[derive(Default)]
pub struct RawRules {
    pub v4_prefixes: Vec<PrefixRule4>,
    pub v4_hosts: Vec<Ipv4Addr>,
    pub v6_prefixes: Vec<PrefixRule6>,
    pub as_numbers: Vec<u32>,
}

pub fn parse_rule_file(path: &str) -> Result<RawRules, RuleParseError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| RuleParseError::new(0, format!("cannot read rule file {path}: {e}")))?;
    parse_rule_text(&contents)
}

fn parse_rule_text(contents: &str) -> Result<RawRules, RuleParseError> {
    let mut raw = RawRules::default();

    for (line_no, raw_line) in contents.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let kind = tokens[0].to_ascii_lowercase();
        match kind.as_str() {
            "ipv4" => parse_ipv4_line(line_no, &tokens, &mut raw)?,
            "ipv6" => parse_ipv6_line(line_no, &tokens, &mut raw)?,
            "as" => parse_as_line(line_no, &tokens, &mut raw)?,
            other => {
                return Err(RuleParseError::new(
                    line_no,
                    format!("unknown rule kind '{other}'"),
                ))
            }
        }
    }

    Ok(raw)
}

fn parse_ipv4_line(line_no: usize, tokens: &[&str], raw: &mut RawRules) -> Result<(), RuleParseError> {
    let value = *tokens.get(1).ok_or_else(|| missing_value(line_no, "ipv4"))?;

    if value.contains('/') {
        let network = Ipv4Net::from_str(value)
            .map_err(|e| RuleParseError::new(line_no, format!("invalid ipv4 prefix '{value}': {e}")))?;
        let mode_token = tokens
            .get(2)
            .ok_or_else(|| RuleParseError::new(line_no, "ipv4 prefix rule requires a mode (ms|ls)"))?;
        let mode = MatchMode::from_token(mode_token)
            .ok_or_else(|| RuleParseError::new(line_no, format!("invalid mode '{mode_token}', expected ms|ls")))?;
        raw.v4_prefixes.push(PrefixRule4 { network, mode });
    } else {
        let addr = Ipv4Addr::from_str(value)
            .map_err(|e| RuleParseError::new(line_no, format!("invalid ipv4 host '{value}': {e}")))?;
        raw.v4_hosts.push(addr);
    }
    Ok(())
}

fn parse_ipv6_line(line_no: usize, tokens: &[&str], raw: &mut RawRules) -> Result<(), RuleParseError> {
    let value = *tokens.get(1).ok_or_else(|| missing_value(line_no, "ipv6"))?;
    let network = Ipv6Net::from_str(value)
        .map_err(|e| RuleParseError::new(line_no, format!("invalid ipv6 prefix '{value}': {e}")))?;
    let mode_token = tokens
        .get(2)
        .ok_or_else(|| RuleParseError::new(line_no, "ipv6 rule requires a mode (ms|ls)"))?;
    let mode = MatchMode::from_token(mode_token)
        .ok_or_else(|| RuleParseError::new(line_no, format!("invalid mode '{mode_token}', expected ms|ls")))?;
    raw.v6_prefixes.push(PrefixRule6 { network, mode });
    Ok(())
}

fn parse_as_line(line_no: usize, tokens: &[&str], raw: &mut RawRules) -> Result<(), RuleParseError> {
    let value = *tokens.get(1).ok_or_else(|| missing_value(line_no, "as"))?;
    let asn: u32 = value
        .parse()
        .map_err(|_| RuleParseError::new(line_no, format!("invalid AS number '{value}'")))?;
    if asn == 0 || asn > 65535 {
        return Err(RuleParseError::new(
            line_no,
            format!("AS number {asn} out of range (1..=65535)"),
        ));
    }
    raw.as_numbers.push(asn);
    Ok(())
}

fn missing_value(line_no: usize, kind: &str) -> RuleParseError {
    RuleParseError::new(line_no, format!("'{kind}' rule is missing a value"))
}
