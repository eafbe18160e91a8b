/*!
The compiled rule set and match algorithm, spec §4.1.

Grounded on `bgpkit-parser`'s `parser/filter.rs`: the `Filter`/`PrefixMatchType`
split there (a match-mode enum plus a pure `prefix_match` predicate comparing
`addr()`/`broadcast()` ranges) generalizes directly to our `MatchMode` and the
`less_specific_match`/`more_specific_match` helpers below — the teacher
filters one `BgpElem` against one `Filter` at a time; we filter one
[`ExtractedUpdate`] against an indexed rule set.
*/
use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnet::{Contains, Ipv4Net, Ipv6Net};

use crate::error::RuleParseError;
use crate::filter::rules::{parse_rule_file, RawRules};
use crate::filter::trie::Trie4;
use crate::model::{ExtractedUpdate, MatchMode, PrefixRule4, PrefixRule6};

/// The compiled filter store: immutable after [`FilterStore::load`] returns,
/// safe to share by read-only reference across concurrent filter workers.
#[derive(Default)]
pub struct FilterStore {
    v4_rules: Vec<PrefixRule4>,
    v6_rules: Vec<PrefixRule6>,
    as_set: HashSet<u32>,
    host_addrs: HashSet<Ipv4Addr>,
    v4_index: Trie4,
}

impl FilterStore {
    pub fn new() -> Self {
        FilterStore::default()
    }

    /// Idempotent: clears all prior state.
    pub fn init(&mut self) {
        *self = FilterStore::default();
    }

    /// Load and compile a rule file. Fatal parse errors name the offending
    /// line, per spec §4.1 / §7.
    pub fn load(&mut self, rules_path: &str) -> Result<(), RuleParseError> {
        let raw = parse_rule_file(rules_path)?;
        self.init();
        self.install(raw);
        Ok(())
    }

    fn install(&mut self, raw: RawRules) {
        self.as_set = raw.as_numbers.into_iter().collect();
        self.host_addrs = raw.v4_hosts.into_iter().collect();

        let mut v4_rules = raw.v4_prefixes;
        dedup_rules4(&mut v4_rules);
        let mut v6_rules = raw.v6_prefixes;
        dedup_rules6(&mut v6_rules);

        self.v4_rules = v4_rules;
        self.v6_rules = v6_rules;
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.v4_index.clear();
        for (idx, rule) in self.v4_rules.iter().enumerate() {
            let octets = rule.network.network().octets();
            self.v4_index.insert(octets, rule.network.prefix_len(), idx);
        }
    }

    /// Merge adjacent more-specific sibling rules into their common parent,
    /// repeatedly, until a full pass finds no mergeable pair. Match-preserving
    /// per spec §4.1 / testable property 3.
    ///
    /// Delegates to `ipnet`'s own `aggregate` rather than the source's O(n^2)
    /// splice loop the Design Notes flag for replacement —
    /// `ipnet::Ipv4Net::aggregate`/`Ipv6Net::aggregate` already implement the
    /// canonical merge. Only more-specific rules are aggregated: merging two
    /// less-specific siblings into their common parent widens the match
    /// (an update exactly as specific as a sibling, but not as specific as
    /// the merged parent, would stop matching), so less-specific rules are
    /// left exactly as loaded.
    pub fn condense(&mut self) {
        self.v4_rules = condense_v4(&self.v4_rules);
        self.v6_rules = condense_v6(&self.v6_rules);
        self.rebuild_index();
    }

    /// Test-only constructor that bypasses the rule-file parser.
    #[cfg(test)]
    pub fn with_v4_rules(rules: Vec<PrefixRule4>) -> Self {
        let mut store = FilterStore::new();
        store.v4_rules = rules;
        dedup_rules4(&mut store.v4_rules);
        store.rebuild_index();
        store
    }

    pub fn count_v4(&self) -> usize {
        self.v4_rules.len()
    }

    pub fn count_v6(&self) -> usize {
        self.v6_rules.len()
    }

    pub fn count_as(&self) -> usize {
        self.as_set.len()
    }

    pub fn count_host(&self) -> usize {
        self.host_addrs.len()
    }

    pub fn total_rules(&self) -> usize {
        self.count_v4() + self.count_v6() + self.count_as() + self.count_host()
    }

    /// The full match algorithm, spec §4.1: true if any of the four axes
    /// fires.
    pub fn matches(&self, record: &ExtractedUpdate) -> bool {
        if let Some(asn) = record.terminal_as {
            if self.as_set.contains(&asn) {
                return true;
            }
        }

        for p in &record.v4_prefixes {
            if self.matches_v4_rule(*p) {
                return true;
            }
        }

        for p in &record.v4_prefixes {
            for host in &self.host_addrs {
                if p.contains(host) {
                    return true;
                }
            }
        }

        for p in &record.v6_prefixes {
            if self.matches_v6_rule(*p) {
                return true;
            }
        }

        false
    }

    fn matches_v4_rule(&self, query: Ipv4Net) -> bool {
        let candidates = self
            .v4_index
            .candidates(query.network().octets(), query.prefix_len());
        candidates
            .iter()
            .any(|&idx| mode_match4(self.v4_rules[idx], query))
    }

    fn matches_v6_rule(&self, query: Ipv6Net) -> bool {
        self.v6_rules
            .iter()
            .any(|rule| mode_match6(*rule, query))
    }
}

fn mode_match4(rule: PrefixRule4, query: Ipv4Net) -> bool {
    match rule.mode {
        MatchMode::LessSpecific => {
            query.prefix_len() <= rule.network.prefix_len()
                && rule.network.addr() >= query.addr()
                && rule.network.broadcast() <= query.broadcast()
        }
        MatchMode::MoreSpecific => {
            query.prefix_len() >= rule.network.prefix_len()
                && rule.network.addr() <= query.addr()
                && rule.network.broadcast() >= query.broadcast()
        }
    }
}

fn mode_match6(rule: PrefixRule6, query: Ipv6Net) -> bool {
    match rule.mode {
        MatchMode::LessSpecific => {
            query.prefix_len() <= rule.network.prefix_len()
                && rule.network.addr() >= query.addr()
                && rule.network.broadcast() <= query.broadcast()
        }
        MatchMode::MoreSpecific => {
            query.prefix_len() >= rule.network.prefix_len()
                && rule.network.addr() <= query.addr()
                && rule.network.broadcast() >= query.broadcast()
        }
    }
}

fn dedup_rules4(rules: &mut Vec<PrefixRule4>) {
    let mut seen = HashSet::new();
    rules.retain(|r| seen.insert((r.network, r.mode == MatchMode::MoreSpecific)));
}

fn dedup_rules6(rules: &mut Vec<PrefixRule6>) {
    let mut seen = HashSet::new();
    rules.retain(|r| seen.insert((r.network, r.mode == MatchMode::MoreSpecific)));
}

fn condense_v4(rules: &[PrefixRule4]) -> Vec<PrefixRule4> {
    let (more, less): (Vec<_>, Vec<_>) = rules
        .iter()
        .partition(|r| r.mode == MatchMode::MoreSpecific);
    let more_nets: Vec<Ipv4Net> = more.iter().map(|r| r.network).collect();

    let mut out: Vec<PrefixRule4> = Ipv4Net::aggregate(&more_nets)
        .into_iter()
        .map(|network| PrefixRule4 {
            network,
            mode: MatchMode::MoreSpecific,
        })
        .collect();
    out.extend(less.into_iter().map(|r| PrefixRule4 {
        network: r.network,
        mode: MatchMode::LessSpecific,
    }));
    out
}

fn condense_v6(rules: &[PrefixRule6]) -> Vec<PrefixRule6> {
    let (more, less): (Vec<_>, Vec<_>) = rules
        .iter()
        .partition(|r| r.mode == MatchMode::MoreSpecific);
    let more_nets: Vec<Ipv6Net> = more.iter().map(|r| r.network).collect();

    let mut out: Vec<PrefixRule6> = Ipv6Net::aggregate(&more_nets)
        .into_iter()
        .map(|network| PrefixRule6 {
            network,
            mode: MatchMode::MoreSpecific,
        })
        .collect();
    out.extend(less.into_iter().map(|r| PrefixRule6 {
        network: r.network,
        mode: MatchMode::LessSpecific,
    }));
    out
}
