//! A permissive walker over an LDAP `Filter`'s BER encoding.
//!
//! A fully schema-typed `Filter` decoder needs the whole substring-choice
//! and extensible-match machinery from RFC 4511; this instead extracts a
//! boolean tree of plain-text tokens good enough for substring matching
//! against a handful of fields, and falls back to "matches everything"
//! whenever the input doesn't look like a filter it understands. Clients
//! sending filters outside this subset still get a usable directory rather
//! than an empty result set.

use ldap_ber::{Tag, TagClass};

use crate::model::DirectoryEntry;

const MAX_FILTER_DEPTH: usize = 20;
const MAX_FILTER_NODES: usize = 200;

#[derive(Debug, Clone, PartialEq)]
enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Present,
    Tokens(Vec<String>),
}

struct Budget {
    depth: usize,
    nodes: usize,
}

impl Budget {
    fn enter(&mut self) -> Result<(), ()> {
        self.nodes += 1;
        if self.nodes > MAX_FILTER_NODES {
            return Err(());
        }
        self.depth += 1;
        if self.depth > MAX_FILTER_DEPTH {
            return Err(());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Decode raw filter bytes into a boolean tree, failing open to `Present`
/// (match-everything) on any parse error, depth/node overflow, or input
/// that doesn't resemble a `Filter` at all.
fn parse_filter_bytes(data: &[u8]) -> FilterNode {
    ldap_ber::parse_tag(data)
        .ok()
        .and_then(|(_, tag)| {
            let mut budget = Budget { depth: 0, nodes: 0 };
            build_node(&tag, &mut budget).ok()
        })
        .unwrap_or(FilterNode::Present)
}

fn build_node(tag: &Tag, budget: &mut Budget) -> Result<FilterNode, ()> {
    budget.enter()?;
    let node = match (tag.class, tag.id) {
        (TagClass::Universal, 16) => universal_sequence_node(tag),
        (TagClass::Context, 0) => FilterNode::And(child_nodes(tag, budget)?),
        (TagClass::Context, 1) => FilterNode::Or(child_nodes(tag, budget)?),
        (TagClass::Context, 2) => {
            let first = tag.children().and_then(|c| c.first()).ok_or(())?;
            FilterNode::Not(Box::new(build_node(first, budget)?))
        }
        (TagClass::Context, 3) => equality_match_node(tag),
        (TagClass::Context, 4) => substrings_node(tag),
        (TagClass::Context, 7) => FilterNode::Present,
        _ => FilterNode::Present,
    };
    budget.leave();
    Ok(node)
}

fn child_nodes(tag: &Tag, budget: &mut Budget) -> Result<Vec<FilterNode>, ()> {
    tag.children()
        .unwrap_or(&[])
        .iter()
        .map(|child| build_node(child, budget))
        .collect()
}

/// `equalityMatch [3] AttributeValueAssertion`, tag implicit so this is a
/// two-element constructed tag: `{ type, value }`. Only the value is kept.
fn equality_match_node(tag: &Tag) -> FilterNode {
    let tokens = tag
        .children()
        .and_then(|c| c.get(1))
        .and_then(Tag::as_slice)
        .map(decode_token)
        .filter(|t| !t.is_empty())
        .into_iter()
        .collect();
    FilterNode::Tokens(tokens)
}

/// `substrings [4] SubstringFilter`, implicit tag over `{ type, substrings }`
/// where `substrings` is itself a SEQUENCE of context-tagged
/// initial/any/final pieces.
fn substrings_node(tag: &Tag) -> FilterNode {
    let tokens = tag
        .children()
        .and_then(|c| c.get(1))
        .and_then(Tag::children)
        .map(|pieces| {
            pieces
                .iter()
                .filter(|p| p.class == TagClass::Context)
                .filter_map(Tag::as_slice)
                .map(decode_token)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    FilterNode::Tokens(tokens)
}

/// The filter can also carry a bare `AttributeValueAssertion` or
/// `SubstringFilter` as a plain universal SEQUENCE (tag 16), without a
/// surrounding context tag — seen when a node is reached recursively after
/// unwrapping an AND/OR list built from such elements.
fn universal_sequence_node(tag: &Tag) -> FilterNode {
    let Some(children) = tag.children() else {
        return FilterNode::Present;
    };
    if children.len() != 2 {
        return FilterNode::Present;
    }
    if let Some(pieces) = children[1].children() {
        let tokens: Vec<String> = pieces
            .iter()
            .filter(|p| p.class == TagClass::Context)
            .filter_map(Tag::as_slice)
            .map(decode_token)
            .filter(|t| !t.is_empty())
            .collect();
        if !tokens.is_empty() {
            return FilterNode::Tokens(tokens);
        }
    }
    match children[1].as_slice().map(decode_token) {
        Some(t) if !t.is_empty() => FilterNode::Tokens(vec![t]),
        _ => FilterNode::Present,
    }
}

fn decode_token(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn match_filter(entry: &DirectoryEntry, node: &FilterNode) -> bool {
    match node {
        FilterNode::And(children) => children.iter().all(|c| match_filter(entry, c)),
        FilterNode::Or(children) => children.iter().any(|c| match_filter(entry, c)),
        FilterNode::Not(child) => !match_filter(entry, child),
        FilterNode::Present => true,
        FilterNode::Tokens(tokens) => tokens.iter().all(|t| token_matches(entry, t)),
    }
}

fn token_matches(entry: &DirectoryEntry, token: &str) -> bool {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return true;
    }
    search_blob(entry).contains(&token)
}

fn search_blob(entry: &DirectoryEntry) -> String {
    format!("{} {} {}", entry.cn, entry.telephone_number, entry.link).to_lowercase()
}

/// Evaluate `filter_bytes` against `entries` in order, stopping once
/// `max_results` matches have been collected.
pub fn filter_entries(
    entries: &[DirectoryEntry],
    filter_bytes: &[u8],
    max_results: usize,
) -> Vec<DirectoryEntry> {
    let node = parse_filter_bytes(filter_bytes);
    let mut matched = Vec::new();
    for entry in entries {
        if match_filter(entry, &node) {
            matched.push(entry.clone());
            if matched.len() >= max_results {
                break;
            }
        }
    }
    matched
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(cn: &str, phone: &str, link: &str) -> DirectoryEntry {
        DirectoryEntry {
            uid: "u".to_string(),
            cn: cn.to_string(),
            telephone_number: phone.to_string(),
            dn: "uid=u,dc=local,dc=mesh".to_string(),
            link: link.to_string(),
            object_classes: &["top", "inetOrgPerson"],
        }
    }

    fn present_filter() -> Vec<u8> {
        // [7] present, empty content — attribute description is irrelevant.
        vec![0x87, 0x00]
    }

    fn equality_filter(attr: &str, value: &str) -> Vec<u8> {
        let attr_tlv = ldap_ber::encode::octet_string(TagClass::Universal, 4, attr.as_bytes());
        let value_tlv = ldap_ber::encode::octet_string(TagClass::Universal, 4, value.as_bytes());
        ldap_ber::encode::constructed(TagClass::Context, 3, &[attr_tlv, value_tlv])
    }

    fn and_filter(children: Vec<Vec<u8>>) -> Vec<u8> {
        ldap_ber::encode::constructed(TagClass::Context, 0, &children)
    }

    #[test]
    fn test_present_matches_everything() {
        let entries = vec![entry("A", "sip:1", ""), entry("B", "sip:2", "")];
        let matched = filter_entries(&entries, &present_filter(), 10);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_equality_filter_substring_match() {
        let entries = vec![
            entry("Node A", "sip:10.0.0.1", ""),
            entry("Node B", "sip:10.0.0.2", ""),
        ];
        let filter = equality_filter("cn", "node a");
        let matched = filter_entries(&entries, &filter, 10);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].cn, "Node A");
    }

    #[test]
    fn test_and_of_two_equalities() {
        let entries = vec![
            entry("Node A", "sip:10.0.0.1", ""),
            entry("Node A", "sip:10.0.0.9", ""),
        ];
        let filter = and_filter(vec![
            equality_filter("cn", "node a"),
            equality_filter("telephoneNumber", "10.0.0.1"),
        ]);
        let matched = filter_entries(&entries, &filter, 10);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].telephone_number, "sip:10.0.0.1");
    }

    #[test]
    fn test_malformed_filter_fails_open() {
        let entries = vec![entry("A", "sip:1", ""), entry("B", "sip:2", "")];
        let matched = filter_entries(&entries, &[0xFF, 0xFF, 0xFF], 10);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_max_results_caps_output() {
        let entries = vec![
            entry("A", "sip:1", ""),
            entry("B", "sip:2", ""),
            entry("C", "sip:3", ""),
        ];
        let matched = filter_entries(&entries, &present_filter(), 2);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_exceeding_node_cap_fails_open() {
        // Build a chain of 250 NOT-wrapped PRESENT filters — this exceeds
        // MAX_FILTER_NODES, so the whole filter falls back to PRESENT.
        let mut wrapped = vec![0x87, 0x00];
        for _ in 0..250 {
            wrapped = ldap_ber::encode::constructed(TagClass::Context, 2, &[wrapped]);
        }
        let entries = vec![entry("A", "sip:1", "")];
        let matched = filter_entries(&entries, &wrapped, 10);
        assert_eq!(matched.len(), 1);
    }
}
