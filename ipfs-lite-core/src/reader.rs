//! Path lookup and enumeration over decoded IPLD nodes.
//!
//! Walks the IPLD data model directly, so any codec that decodes to [`Ipld`]
//! gets path resolution for free.

use std::collections::BTreeMap;

use cid::Cid;
use ipld_core::ipld::Ipld;

use crate::{Error, Result};

/// One hop of path resolution inside a single block.
///
/// When `value` is a link, `remainder_path` names what is left to resolve
/// inside the linked block. Otherwise the remainder is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveResult {
    pub value: Ipld,
    pub remainder_path: String,
}

impl ResolveResult {
    /// The CID to continue resolution in, if the value is a link.
    pub fn link(&self) -> Option<&Cid> {
        match &self.value {
            Ipld::Link(cid) => Some(cid),
            _ => None,
        }
    }
}

/// Codec-provided view over one decoded node.
pub trait NodeReader: Send {
    /// Walks `path` until its end or the first link.
    fn get(&self, path: &str) -> Result<ResolveResult>;

    /// Every link in the node, paired with its path.
    fn links(&self) -> Vec<(String, Cid)>;

    /// Every path the node exposes, depth first, not crossing links.
    fn tree(&self) -> Vec<String>;
}

/// Reader over an in-memory [`Ipld`] value.
#[derive(Debug, Clone)]
pub struct IpldReader {
    node: Ipld,
}

impl IpldReader {
    pub fn new(node: Ipld) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Ipld {
        &self.node
    }

    fn walk(&self, visit: &mut impl FnMut(&str, &Ipld)) {
        walk(&self.node, "", visit);
    }
}

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Map entries in DAG-CBOR canonical order: shorter keys first, then bytewise.
fn canonical_entries(map: &BTreeMap<String, Ipld>) -> Vec<(&String, &Ipld)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    entries
}

fn child<'a>(node: &'a Ipld, segment: &str) -> Option<&'a Ipld> {
    match node {
        Ipld::Map(map) => map.get(segment),
        Ipld::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
        _ => None,
    }
}

fn walk(node: &Ipld, prefix: &str, visit: &mut impl FnMut(&str, &Ipld)) {
    let mut step = |key: &str, value: &Ipld| {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        };
        visit(&path, value);
        if matches!(value, Ipld::Map(_) | Ipld::List(_)) {
            walk(value, &path, visit);
        }
    };
    match node {
        Ipld::Map(map) => {
            for (key, value) in canonical_entries(map) {
                step(key, value);
            }
        }
        Ipld::List(list) => {
            for (i, value) in list.iter().enumerate() {
                step(&i.to_string(), value);
            }
        }
        _ => {}
    }
}

impl NodeReader for IpldReader {
    fn get(&self, path: &str) -> Result<ResolveResult> {
        let parts: Vec<&str> = segments(path).collect();
        let mut node = &self.node;
        for (i, segment) in parts.iter().enumerate() {
            node = child(node, segment).ok_or_else(|| Error::Path {
                segment: segment.to_string(),
                path: path.to_string(),
            })?;
            if let Ipld::Link(cid) = node {
                return Ok(ResolveResult {
                    value: Ipld::Link(*cid),
                    remainder_path: parts[i + 1..].join("/"),
                });
            }
        }
        Ok(ResolveResult {
            value: node.clone(),
            remainder_path: String::new(),
        })
    }

    fn links(&self) -> Vec<(String, Cid)> {
        let mut links = Vec::new();
        self.walk(&mut |path, value| {
            if let Ipld::Link(cid) = value {
                links.push((path.to_string(), *cid));
            }
        });
        links
    }

    fn tree(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.walk(&mut |path, _| paths.push(path.to_string()));
        paths
    }
}
