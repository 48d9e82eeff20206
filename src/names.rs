//! Flattened option names and the set of options still waiting for a value.
//!
//! Each leaf of a tree level gets one external name: the names of its
//! enclosing non-inline groups and its own name, joined by the group
//! separator (`log-level`). Names are compared ignoring case and must be
//! unique. A subcommand claims its own name at the level that holds it;
//! its subtree is indexed when its own load runs.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::CfgError;
use crate::tree::{FieldNode, Tree};
use crate::types::{Kind, Separators};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Segments joined by the group separator, original case.
    pub name: String,
    /// Node names from the tree root, inline groups included.
    pub path: Vec<String>,
    /// Segments of the external name, inline groups omitted.
    pub segments: Vec<String>,
    pub separators: Separators,
}

impl Entry {
    pub fn joined(&self, sep: char) -> String {
        self.segments.join(sep.to_string().as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
    outstanding: BTreeSet<usize>,
}

struct IndexBuilder {
    sep: char,
    claimed: HashSet<String>,
    index: NameIndex,
}

impl IndexBuilder {
    fn claim(&mut self, segments: &[String]) -> Result<String, CfgError> {
        let name = segments.join(self.sep.to_string().as_str());
        if !self.claimed.insert(name.to_lowercase()) {
            return Err(CfgError::DuplicateName(name));
        }
        Ok(name)
    }

    fn walk(
        &mut self,
        nodes: &[FieldNode],
        path: &mut Vec<String>,
        segments: &mut Vec<String>,
    ) -> Result<(), CfgError> {
        for node in nodes {
            path.push(node.name.clone());
            match node.kind {
                Kind::Subcommand => {
                    segments.push(node.name.clone());
                    self.claim(segments)?;
                    segments.pop();
                }
                Kind::Group if node.inline => self.walk(&node.children, path, segments)?,
                Kind::Group => {
                    segments.push(node.name.clone());
                    self.claim(segments)?;
                    self.walk(&node.children, path, segments)?;
                    segments.pop();
                }
                _ => {
                    segments.push(node.name.clone());
                    let name = self.claim(segments)?;
                    let id = self.index.entries.len();
                    self.index.by_name.insert(name.to_lowercase(), id);
                    self.index.outstanding.insert(id);
                    self.index.entries.push(Entry {
                        name,
                        path: path.clone(),
                        segments: segments.clone(),
                        separators: node.separators,
                    });
                    segments.pop();
                }
            }
            path.pop();
        }
        Ok(())
    }
}

impl NameIndex {
    /// Index the leaves of `tree`, joining group names with `sep`.
    pub fn build(tree: &Tree, sep: char) -> Result<Self, CfgError> {
        let mut builder = IndexBuilder {
            sep,
            claimed: HashSet::new(),
            index: NameIndex::default(),
        };
        builder.walk(&tree.nodes, &mut Vec::new(), &mut Vec::new())?;
        Ok(builder.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, id: usize) -> &Entry {
        &self.entries[id]
    }

    /// Look up a flattened name, ignoring case.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Entries no source has assigned yet, in tree order.
    pub fn outstanding(&self) -> Vec<usize> {
        self.outstanding.iter().copied().collect()
    }

    pub fn is_outstanding(&self, id: usize) -> bool {
        self.outstanding.contains(&id)
    }

    pub fn resolve(&mut self, id: usize) {
        self.outstanding.remove(&id);
    }
}
