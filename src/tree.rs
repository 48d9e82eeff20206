//! Snapshot of a record's fields.
//!
//! [`Tree::build`] walks a record through [`Config::describe`] and records,
//! for every field that is not excluded, its external name, shape, current
//! value, separators, help text and store tags. Groups and subcommands carry
//! their children. Adapters plan their work on the tree; values are written
//! back to the record by a separate walk keyed on tree paths.

use std::fmt;

use crate::error::CfgError;
use crate::record::{self, Config, Visitor};
use crate::types::{Key, Kind, Separators};
use crate::value::{Field, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    /// External name: the tag rename if any, else the declared name.
    pub name: String,
    pub kind: Kind,
    /// Current value of a leaf; `None` for groups and subcommands.
    pub value: Option<Value>,
    pub separators: Separators,
    /// The group's fields are merged into its parent's namespace.
    pub inline: bool,
    pub usage: String,
    pub children: Vec<FieldNode>,
    formats: Vec<(String, String)>,
}

impl FieldNode {
    /// Raw tag registered for the store tag namespace `format`.
    pub fn format_tag(&self, format: &str) -> Option<&str> {
        self.formats
            .iter()
            .find(|(f, _)| f == format)
            .map(|(_, tag)| tag.as_str())
    }

    /// The field is kept out of stores using `format`.
    pub fn skipped_by(&self, format: &str) -> bool {
        self.format_tag(format)
            .is_some_and(|tag| tag.split(',').next() == Some("-"))
    }

    /// Key name used by stores using `format`.
    pub fn store_name(&self, format: &str) -> &str {
        match self.format_tag(format).and_then(|tag| tag.split(',').next()) {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

/// The field tree of one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    pub nodes: Vec<FieldNode>,
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<FieldNode>,
}

impl Visitor for TreeBuilder {
    fn field(&mut self, key: Key<'_>, value: &mut dyn Field) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        self.nodes.push(FieldNode {
            name: tag.name.to_string(),
            kind: value.kind(),
            value: Some(value.marshal()),
            separators: key.parse_separators()?,
            // inline only means something for groups
            inline: false,
            usage: String::new(),
            children: Vec::new(),
            formats: formats(&key),
        });
        Ok(())
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        let kind = record::group_kind(record);
        let children = children_of(record)?;
        let usage = if kind == Kind::Subcommand {
            record.usage("")
        } else {
            String::new()
        };
        self.nodes.push(FieldNode {
            name: tag.name.to_string(),
            kind,
            value: None,
            separators: key.parse_separators()?,
            inline: tag.inline,
            usage,
            children,
            formats: formats(&key),
        });
        Ok(())
    }
}

fn formats(key: &Key<'_>) -> Vec<(String, String)> {
    key.formats
        .iter()
        .map(|(f, t)| (f.to_string(), t.to_string()))
        .collect()
}

/// Walk `record` and attach each child's help text, looked up on `record`.
fn children_of(record: &mut dyn Config) -> Result<Vec<FieldNode>, CfgError> {
    let mut builder = TreeBuilder::default();
    record.describe(&mut builder)?;
    let mut nodes = builder.nodes;
    for node in &mut nodes {
        if node.usage.is_empty() {
            node.usage = record.usage(&node.name);
        }
    }
    Ok(nodes)
}

impl Tree {
    pub fn build(record: &mut dyn Config) -> Result<Self, CfgError> {
        Ok(Self {
            nodes: children_of(record)?,
        })
    }

    pub fn lookup(&self, path: &[String]) -> Option<&FieldNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.nodes.iter().find(|n| &n.name == first)?;
        for name in rest {
            node = node.children.iter().find(|n| &n.name == name)?;
        }
        Some(node)
    }

    pub fn lookup_mut(&mut self, path: &[String]) -> Option<&mut FieldNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.nodes.iter_mut().find(|n| &n.name == first)?;
        for name in rest {
            node = node.children.iter_mut().find(|n| &n.name == name)?;
        }
        Some(node)
    }

    /// Direct subcommand child matching `name`, ignoring case.
    pub fn subcommand(&self, name: &str) -> Option<&FieldNode> {
        self.nodes
            .iter()
            .find(|n| n.kind == Kind::Subcommand && n.name.eq_ignore_ascii_case(name))
    }

    pub fn subcommands(&self) -> impl Iterator<Item = &FieldNode> {
        self.nodes.iter().filter(|n| n.kind == Kind::Subcommand)
    }

    /// Store key of the field at `path` for stores using `format`: the store
    /// names along the path, inline groups omitted. `None` when any node on
    /// the path is skipped by the format.
    pub fn store_key(&self, path: &[String], format: &str) -> Option<Vec<String>> {
        let mut key = Vec::with_capacity(path.len());
        let mut nodes = &self.nodes;
        for name in path {
            let node = nodes.iter().find(|n| &n.name == name)?;
            if node.skipped_by(format) {
                return None;
            }
            if !node.inline {
                key.push(node.store_name(format).to_string());
            }
            nodes = &node.children;
        }
        Some(key)
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[FieldNode], depth: usize) -> fmt::Result {
    for node in nodes {
        write!(f, "{:indent$}{} ", "", node.name, indent = depth * 2)?;
        match (&node.value, node.kind) {
            (Some(value), _) => writeln!(f, "= {value}")?,
            (None, Kind::Subcommand) => writeln!(f, "(command)")?,
            (None, _) if node.inline => writeln!(f, "(inline)")?,
            (None, _) => writeln!(f, "(group)")?,
        }
        write_nodes(f, &node.children, depth + 1)?;
    }
    Ok(())
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.nodes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{AppConfig, BadSeparators, BadTag};

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn build_keeps_declaration_order() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        let names: Vec<&str> = tree.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Host", "port", "Debug", "Tags", "Limits", "Timeout", "Log", "File", "start", "stop"]
        );
    }

    #[test]
    fn excluded_fields_are_absent() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        assert!(tree.lookup(&path(&["Secret"])).is_none());
    }

    #[test]
    fn leaves_carry_value_kind_and_usage() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        let port = tree.lookup(&path(&["port"])).unwrap();
        assert_eq!(port.kind, Kind::Scalar);
        assert_eq!(port.value, Some(Value::Uint(80)));
        assert_eq!(port.usage, "port to listen on");

        let tags = tree.lookup(&path(&["Tags"])).unwrap();
        assert_eq!(tags.kind, Kind::List);
        assert_eq!(tags.separators.item, ';');

        let limits = tree.lookup(&path(&["Limits"])).unwrap();
        assert_eq!(limits.kind, Kind::Map);
    }

    #[test]
    fn groups_and_subcommands_are_distinguished() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        let log = tree.lookup(&path(&["Log"])).unwrap();
        assert_eq!(log.kind, Kind::Group);
        assert_eq!(log.children.len(), 2);
        assert_eq!(log.children[0].usage, "log verbosity");

        let file = tree.lookup(&path(&["File"])).unwrap();
        assert!(file.inline);

        let start = tree.subcommand("START").unwrap();
        assert_eq!(start.kind, Kind::Subcommand);
        assert_eq!(start.usage, "start the service");
        assert_eq!(tree.subcommands().count(), 2);
    }

    #[test]
    fn store_key_skips_inline_and_excluded() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        assert_eq!(
            tree.store_key(&path(&["Log", "Level"]), "toml"),
            Some(path(&["Log", "Level"]))
        );
        assert_eq!(tree.store_key(&path(&["File", "Name"]), "toml"), None);
        assert_eq!(
            tree.store_key(&path(&["Timeout"]), "toml"),
            Some(path(&["request_timeout"]))
        );
        assert_eq!(tree.store_key(&path(&["Timeout"]), "json"), Some(path(&["Timeout"])));
    }

    #[test]
    fn unknown_tag_flag_fails_build() {
        let err = Tree::build(&mut BadTag::default()).unwrap_err();
        assert!(matches!(err, CfgError::UnknownTagFlag { ref flag, .. } if flag == "bogus"));
    }

    #[test]
    fn invalid_separators_fail_build() {
        let err = Tree::build(&mut BadSeparators::default()).unwrap_err();
        assert!(matches!(err, CfgError::InvalidSeparators { .. }));
    }

    #[test]
    fn display_lists_every_node() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        let dump = tree.to_string();
        assert!(dump.contains("port = 80"));
        assert!(dump.contains("Log (group)"));
        assert!(dump.contains("  Level = info"));
        assert!(dump.contains("start (command)"));
    }
}
