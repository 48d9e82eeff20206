//! Persisted key/value stores.
//!
//! A store addresses values by key path: the store names of the enclosing
//! non-inline groups followed by the field's own store name. Formats that
//! cannot nest map the path onto whatever they have (INI sections).

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::CfgError;
use crate::names::NameIndex;
use crate::tree::Tree;
use crate::types::{GROUP_SEPARATOR, Separators};
use crate::value::Value;

pub trait Store {
    /// Tag namespace used for per-store field annotations (`"toml"`).
    fn tag(&self) -> &'static str;

    fn has(&self, key: &[String]) -> bool;

    /// Value stored at `key`, in the store's native shape.
    fn get(&self, key: &[String]) -> Result<Option<Value>, CfgError>;

    fn set(&mut self, key: &[String], value: &Value) -> Result<(), CfgError>;

    /// Attach a comment to `key`; the empty key is the whole document.
    fn set_comment(&mut self, key: &[String], text: &str) -> Result<(), CfgError> {
        let _ = (key, text);
        Ok(())
    }

    fn read_from(&mut self, reader: &mut dyn Read) -> Result<(), CfgError>;

    fn write_to(&self, writer: &mut dyn Write) -> Result<(), CfgError>;
}

/// Separators of every field, by store key. Stores that keep values as
/// text use it to render and parse lists and maps.
#[derive(Debug, Clone)]
pub struct SeparatorLookup {
    group: char,
    by_key: HashMap<Vec<String>, Separators>,
}

impl Default for SeparatorLookup {
    fn default() -> Self {
        Self {
            group: GROUP_SEPARATOR,
            by_key: HashMap::new(),
        }
    }
}

impl SeparatorLookup {
    pub(crate) fn build(tree: &Tree, index: &NameIndex, format: &str, group: char) -> Self {
        let by_key = index
            .entries()
            .iter()
            .filter_map(|entry| {
                let key = tree.store_key(&entry.path, format)?;
                Some((key, entry.separators))
            })
            .collect();
        Self { group, by_key }
    }

    /// Separators for `key`; the defaults for unknown keys.
    pub fn get(&self, key: &[String]) -> Separators {
        self.by_key.get(key).copied().unwrap_or_default()
    }

    /// Separator between group names, for stores that flatten key paths.
    pub fn group(&self) -> char {
        self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::AppConfig;

    #[test]
    fn lookup_uses_store_keys() {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        let index = NameIndex::build(&tree, '-').unwrap();
        let lookup = SeparatorLookup::build(&tree, &index, "ini", '.');
        assert_eq!(lookup.get(&["Tags".to_string()]).item, ';');
        assert_eq!(lookup.get(&["missing".to_string()]), Separators::default());
        assert_eq!(lookup.group(), '.');
    }
}
