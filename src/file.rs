//! Config file source.
//!
//! The record's [`FromIo`] capability supplies the streams and a store for
//! the file format. Loading works in three steps:
//!
//! 1. **Read**: with a read stream the store is decoded from it. Without
//!    one, the store starts empty and is filled with every option's current
//!    value, so saving produces a complete file on first run.
//! 2. **Merge**: options missing from an existing store are added with
//!    their current value; options present and still waiting for a value
//!    are assigned from the store.
//! 3. **Save**: after the values were assigned, help texts are attached as
//!    comments and the store is written to the save stream, if any.
//!
//! Fields skipped by the store's tag namespace (`Key::format(tag, "-")`) are
//! never read or written.

use tracing::debug;

use crate::error::{CfgError, Origin};
use crate::loader::Assignment;
use crate::names::NameIndex;
use crate::record::FromIo;
use crate::store::{SeparatorLookup, Store};
use crate::tree::{FieldNode, Tree};
use crate::types::Kind;

/// A decoded store and the values it provides.
pub(crate) struct FileMerge {
    store: Box<dyn Store>,
    pub(crate) values: Vec<Assignment>,
}

pub(crate) fn read(
    io: &mut dyn FromIo,
    tree: &Tree,
    index: &NameIndex,
    group: char,
) -> Result<FileMerge, CfgError> {
    // The lookup is keyed on store keys, which depend on the store's tags.
    let format = io.store(SeparatorLookup::default()).tag();
    let mut store = io.store(SeparatorLookup::build(tree, index, format, group));

    let fresh = match io.load()? {
        Some(mut reader) => {
            store.read_from(&mut *reader)?;
            false
        }
        None => true,
    };
    debug!(format, fresh, "config store opened");

    let mut values = Vec::new();
    for (id, entry) in index.entries().iter().enumerate() {
        let Some(key) = tree.store_key(&entry.path, format) else {
            continue;
        };
        if fresh || !store.has(&key) {
            if let Some(value) = tree.lookup(&entry.path).and_then(|n| n.value.as_ref()) {
                store.set(&key, value)?;
            }
            continue;
        }
        if !index.is_outstanding(id) {
            continue;
        }
        if let Some(value) = store.get(&key)? {
            values.push(Assignment {
                id,
                value,
                origin: Origin::File,
            });
        }
    }
    Ok(FileMerge { store, values })
}

fn add_comments(
    store: &mut dyn Store,
    nodes: &[FieldNode],
    tree: &Tree,
    path: &mut Vec<String>,
) -> Result<(), CfgError> {
    for node in nodes {
        if node.kind == Kind::Subcommand {
            continue;
        }
        path.push(node.name.clone());
        if !node.usage.is_empty() && !node.inline {
            if let Some(key) = tree.store_key(path, store.tag()) {
                if store.has(&key) || node.kind == Kind::Group {
                    store.set_comment(&key, &node.usage)?;
                }
            }
        }
        add_comments(store, &node.children, tree, path)?;
        path.pop();
    }
    Ok(())
}

impl FileMerge {
    /// Attach help texts and write the store to the save stream.
    pub(crate) fn save(
        mut self,
        io: &mut dyn FromIo,
        tree: &Tree,
        header: &str,
    ) -> Result<(), CfgError> {
        self.store.set_comment(&[], header)?;
        add_comments(self.store.as_mut(), &tree.nodes, tree, &mut Vec::new())?;
        let Some(mut writer) = io.save()? else {
            return Ok(());
        };
        self.store.write_to(&mut *writer)?;
        writer.flush()?;
        debug!(format = self.store.tag(), "config store saved");
        Ok(())
    }
}
