//! TOML store backed by `toml_edit`, so comments and layout of an existing
//! file survive a load/save cycle.

use std::io::{Read, Write};

use chrono::DateTime;
use toml_edit::{Array, Decor, DocumentMut, InlineTable, Item, RawString, Table};

use crate::error::CfgError;
use crate::store::Store;
use crate::types::Separators;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct TomlStore {
    doc: DocumentMut,
    header: String,
}

impl TomlStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn item(&self, key: &[String]) -> Option<&Item> {
        let mut item = self.doc.as_item();
        for segment in key {
            item = item.get(segment.as_str())?;
        }
        Some(item).filter(|item| !item.is_none())
    }
}

/// `# `-prefixed comment lines.
fn comment_block(text: &str) -> String {
    text.lines().map(|line| format!("# {line}\n")).collect()
}

/// Replace an empty or previously generated prefix with `comment`. Comments
/// the user wrote stay as they are.
fn refresh_comment(decor: &mut Decor, comment: &str) {
    let existing = decor.prefix().and_then(RawString::as_str).unwrap_or_default();
    if existing.trim().is_empty() || existing.ends_with(comment) {
        decor.set_prefix(comment);
    }
}

fn from_toml(value: &toml_edit::Value) -> Value {
    match value {
        toml_edit::Value::String(s) => Value::Str(s.value().clone()),
        toml_edit::Value::Integer(i) => Value::Int(*i.value()),
        toml_edit::Value::Float(f) => Value::Float(*f.value()),
        toml_edit::Value::Boolean(b) => Value::Bool(*b.value()),
        toml_edit::Value::Datetime(d) => {
            let text = d.value().to_string();
            match DateTime::parse_from_rfc3339(&text) {
                Ok(t) => Value::Time(t),
                Err(_) => Value::Str(text),
            }
        }
        toml_edit::Value::Array(items) => Value::List(items.iter().map(from_toml).collect()),
        toml_edit::Value::InlineTable(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (k.to_string(), from_toml(v)))
                .collect(),
        ),
    }
}

fn from_table(table: &Table) -> Value {
    Value::Map(
        table
            .iter()
            .filter_map(|(k, item)| Some((k.to_string(), from_item(item)?)))
            .collect(),
    )
}

fn from_item(item: &Item) -> Option<Value> {
    match item {
        Item::None => None,
        Item::Value(value) => Some(from_toml(value)),
        Item::Table(table) => Some(from_table(table)),
        Item::ArrayOfTables(tables) => Some(Value::List(tables.iter().map(from_table).collect())),
    }
}

fn to_toml(value: &Value) -> toml_edit::Value {
    match value {
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::Uint(u) => match i64::try_from(*u) {
            Ok(i) => i.into(),
            Err(_) => u.to_string().into(),
        },
        Value::Float(f) => (*f).into(),
        Value::Str(s) => s.as_str().into(),
        Value::Duration(_) => value.to_text(Separators::default()).into(),
        Value::Time(t) => match t.to_rfc3339().parse::<toml_edit::Datetime>() {
            Ok(d) => d.into(),
            Err(_) => t.to_rfc3339().into(),
        },
        Value::List(items) => {
            let mut array = Array::new();
            for item in items {
                array.push(to_toml(item));
            }
            array.into()
        }
        Value::Map(entries) => {
            let mut table = InlineTable::new();
            for (k, v) in entries {
                table.insert(k.as_str(), to_toml(v));
            }
            table.into()
        }
    }
}

/// Maps become sub-tables, everything else a plain value.
fn to_item(value: &Value) -> Item {
    match value {
        Value::Map(entries) => {
            let mut table = Table::new();
            for (k, v) in entries {
                table.insert(k, to_item(v));
            }
            Item::Table(table)
        }
        other => Item::Value(to_toml(other)),
    }
}

/// Make `item` a standard table, keeping the entries of an inline table.
fn ensure_table(item: &mut Item) -> Result<&mut Table, CfgError> {
    if !item.is_table() {
        let table = match std::mem::take(item) {
            Item::Value(toml_edit::Value::InlineTable(inline)) => inline.into_table(),
            _ => Table::new(),
        };
        *item = Item::Table(table);
    }
    item.as_table_mut().ok_or(CfgError::Store {
        format: "toml",
        reason: "expected a table".into(),
    })
}

impl Store for TomlStore {
    fn tag(&self) -> &'static str {
        "toml"
    }

    fn has(&self, key: &[String]) -> bool {
        self.item(key).is_some()
    }

    fn get(&self, key: &[String]) -> Result<Option<Value>, CfgError> {
        Ok(self.item(key).and_then(from_item))
    }

    fn set(&mut self, key: &[String], value: &Value) -> Result<(), CfgError> {
        let Some((leaf, parents)) = key.split_last() else {
            return Err(CfgError::Store {
                format: "toml",
                reason: "empty key".into(),
            });
        };
        let mut table = self.doc.as_table_mut();
        for segment in parents {
            let item = table
                .entry(segment)
                .or_insert(Item::Table(Table::new()));
            table = ensure_table(item)?;
        }
        table.insert(leaf, to_item(value));
        Ok(())
    }

    fn set_comment(&mut self, key: &[String], text: &str) -> Result<(), CfgError> {
        if text.is_empty() {
            return Ok(());
        }
        let comment = comment_block(text);
        let Some((leaf, parents)) = key.split_last() else {
            self.header = comment;
            return Ok(());
        };
        let mut table = self.doc.as_table_mut();
        for segment in parents {
            match table.get_mut(segment).and_then(Item::as_table_mut) {
                Some(inner) => table = inner,
                None => return Ok(()),
            }
        }
        if let Some(section) = table.get_mut(leaf).and_then(Item::as_table_mut) {
            refresh_comment(section.decor_mut(), &comment);
        } else if let Some(mut k) = table.key_mut(leaf) {
            refresh_comment(k.leaf_decor_mut(), &comment);
        }
        Ok(())
    }

    fn read_from(&mut self, reader: &mut dyn Read) -> Result<(), CfgError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.doc = text.parse().map_err(|e: toml_edit::TomlError| CfgError::Store {
            format: "toml",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<(), CfgError> {
        let body = self.doc.to_string();
        if !body.starts_with(&self.header) {
            writer.write_all(self.header.as_bytes())?;
        }
        writer.write_all(body.as_bytes())?;
        Ok(())
    }
}
