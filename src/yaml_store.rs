//! YAML store of nested mappings. Only the document header survives as a
//! comment; `serde_yaml` keeps no comments on individual keys.

use std::io::{Read, Write};

use serde_yaml::{Mapping, Value as Yaml};

use crate::error::CfgError;
use crate::store::Store;
use crate::types::Separators;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct YamlStore {
    root: Mapping,
    header: String,
}

impl YamlStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, key: &[String]) -> Option<&Yaml> {
        let (first, rest) = key.split_first()?;
        let mut node = self.root.get(first.as_str())?;
        for segment in rest {
            node = node.as_mapping()?.get(segment.as_str())?;
        }
        Some(node)
    }
}

fn store_error(reason: impl ToString) -> CfgError {
    CfgError::Store {
        format: "yaml",
        reason: reason.to_string(),
    }
}

fn key_text(key: &Yaml) -> String {
    match key {
        Yaml::String(s) => s.clone(),
        other => from_yaml(other).to_text(Separators::default()),
    }
}

fn from_yaml(yaml: &Yaml) -> Value {
    match yaml {
        Yaml::Null => Value::Str(String::new()),
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Yaml::String(s) => Value::Str(s.clone()),
        Yaml::Sequence(items) => Value::List(items.iter().map(from_yaml).collect()),
        Yaml::Mapping(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (key_text(k), from_yaml(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => from_yaml(&tagged.value),
    }
}

impl Store for YamlStore {
    fn tag(&self) -> &'static str {
        "yaml"
    }

    fn has(&self, key: &[String]) -> bool {
        self.node(key).is_some()
    }

    fn get(&self, key: &[String]) -> Result<Option<Value>, CfgError> {
        Ok(self.node(key).map(from_yaml))
    }

    fn set(&mut self, key: &[String], value: &Value) -> Result<(), CfgError> {
        let (leaf, parents) = key.split_last().ok_or_else(|| store_error("empty key"))?;
        let mut mapping = &mut self.root;
        for segment in parents {
            if !mapping.get(segment.as_str()).is_some_and(Yaml::is_mapping) {
                mapping.insert(Yaml::String(segment.clone()), Yaml::Mapping(Mapping::new()));
            }
            mapping = mapping
                .get_mut(segment.as_str())
                .and_then(Yaml::as_mapping_mut)
                .ok_or_else(|| store_error("expected a mapping"))?;
        }
        let yaml = serde_yaml::to_value(value).map_err(store_error)?;
        mapping.insert(Yaml::String(leaf.clone()), yaml);
        Ok(())
    }

    fn set_comment(&mut self, key: &[String], text: &str) -> Result<(), CfgError> {
        if key.is_empty() {
            self.header = text.to_string();
        }
        Ok(())
    }

    fn read_from(&mut self, reader: &mut dyn Read) -> Result<(), CfgError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        if text.trim().is_empty() {
            self.root = Mapping::new();
            return Ok(());
        }
        match serde_yaml::from_str(&text).map_err(store_error)? {
            Yaml::Null => {
                self.root = Mapping::new();
                Ok(())
            }
            Yaml::Mapping(root) => {
                self.root = root;
                Ok(())
            }
            _ => Err(store_error("top level value must be a mapping")),
        }
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<(), CfgError> {
        for line in self.header.lines() {
            writeln!(writer, "# {line}")?;
        }
        serde_yaml::to_writer(&mut *writer, &self.root).map_err(store_error)?;
        Ok(())
    }
}
