//! JSON store. JSON has no comments, so usage text is not persisted.

use std::io::{Read, Write};

use serde_json::{Map, Value as Json};

use crate::error::CfgError;
use crate::store::Store;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct JsonStore {
    root: Map<String, Json>,
}

impl JsonStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, key: &[String]) -> Option<&Json> {
        let (first, rest) = key.split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }
}

fn store_error(reason: impl ToString) -> CfgError {
    CfgError::Store {
        format: "json",
        reason: reason.to_string(),
    }
}

fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Str(String::new()),
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(from_json).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

impl Store for JsonStore {
    fn tag(&self) -> &'static str {
        "json"
    }

    fn has(&self, key: &[String]) -> bool {
        self.node(key).is_some()
    }

    fn get(&self, key: &[String]) -> Result<Option<Value>, CfgError> {
        Ok(self.node(key).map(from_json))
    }

    fn set(&mut self, key: &[String], value: &Value) -> Result<(), CfgError> {
        let (leaf, parents) = key.split_last().ok_or_else(|| store_error("empty key"))?;
        let mut object = &mut self.root;
        for segment in parents {
            let node = object
                .entry(segment.clone())
                .or_insert_with(|| Json::Object(Map::new()));
            if !node.is_object() {
                *node = Json::Object(Map::new());
            }
            object = node
                .as_object_mut()
                .ok_or_else(|| store_error("expected an object"))?;
        }
        let json = serde_json::to_value(value).map_err(store_error)?;
        object.insert(leaf.clone(), json);
        Ok(())
    }

    fn read_from(&mut self, reader: &mut dyn Read) -> Result<(), CfgError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        if text.trim().is_empty() {
            self.root = Map::new();
            return Ok(());
        }
        match serde_json::from_str(&text).map_err(store_error)? {
            Json::Object(root) => {
                self.root = root;
                Ok(())
            }
            _ => Err(store_error("top level value must be an object")),
        }
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<(), CfgError> {
        serde_json::to_writer_pretty(&mut *writer, &self.root).map_err(store_error)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
