//! The record contract.
//!
//! A configuration record is any type implementing [`Config`]. It lists its
//! fields through [`Config::describe`], and opts into sources by returning
//! `Some` from the capability accessors:
//!
//! ```ignore
//! struct Server {
//!     port: u16,
//!     tags: Vec<String>,
//!     log: Log,
//! }
//!
//! impl Config for Server {
//!     fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
//!         fields.field(Key::new("Port"), &mut self.port)?;
//!         fields.field(Key::new("Tags").separators(";"), &mut self.tags)?;
//!         fields.group(Key::new("Log"), &mut self.log)
//!     }
//!
//!     fn usage(&self, name: &str) -> String {
//!         match name {
//!             "Port" => "port to listen on".into(),
//!             _ => String::new(),
//!         }
//!     }
//!
//!     fn flags(&mut self) -> Option<&mut dyn FromFlags> {
//!         Some(self)
//!     }
//! }
//!
//! impl FromFlags for Server {}
//! ```
//!
//! A nested record whose [`Config::flags`] returns `Some` is a subcommand:
//! it is only loaded when its name appears as the first positional argument.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::error::{BoxError, CfgError, CodecError, Origin};
use crate::store::{SeparatorLookup, Store};
use crate::types::{Key, Kind, Separators};
use crate::value::{Field, Value};

/// Receives the fields of a record, in declaration order.
pub trait Visitor {
    fn field(&mut self, key: Key<'_>, value: &mut dyn Field) -> Result<(), CfgError>;
    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError>;
}

/// A configuration record.
pub trait Config {
    /// Register every field with `fields`. Must register the same fields in
    /// the same order on every call.
    fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError>;

    /// Called once all sources have been applied, parents before children.
    fn init(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Help text for the field registered as `name`, or for the record
    /// itself when `name` is empty. Fields without help are not listed.
    fn usage(&self, name: &str) -> String {
        let _ = name;
        String::new()
    }

    fn flags(&mut self) -> Option<&mut dyn FromFlags> {
        None
    }

    fn env(&self) -> Option<&dyn FromEnv> {
        None
    }

    fn io(&mut self) -> Option<&mut dyn FromIo> {
        None
    }
}

/// Command line capability.
pub trait FromFlags {
    /// Single-character alias for the flag `name`.
    fn short(&self, name: &str) -> Option<char> {
        let _ = name;
        None
    }

    /// Called after flags were parsed and no subcommand was selected.
    /// `commands` lists the subcommands selected so far, outermost first;
    /// `args` holds the positional arguments left over.
    fn done(&mut self, commands: &[String], args: &[String]) -> Result<(), BoxError> {
        let _ = (commands, args);
        Ok(())
    }
}

/// Environment variable capability.
pub trait FromEnv {
    /// Variable name for the option `name` (group names joined by the
    /// environment separator). An empty string skips the option.
    fn var(&self, name: &str) -> String;
}

/// Config file capability.
pub trait FromIo {
    /// Stream to read the store from. `None` means there is nothing to read
    /// and the store is built from the current values.
    fn load(&mut self) -> Result<Option<Box<dyn Read>>, CfgError>;

    /// Stream to save the store to. `None` disables saving.
    fn save(&mut self) -> Result<Option<Box<dyn Write>>, CfgError>;

    /// A new, empty store.
    fn store(&self, separators: SeparatorLookup) -> Box<dyn Store>;
}

// -- Records as values -------------------------------------------------------

struct Collect<'a> {
    entries: &'a mut BTreeMap<String, Value>,
}

impl Visitor for Collect<'_> {
    fn field(&mut self, key: Key<'_>, value: &mut dyn Field) -> Result<(), CfgError> {
        if let Some(tag) = key.parse_tag()? {
            self.entries.insert(tag.name.to_string(), value.marshal());
        }
        Ok(())
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        if tag.inline {
            return record.describe(self);
        }
        let mut entries = BTreeMap::new();
        record.describe(&mut Collect {
            entries: &mut entries,
        })?;
        self.entries.insert(tag.name.to_string(), Value::Map(entries));
        Ok(())
    }
}

struct AssignByName<'a> {
    entries: &'a mut BTreeMap<String, Value>,
}

impl AssignByName<'_> {
    fn take(&mut self, name: &str) -> Option<Value> {
        if let Some(value) = self.entries.remove(name) {
            return Some(value);
        }
        let found = self.entries.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()?;
        self.entries.remove(&found)
    }
}

impl Visitor for AssignByName<'_> {
    fn field(&mut self, key: Key<'_>, value: &mut dyn Field) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        let seps = key.parse_separators()?;
        if let Some(v) = self.take(tag.name) {
            value.set(v, seps).map_err(|source| CfgError::Codec {
                key: tag.name.to_string(),
                origin: Origin::File,
                source,
            })?;
        }
        Ok(())
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        if tag.inline {
            return record.describe(self);
        }
        match self.take(tag.name) {
            Some(Value::Map(mut entries)) => record.describe(&mut AssignByName {
                entries: &mut entries,
            }),
            Some(other) => Err(CfgError::Codec {
                key: tag.name.to_string(),
                origin: Origin::File,
                source: CodecError::mismatch("map", &other),
            }),
            None => Ok(()),
        }
    }
}

fn nest(err: CfgError) -> CodecError {
    match err {
        CfgError::Codec { key, source, .. } => CodecError::Nested {
            key,
            source: Box::new(source),
        },
        other => CodecError::CannotUnmarshal {
            text: String::new(),
            reason: other.to_string(),
        },
    }
}

/// Snapshot a record as a map from field names to values.
pub fn record_value(record: &mut dyn Config) -> Result<Value, CodecError> {
    let mut entries = BTreeMap::new();
    record
        .describe(&mut Collect {
            entries: &mut entries,
        })
        .map_err(nest)?;
    Ok(Value::Map(entries))
}

/// Assign a map value to a record, matching keys to field names. Keys match
/// exactly, or else ignoring ASCII case. Fields without a key keep their
/// value; keys without a field are ignored.
pub fn set_record(record: &mut dyn Config, value: Value, seps: Separators) -> Result<(), CodecError> {
    let mut entries = match value {
        Value::Map(entries) => entries,
        Value::Str(text) => crate::value::parse_entries(&text, seps)?
            .into_iter()
            .map(|(k, v)| (k, Value::Str(v)))
            .collect(),
        other => return Err(CodecError::mismatch("map", &other)),
    };
    record
        .describe(&mut AssignByName {
            entries: &mut entries,
        })
        .map_err(nest)
}

/// Use a record type as a leaf value, for example as the item type of a list
/// read from an array of tables. The type must implement `Config`, `Clone`
/// and `Default`.
///
/// ```ignore
/// cfgtree::record_field!(Upstream);
///
/// fields.field(Key::new("Upstreams"), &mut self.upstreams)?; // Vec<Upstream>
/// ```
#[macro_export]
macro_rules! record_field {
    ($($t:ty),* $(,)?) => {$(
        impl $crate::Marshal for $t {
            fn kind(&self) -> $crate::Kind {
                $crate::Kind::Map
            }

            fn marshal(&self) -> $crate::Value {
                let mut copy = ::std::clone::Clone::clone(self);
                $crate::record_value(&mut copy)
                    .unwrap_or_else(|_| $crate::Value::Map(::std::collections::BTreeMap::new()))
            }
        }

        impl $crate::Unmarshal for $t {
            fn unmarshal(
                value: $crate::Value,
                seps: $crate::Separators,
            ) -> ::std::result::Result<Self, $crate::CodecError> {
                let mut record = <$t as ::std::default::Default>::default();
                $crate::set_record(&mut record, value, seps)?;
                Ok(record)
            }
        }
    )*};
}

pub(crate) fn is_subcommand(record: &mut dyn Config) -> bool {
    record.flags().is_some()
}

pub(crate) fn group_kind(record: &mut dyn Config) -> Kind {
    if is_subcommand(record) {
        Kind::Subcommand
    } else {
        Kind::Group
    }
}
