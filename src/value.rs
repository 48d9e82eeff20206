//! The value codec: conversion between native field types and [`Value`].
//!
//! Every adapter speaks [`Value`]. Flags and environment variables deliver
//! [`Value::Str`], stores deliver whatever their format holds natively, and
//! [`Unmarshal`] turns either into the field's own type. Text parsing follows
//! one set of rules everywhere:
//!
//! - integers accept a base prefix (`0x1f`, `0o17`, `0b101`, `017`);
//! - booleans accept `1 t T TRUE true True` and `0 f F FALSE false False`;
//! - durations use humantime (`1h 30m`), timestamps use RFC 3339;
//! - lists are one CSV record split on the item separator;
//! - maps are a list of entries, each entry a two-item CSV record split on
//!   the key separator.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::csv;
use crate::error::CodecError;
use crate::types::{Kind, Separators};

/// A field value in transit between a record and a source.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Duration(Duration),
    Time(DateTime<FixedOffset>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Uint(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Duration(_) => "duration",
            Value::Time(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Render as the text a flag or environment variable would carry.
    pub fn to_text(&self, seps: Separators) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Duration(d) => humantime::format_duration(*d).to_string(),
            Value::Time(t) => t.to_rfc3339(),
            Value::List(items) => {
                let inner = Separators::default();
                let items: Vec<String> = items.iter().map(|v| v.to_text(inner)).collect();
                csv::write_record(&items, seps.item)
            }
            Value::Map(entries) => {
                let inner = Separators::default();
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| csv::write_record(&[k.clone(), v.to_text(inner)], seps.key))
                    .collect();
                csv::write_record(&entries, seps.item)
            }
        }
    }

    /// Text form of a scalar; `None` for lists and maps.
    fn scalar_text(&self) -> Option<String> {
        match self {
            Value::List(_) | Value::Map(_) => None,
            other => Some(other.to_text(Separators::default())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(Separators::default()))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Duration(_) | Value::Time(_) => {
                serializer.serialize_str(&self.to_text(Separators::default()))
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// -- Text parsers ------------------------------------------------------------

/// Parse a boolean in any of the accepted spellings.
pub fn parse_bool(text: &str) -> Result<bool, CodecError> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(CodecError::ParseBool(text.to_string())),
    }
}

/// Split off a base prefix. Underscores are only allowed after a prefix.
fn radix(digits: &str) -> (u32, String) {
    let lower = digits.get(..2).map(str::to_ascii_lowercase);
    let (radix, body) = match lower.as_deref() {
        Some("0x") => (16, &digits[2..]),
        Some("0o") => (8, &digits[2..]),
        Some("0b") => (2, &digits[2..]),
        _ if digits.len() > 1 && digits.starts_with('0') => (8, &digits[1..]),
        _ => return (10, digits.to_string()),
    };
    (radix, body.replace('_', ""))
}

/// Parse a signed integer, honouring base prefixes.
pub fn parse_int(text: &str) -> Result<i64, CodecError> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, body) = radix(digits);
    Ok(i64::from_str_radix(&format!("{sign}{body}"), radix)?)
}

/// Parse an unsigned integer, honouring base prefixes.
pub fn parse_uint(text: &str) -> Result<u64, CodecError> {
    let (radix, body) = radix(text.strip_prefix('+').unwrap_or(text));
    Ok(u64::from_str_radix(&body, radix)?)
}

pub fn parse_float(text: &str) -> Result<f64, CodecError> {
    Ok(text.trim().parse::<f64>()?)
}

pub fn parse_duration(text: &str) -> Result<Duration, CodecError> {
    Ok(humantime::parse_duration(text)?)
}

pub fn parse_time(text: &str) -> Result<DateTime<FixedOffset>, CodecError> {
    Ok(DateTime::parse_from_rfc3339(text)?)
}

// -- Field capabilities ------------------------------------------------------

/// Conversion of a native value into a [`Value`].
pub trait Marshal {
    fn kind(&self) -> Kind {
        Kind::Scalar
    }

    fn marshal(&self) -> Value;
}

/// Construction of a native value from a [`Value`].
///
/// [`Value::Str`] input is parsed with the rules above; other variants are
/// converted when the conversion is lossless, and rejected otherwise.
pub trait Unmarshal: Sized {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError>;
}

/// A registered leaf field. Implemented for every type that can both
/// marshal and unmarshal itself.
pub trait Field {
    fn kind(&self) -> Kind;
    fn marshal(&self) -> Value;
    fn set(&mut self, value: Value, seps: Separators) -> Result<(), CodecError>;
}

impl<T: Marshal + Unmarshal> Field for T {
    fn kind(&self) -> Kind {
        Marshal::kind(self)
    }

    fn marshal(&self) -> Value {
        Marshal::marshal(self)
    }

    fn set(&mut self, value: Value, seps: Separators) -> Result<(), CodecError> {
        *self = T::unmarshal(value, seps)?;
        Ok(())
    }
}

// -- Scalars -----------------------------------------------------------------

impl Marshal for bool {
    fn marshal(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Unmarshal for bool {
    fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Str(s) => parse_bool(&s),
            other => Err(CodecError::mismatch("bool", &other)),
        }
    }
}

macro_rules! signed_field {
    ($($t:ty),*) => {$(
        impl Marshal for $t {
            fn marshal(&self) -> Value {
                Value::Int(*self as i64)
            }
        }

        impl Unmarshal for $t {
            fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
                let wide = match value {
                    Value::Int(i) => i,
                    Value::Str(s) => parse_int(&s)?,
                    Value::Uint(u) => i64::try_from(u).map_err(|_| CodecError::OutOfRange {
                        value: u.to_string(),
                        target: stringify!($t),
                    })?,
                    other => return Err(CodecError::mismatch(stringify!($t), &other)),
                };
                <$t>::try_from(wide).map_err(|_| CodecError::OutOfRange {
                    value: wide.to_string(),
                    target: stringify!($t),
                })
            }
        }
    )*};
}

macro_rules! unsigned_field {
    ($($t:ty),*) => {$(
        impl Marshal for $t {
            fn marshal(&self) -> Value {
                Value::Uint(*self as u64)
            }
        }

        impl Unmarshal for $t {
            fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
                let wide = match value {
                    Value::Uint(u) => u,
                    Value::Str(s) => parse_uint(&s)?,
                    Value::Int(i) => u64::try_from(i).map_err(|_| CodecError::OutOfRange {
                        value: i.to_string(),
                        target: stringify!($t),
                    })?,
                    other => return Err(CodecError::mismatch(stringify!($t), &other)),
                };
                <$t>::try_from(wide).map_err(|_| CodecError::OutOfRange {
                    value: wide.to_string(),
                    target: stringify!($t),
                })
            }
        }
    )*};
}

signed_field!(i8, i16, i32, i64, isize);
unsigned_field!(u8, u16, u32, u64, usize);

macro_rules! float_field {
    ($($t:ty),*) => {$(
        impl Marshal for $t {
            fn marshal(&self) -> Value {
                Value::Float(f64::from(*self))
            }
        }

        impl Unmarshal for $t {
            fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
                match value {
                    Value::Float(f) => Ok(f as $t),
                    Value::Int(i) => Ok(i as $t),
                    Value::Uint(u) => Ok(u as $t),
                    Value::Str(s) => Ok(parse_float(&s)? as $t),
                    other => Err(CodecError::mismatch(stringify!($t), &other)),
                }
            }
        }
    )*};
}

float_field!(f32, f64);

impl Marshal for String {
    fn marshal(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl Unmarshal for String {
    fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
        let found = value.type_name();
        value.scalar_text().ok_or(CodecError::TypeMismatch {
            expected: "string",
            found,
        })
    }
}

impl Marshal for char {
    fn marshal(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Unmarshal for char {
    fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
        let s = match value {
            Value::Str(s) => s,
            other => return Err(CodecError::mismatch("char", &other)),
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(CodecError::CannotUnmarshal {
                text: s,
                reason: "expected exactly one character".into(),
            }),
        }
    }
}

impl Marshal for PathBuf {
    fn marshal(&self) -> Value {
        Value::Str(self.to_string_lossy().into_owned())
    }
}

impl Unmarshal for PathBuf {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError> {
        String::unmarshal(value, seps).map(PathBuf::from)
    }
}

impl Marshal for Duration {
    fn marshal(&self) -> Value {
        Value::Duration(*self)
    }
}

impl Unmarshal for Duration {
    fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
        match value {
            Value::Duration(d) => Ok(d),
            Value::Str(s) => parse_duration(&s),
            other => Err(CodecError::mismatch("duration", &other)),
        }
    }
}

impl Marshal for DateTime<FixedOffset> {
    fn marshal(&self) -> Value {
        Value::Time(*self)
    }
}

impl Unmarshal for DateTime<FixedOffset> {
    fn unmarshal(value: Value, _: Separators) -> Result<Self, CodecError> {
        match value {
            Value::Time(t) => Ok(t),
            Value::Str(s) => parse_time(&s),
            other => Err(CodecError::mismatch("timestamp", &other)),
        }
    }
}

impl Marshal for DateTime<Utc> {
    fn marshal(&self) -> Value {
        Value::Time(self.fixed_offset())
    }
}

impl Unmarshal for DateTime<Utc> {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError> {
        DateTime::<FixedOffset>::unmarshal(value, seps).map(|t| t.with_timezone(&Utc))
    }
}

/// Implement [`Marshal`] and [`Unmarshal`] for types with a textual form
/// (`Display` + `FromStr`).
///
/// ```ignore
/// cfgtree::text_field!(LogLevel, Color);
/// ```
#[macro_export]
macro_rules! text_field {
    ($($t:ty),* $(,)?) => {$(
        impl $crate::Marshal for $t {
            fn marshal(&self) -> $crate::Value {
                $crate::Value::Str(::std::string::ToString::to_string(self))
            }
        }

        impl $crate::Unmarshal for $t {
            fn unmarshal(
                value: $crate::Value,
                seps: $crate::Separators,
            ) -> ::std::result::Result<Self, $crate::CodecError> {
                let text = <::std::string::String as $crate::Unmarshal>::unmarshal(value, seps)?;
                text.parse::<$t>().map_err(|e| $crate::CodecError::CannotUnmarshal {
                    reason: e.to_string(),
                    text,
                })
            }
        }
    )*};
}

text_field!(IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr);

#[cfg(feature = "url")]
text_field!(url::Url);

#[cfg(feature = "regex")]
text_field!(regex::Regex);

#[cfg(feature = "ipnet")]
text_field!(ipnet::IpNet);

// -- Collections -------------------------------------------------------------

impl<T: Marshal> Marshal for Vec<T> {
    fn kind(&self) -> Kind {
        Kind::List
    }

    fn marshal(&self) -> Value {
        Value::List(self.iter().map(Marshal::marshal).collect())
    }
}

impl<T: Unmarshal> Unmarshal for Vec<T> {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError> {
        let inner = Separators::default();
        match value {
            Value::List(items) => items.into_iter().map(|v| T::unmarshal(v, inner)).collect(),
            Value::Str(text) => csv::read_record(&text, seps.item)?
                .into_iter()
                .map(|item| T::unmarshal(Value::Str(item), inner))
                .collect(),
            Value::Map(_) => Err(CodecError::mismatch("list", &value)),
            scalar => Ok(vec![T::unmarshal(scalar, inner)?]),
        }
    }
}

/// Parse `k1:v1,k2:v2` into raw entries.
pub(crate) fn parse_entries(text: &str, seps: Separators) -> Result<Vec<(String, String)>, CodecError> {
    csv::read_record(text, seps.item)?
        .into_iter()
        .map(|entry| {
            let mut parts = csv::read_record(&entry, seps.key)?;
            if parts.len() != 2 {
                return Err(CodecError::InvalidMapEntry(entry));
            }
            let value = parts.pop().unwrap_or_default();
            let key = parts.pop().unwrap_or_default();
            Ok((key, value))
        })
        .collect()
}

fn unmarshal_entries<K: Unmarshal, V: Unmarshal>(
    value: Value,
    seps: Separators,
) -> Result<Vec<(K, V)>, CodecError> {
    let inner = Separators::default();
    let raw: Vec<(String, Value)> = match value {
        Value::Map(entries) => entries.into_iter().collect(),
        Value::Str(text) => parse_entries(&text, seps)?
            .into_iter()
            .map(|(k, v)| (k, Value::Str(v)))
            .collect(),
        other => return Err(CodecError::mismatch("map", &other)),
    };
    raw.into_iter()
        .map(|(k, v)| Ok((K::unmarshal(Value::Str(k), inner)?, V::unmarshal(v, inner)?)))
        .collect()
}

fn marshal_entries<'a, K: Marshal + 'a, V: Marshal + 'a>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Value {
    Value::Map(
        entries
            .map(|(k, v)| (Marshal::marshal(k).to_text(Separators::default()), Marshal::marshal(v)))
            .collect(),
    )
}

impl<K: Marshal, V: Marshal> Marshal for BTreeMap<K, V> {
    fn kind(&self) -> Kind {
        Kind::Map
    }

    fn marshal(&self) -> Value {
        marshal_entries(self.iter())
    }
}

impl<K: Unmarshal + Ord, V: Unmarshal> Unmarshal for BTreeMap<K, V> {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError> {
        Ok(unmarshal_entries(value, seps)?.into_iter().collect())
    }
}

impl<K: Marshal, V: Marshal> Marshal for HashMap<K, V> {
    fn kind(&self) -> Kind {
        Kind::Map
    }

    fn marshal(&self) -> Value {
        marshal_entries(self.iter())
    }
}

impl<K: Unmarshal + Eq + Hash, V: Unmarshal> Unmarshal for HashMap<K, V> {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError> {
        Ok(unmarshal_entries(value, seps)?.into_iter().collect())
    }
}

/// `None` is the empty string, and the empty string reads back as `None`.
impl<T: Marshal> Marshal for Option<T> {
    fn kind(&self) -> Kind {
        self.as_ref().map_or(Kind::Scalar, Marshal::kind)
    }

    fn marshal(&self) -> Value {
        match self {
            Some(v) => Marshal::marshal(v),
            None => Value::Str(String::new()),
        }
    }
}

impl<T: Unmarshal> Unmarshal for Option<T> {
    fn unmarshal(value: Value, seps: Separators) -> Result<Self, CodecError> {
        match value {
            Value::Str(s) if s.is_empty() => Ok(None),
            other => T::unmarshal(other, seps).map(Some),
        }
    }
}
