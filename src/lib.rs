//! Typed configuration records filled from command line flags, environment
//! variables and config files.
//!
//! A record is any type implementing [`Config`]. It describes its fields
//! once, and every source works from that description:
//!
//! ```ignore
//! #[derive(Default)]
//! struct App {
//!     port: u16,
//!     log: Log,
//!     file: cfgtree::ConfigFile,
//! }
//!
//! impl Config for App {
//!     fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
//!         fields.field(Key::new("Port").tag("port"), &mut self.port)?;
//!         fields.group(Key::new("Log"), &mut self.log)?;
//!         fields.group(Key::new("File").tag(",inline"), &mut self.file)
//!     }
//!
//!     fn flags(&mut self) -> Option<&mut dyn FromFlags> { Some(self) }
//!     fn io(&mut self) -> Option<&mut dyn FromIo> { Some(&mut self.file) }
//! }
//!
//! let mut app = App { port: 80, ..App::default() };
//! cfgtree::load(&mut app)?;
//! ```
//!
//! # Source precedence
//!
//! ```text
//! Values the record was built with
//!        ↑ overridden by
//! Config file           via Config::io
//!        ↑ overridden by
//! Environment vars      via Config::env
//!        ↑ overridden by
//! Command line flags    via Config::flags
//! ```
//!
//! Sources are applied from the bottom of that list up: flags first, then
//! environment variables, then the config file. An option assigned by one
//! source is skipped by the ones after it, so the environment only fills
//! options no flag set and the file only fills what is still left. A record
//! opts into a source by returning the capability from the matching method;
//! sources it does not opt into are skipped. Init hooks run last.
//!
//! # Names
//!
//! Options are named after their field, joined with the names of their
//! enclosing groups: `Log` and `Level` become the flag `--log-level` and,
//! with the default environment separator, the variable name `Log_Level`
//! handed to [`FromEnv::var`]. Inline groups (`,inline` tag) add no name.
//! Names are compared ignoring case and must be unique, otherwise loading
//! fails with [`CfgError::DuplicateName`].
//!
//! A tag of `-` hides a field from every source. [`Key::format`] renames or
//! hides a field for one store format only (`Key::format("toml", "-")`).
//!
//! # Subcommands
//!
//! A group that returns a flag capability is a subcommand. When the first
//! positional argument matches its name, the subcommand is loaded with the
//! rest of the arguments as a record of its own, and the outer level stops
//! after its flags. See [`Loader`] for the exact order.
//!
//! # Values
//!
//! Fields convert through [`Value`], the common currency of all sources.
//! Scalars, `Vec`, maps, `Option`, durations, timestamps, paths and network
//! addresses are supported out of the box; [`text_field!`] covers any
//! `Display + FromStr` type and [`record_field!`] lets a record act as a
//! single value (for example the items of a list of tables). Lists and maps
//! given as text use CSV with configurable separators.
//!
//! # Config files
//!
//! Four stores ship with the crate: TOML ([`TomlStore`], comment
//! preserving), JSON ([`JsonStore`]), INI ([`IniStore`]) and YAML
//! ([`YamlStore`]). [`ConfigFile`]
//! bundles a path, a backup extension and a save switch into a ready-made
//! inline group. Saving writes every option with its help text as a
//! comment, so the first run produces a documented file.
//!
//! # Error handling
//!
//! Fallible operations return [`CfgError`]. Conversion failures carry the
//! option name and the [`Origin`] of the offending value.

pub mod error;
pub mod types;

mod config_file;
pub mod csv;
pub mod env;
mod file;
mod flags;
mod hooks;
mod ini_store;
mod json_store;
mod loader;
mod names;
mod record;
mod store;
mod toml_store;
mod tree;
mod value;
mod yaml_store;

#[cfg(test)]
mod fixtures;

pub use config_file::{ConfigFile, Format};
pub use error::{BoxError, CfgError, CodecError, Origin};
pub use hooks::usage_of;
pub use ini_store::IniStore;
pub use json_store::JsonStore;
pub use loader::{Loader, UsageHandler, UsageWriter, load, load_args, usage};
pub use record::{Config, FromEnv, FromFlags, FromIo, Visitor, record_value, set_record};
pub use store::{SeparatorLookup, Store};
pub use toml_store::TomlStore;
pub use tree::{FieldNode, Tree};
pub use types::{Key, Kind, LoadOutcome, Separators};
pub use value::{
    Field, Marshal, Unmarshal, Value, parse_bool, parse_duration, parse_float, parse_int,
    parse_time, parse_uint,
};
pub use yaml_store::YamlStore;
