//! A ready-made group giving a record a config file.
//!
//! Embed [`ConfigFile`] inline and hand it out from [`Config::io`]:
//!
//! ```ignore
//! fields.group(Key::new("File").tag(",inline"), &mut self.file)?;
//! // ...
//! fn io(&mut self) -> Option<&mut dyn FromIo> {
//!     Some(&mut self.file)
//! }
//! ```
//!
//! This adds three options (`--name`, `--backup`, `--save`), none of which
//! is ever persisted in the file itself.
//!
//! - No name: nothing is read; when saving, the store goes to stdout.
//! - Name set, file missing and saving enabled: first run, the file is
//!   written from the current values.
//! - Backup extension set: an existing file is renamed to
//!   `<name>.<backup>` before being rewritten.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::CfgError;
use crate::ini_store::IniStore;
use crate::json_store::JsonStore;
use crate::record::{Config, FromIo, Visitor};
use crate::store::{SeparatorLookup, Store};
use crate::toml_store::TomlStore;
use crate::types::Key;
use crate::yaml_store::YamlStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Toml,
    Json,
    Ini,
    Yaml,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// Path of the config file; empty means none.
    pub name: PathBuf,
    /// Extension for the backup copy made before saving; empty disables it.
    pub backup: String,
    /// Write the merged configuration back.
    pub save: bool,
    pub format: Format,
}

impl ConfigFile {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<PathBuf>) -> Self {
        self.name = name.into();
        self
    }

    fn io_error(&self, source: io::Error) -> CfgError {
        CfgError::IoError {
            path: self.name.clone(),
            source,
        }
    }
}

/// Keeps a field out of every store this module provides.
fn unstored(name: &str) -> Key<'_> {
    Key::new(name)
        .format("toml", "-")
        .format("json", "-")
        .format("ini", "-")
        .format("yaml", "-")
}

impl Config for ConfigFile {
    fn describe(&mut self, fields: &mut dyn Visitor) -> Result<(), CfgError> {
        fields.field(unstored("Name"), &mut self.name)?;
        fields.field(unstored("Backup"), &mut self.backup)?;
        fields.field(unstored("Save"), &mut self.save)
    }

    fn usage(&self, name: &str) -> String {
        match name {
            "Name" => "config file name (stdout when empty)",
            "Backup" => "extension of the backup copy made before saving",
            "Save" => "save the configuration to the config file",
            _ => "",
        }
        .to_string()
    }
}

impl FromIo for ConfigFile {
    fn load(&mut self) -> Result<Option<Box<dyn Read>>, CfgError> {
        if self.name.as_os_str().is_empty() {
            return Ok(None);
        }
        match File::open(&self.name) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound && self.save => {
                debug!(path = %self.name.display(), "config file missing, it will be created");
                Ok(None)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&mut self) -> Result<Option<Box<dyn Write>>, CfgError> {
        if !self.save {
            return Ok(None);
        }
        if self.name.as_os_str().is_empty() {
            return Ok(Some(Box::new(io::stdout())));
        }
        if !self.backup.is_empty() {
            let mut backup = self.name.clone().into_os_string();
            backup.push(".");
            backup.push(&self.backup);
            match fs::rename(&self.name, &backup) {
                Ok(()) => debug!(path = %self.name.display(), "config file backed up"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.io_error(e)),
            }
        }
        let file = File::create(&self.name).map_err(|e| self.io_error(e))?;
        Ok(Some(Box::new(BufWriter::new(file))))
    }

    fn store(&self, separators: SeparatorLookup) -> Box<dyn Store> {
        match self.format {
            Format::Toml => Box::new(TomlStore::new()),
            Format::Json => Box::new(JsonStore::new()),
            Format::Ini => Box::new(IniStore::new(separators)),
            Format::Yaml => Box::new(YamlStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn no_name_reads_nothing_and_saves_to_stdout() {
        let mut file = ConfigFile::default();
        assert!(file.load().unwrap().is_none());
        assert!(file.save().unwrap().is_none());
        file.save = true;
        assert!(file.save().unwrap().is_some());
    }

    #[test]
    fn missing_file_is_an_error_unless_saving() {
        let dir = TempDir::new().unwrap();
        let mut file = ConfigFile::default().with_name(dir.path().join("app.toml"));
        let err = file.load().err().unwrap();
        assert!(matches!(err, CfgError::IoError { .. }));
        file.save = true;
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn existing_file_is_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "port = 1\n").unwrap();
        let mut file = ConfigFile::default().with_name(&path);
        let mut text = String::new();
        file.load().unwrap().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "port = 1\n");
    }

    #[test]
    fn saving_renames_the_old_file_to_a_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "old").unwrap();
        let mut file = ConfigFile::default().with_name(&path);
        file.save = true;
        file.backup = "bak".into();
        {
            let mut out = file.save().unwrap().unwrap();
            out.write_all(b"new").unwrap();
        }
        assert_eq!(fs::read_to_string(dir.path().join("app.toml.bak")).unwrap(), "old");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn backup_of_a_missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.toml");
        let mut file = ConfigFile::default().with_name(&path);
        file.save = true;
        file.backup = "bak".into();
        drop(file.save().unwrap());
        assert!(path.exists());
        assert!(!dir.path().join("fresh.toml.bak").exists());
    }

    #[test]
    fn store_follows_format() {
        let lookup = SeparatorLookup::default();
        assert_eq!(ConfigFile::new(Format::Toml).store(lookup.clone()).tag(), "toml");
        assert_eq!(ConfigFile::new(Format::Json).store(lookup.clone()).tag(), "json");
        assert_eq!(ConfigFile::new(Format::Ini).store(lookup.clone()).tag(), "ini");
        assert_eq!(ConfigFile::new(Format::Yaml).store(lookup).tag(), "yaml");
    }
}
