//! INI store: `[section]` headers, `key = value` lines and `#`/`;`
//! comments. The last key segment is the key; the segments before it,
//! joined by the group separator, name the section. Values are kept as text
//! and rendered with the separators of the field they belong to.

use std::io::{Read, Write};

use crate::error::CfgError;
use crate::store::{SeparatorLookup, Store};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
struct Entry {
    key: String,
    value: String,
    comment: String,
}

#[derive(Debug, Clone, Default)]
struct Section {
    name: String,
    comment: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
pub struct IniStore {
    separators: SeparatorLookup,
    header: String,
    sections: Vec<Section>,
}

impl IniStore {
    pub fn new(separators: SeparatorLookup) -> Self {
        Self {
            separators,
            header: String::new(),
            sections: vec![Section::default()],
        }
    }

    fn split<'k>(&self, key: &'k [String]) -> Option<(String, &'k str)> {
        let (leaf, parents) = key.split_last()?;
        let group = self.separators.group().to_string();
        Some((parents.join(group.as_str()), leaf.as_str()))
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        let pos = match self.sections.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    ..Section::default()
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[pos]
    }

    fn entry(&self, key: &[String]) -> Option<&Entry> {
        let (section, leaf) = self.split(key)?;
        self.section(&section)?.entries.iter().find(|e| e.key == leaf)
    }
}

fn store_error(reason: String) -> CfgError {
    CfgError::Store {
        format: "ini",
        reason,
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn quote(value: &str) -> String {
    if value.trim() != value || value.starts_with('"') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn write_comment(out: &mut String, comment: &str) {
    for line in comment.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
}

impl Store for IniStore {
    fn tag(&self) -> &'static str {
        "ini"
    }

    fn has(&self, key: &[String]) -> bool {
        self.entry(key).is_some()
    }

    fn get(&self, key: &[String]) -> Result<Option<Value>, CfgError> {
        Ok(self.entry(key).map(|e| Value::Str(e.value.clone())))
    }

    fn set(&mut self, key: &[String], value: &Value) -> Result<(), CfgError> {
        let (section, leaf) = self
            .split(key)
            .ok_or_else(|| store_error("empty key".into()))?;
        let text = value.to_text(self.separators.get(key));
        let section = self.section_mut(&section);
        match section.entries.iter_mut().find(|e| e.key == leaf) {
            Some(entry) => entry.value = text,
            None => section.entries.push(Entry {
                key: leaf.to_string(),
                value: text,
                comment: String::new(),
            }),
        }
        Ok(())
    }

    fn set_comment(&mut self, key: &[String], text: &str) -> Result<(), CfgError> {
        if key.is_empty() {
            self.header = text.to_string();
            return Ok(());
        }
        let group = self.separators.group().to_string();
        let full = key.join(group.as_str());
        if let Some(section) = self.sections.iter_mut().find(|s| !s.name.is_empty() && s.name == full) {
            section.comment = text.to_string();
            return Ok(());
        }
        let Some((section, leaf)) = self.split(key) else {
            return Ok(());
        };
        if let Some(entry) = self
            .sections
            .iter_mut()
            .find(|s| s.name == section)
            .and_then(|s| s.entries.iter_mut().find(|e| e.key == leaf))
        {
            entry.comment = text.to_string();
        }
        Ok(())
    }

    fn read_from(&mut self, reader: &mut dyn Read) -> Result<(), CfgError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        let mut sections = vec![Section::default()];
        let mut pending: Vec<&str> = Vec::new();
        let mut header = String::new();
        let mut seen_content = false;

        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                // A comment block at the very top, followed by a blank line,
                // describes the whole file.
                if !seen_content && header.is_empty() && !pending.is_empty() {
                    header = pending.join("\n");
                    pending.clear();
                }
                continue;
            }
            if let Some(comment) = line.strip_prefix('#').or_else(|| line.strip_prefix(';')) {
                pending.push(comment.trim());
                continue;
            }
            seen_content = true;
            let comment = pending.join("\n");
            pending.clear();
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                sections.push(Section {
                    name: name.trim().to_string(),
                    comment,
                    entries: Vec::new(),
                });
            } else if let Some((key, value)) = line.split_once('=') {
                let section = sections.last_mut().ok_or_else(|| store_error("no section".into()))?;
                section.entries.push(Entry {
                    key: key.trim().to_string(),
                    value: unquote(value.trim()).to_string(),
                    comment,
                });
            } else {
                return Err(store_error(format!("line {}: expected `key = value`", n + 1)));
            }
        }

        self.sections = sections;
        self.header = header;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<(), CfgError> {
        let mut out = String::new();
        if !self.header.is_empty() {
            write_comment(&mut out, &self.header);
            out.push('\n');
        }
        for section in &self.sections {
            if section.name.is_empty() && section.entries.is_empty() {
                continue;
            }
            if !section.name.is_empty() {
                if !out.is_empty() && !out.ends_with("\n\n") {
                    out.push('\n');
                }
                write_comment(&mut out, &section.comment);
                out.push_str(&format!("[{}]\n", section.name));
            }
            for entry in &section.entries {
                write_comment(&mut out, &entry.comment);
                out.push_str(&format!("{} = {}\n", entry.key, quote(&entry.value)));
            }
        }
        writer.write_all(out.as_bytes())?;
        Ok(())
    }
}
