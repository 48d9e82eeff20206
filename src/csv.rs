//! Single-record CSV with a configurable separator.
//!
//! Lists and maps travel through flags, environment variables and INI files
//! as one line of text, read and written with the `csv` crate. Items are
//! quoted when they contain the separator, a double quote or a line break,
//! so every list renders to text and parses back to the same items.
//! Separators are ASCII; [`Separators::parse`](crate::Separators::parse)
//! rejects anything else.

use ::csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use crate::error::CodecError;

fn delimiter(sep: char) -> u8 {
    debug_assert!(sep.is_ascii());
    sep as u8
}

/// Join `fields` into one record.
pub fn write_record<S: AsRef<str>>(fields: &[S], sep: char) -> String {
    if fields.is_empty() {
        return String::new();
    }
    if let [only] = fields
        && only.as_ref().is_empty()
    {
        // An empty line reads back as no items at all.
        return "\"\"".to_string();
    }
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter(sep))
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    // An in-memory writer has no I/O to fail on.
    if writer
        .write_record(fields.iter().map(|f| f.as_ref().as_bytes()))
        .is_err()
    {
        return String::new();
    }
    let bytes = writer.into_inner().unwrap_or_default();
    let mut line = String::from_utf8(bytes).unwrap_or_default();
    if line.ends_with('\n') {
        line.pop();
    }
    line
}

/// Split one record into its fields. Empty input yields no fields.
pub fn read_record(line: &str, sep: char) -> Result<Vec<String>, CodecError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter(sep))
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    let malformed = |e: ::csv::Error| CodecError::Csv(e.to_string());
    if !reader.read_record(&mut record).map_err(malformed)? {
        return Ok(Vec::new());
    }
    let fields = record.iter().map(str::to_string).collect();
    if reader.read_record(&mut record).map_err(malformed)? {
        return Err(CodecError::Csv("unquoted line break".into()));
    }
    Ok(fields)
}
