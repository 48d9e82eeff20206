use crate::error::CfgError;

/// Default separator between list items and between map entries.
pub const ITEM_SEPARATOR: char = ',';
/// Default separator between a map key and its value.
pub const KEY_SEPARATOR: char = ':';
/// Default separator between group names in flattened flag names.
pub const GROUP_SEPARATOR: char = '-';
/// Default separator between group names in environment variable names.
pub const ENV_SEPARATOR: char = '_';

/// Separators used to render and parse list and map values as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub item: char,
    pub key: char,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            item: ITEM_SEPARATOR,
            key: KEY_SEPARATOR,
        }
    }
}

impl Separators {
    /// Parse a separator annotation: one character overrides the item
    /// separator, a second one overrides the map key separator. Separators
    /// are ASCII and never the CSV quote.
    pub fn parse(field: &str, text: &str) -> Result<Self, CfgError> {
        let invalid = || CfgError::InvalidSeparators {
            field: field.to_string(),
            separators: text.to_string(),
        };
        if text.chars().any(|c| !c.is_ascii() || c == '"') {
            return Err(invalid());
        }
        let mut chars = text.chars();
        let mut seps = Self::default();
        if let Some(item) = chars.next() {
            seps.item = item;
        }
        if let Some(key) = chars.next() {
            seps.key = key;
        }
        if chars.next().is_some() {
            return Err(invalid());
        }
        Ok(seps)
    }
}

/// Shape of a node in the field tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Scalar,
    List,
    Map,
    Group,
    Subcommand,
}

impl Kind {
    pub fn is_leaf(self) -> bool {
        matches!(self, Kind::Scalar | Kind::List | Kind::Map)
    }
}

/// What a successful load did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// All sources were applied and init hooks ran.
    Applied,
    /// Help was requested on the command line. The usage handler ran and no
    /// further sources were applied.
    HelpRequested,
}

/// Annotation attached to a field when a record describes itself.
///
/// ```ignore
/// fields.field(Key::new("Port").tag("port").separators(";"), &mut self.port)?;
/// fields.group(Key::new("File").tag(",inline"), &mut self.file)?;
/// fields.field(Key::new("Name").format("toml", "-"), &mut self.name)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Key<'a> {
    pub(crate) name: &'a str,
    pub(crate) tag: &'a str,
    pub(crate) separators: &'a str,
    pub(crate) formats: Vec<(&'a str, &'a str)>,
}

impl<'a> Key<'a> {
    /// A field with its declared name and no annotation.
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Option tag: `[name][,flag...]`. `-` excludes the field, a non-empty
    /// name renames it, the `inline` flag merges a group into its parent.
    pub fn tag(mut self, tag: &'a str) -> Self {
        self.tag = tag;
        self
    }

    /// List separator, optionally followed by the map key separator.
    pub fn separators(mut self, separators: &'a str) -> Self {
        self.separators = separators;
        self
    }

    /// Store-specific tag for the store whose tag namespace is `format`.
    /// `-` keeps the field out of that store, a name renames its key.
    pub fn format(mut self, format: &'a str, tag: &'a str) -> Self {
        self.formats.push((format, tag));
        self
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// The parsed option tag of a registered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    pub name: &'a str,
    pub inline: bool,
}

impl<'a> Key<'a> {
    /// `None` when the field is excluded.
    pub(crate) fn parse_tag(&self) -> Result<Option<Tag<'a>>, CfgError> {
        let mut parts = self.tag.split(',');
        let name = match parts.next().unwrap_or_default() {
            "-" => return Ok(None),
            "" => self.name,
            renamed => renamed,
        };
        let mut inline = false;
        for flag in parts {
            match flag {
                "inline" => inline = true,
                other => {
                    return Err(CfgError::UnknownTagFlag {
                        field: self.name.to_string(),
                        flag: other.to_string(),
                    });
                }
            }
        }
        Ok(Some(Tag { name, inline }))
    }

    pub(crate) fn parse_separators(&self) -> Result<Separators, CfgError> {
        Separators::parse(self.name, self.separators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_default_to_comma_and_colon() {
        let seps = Separators::parse("Tags", "").unwrap();
        assert_eq!(seps, Separators::default());
    }

    #[test]
    fn separators_override_item_then_key() {
        let seps = Separators::parse("Tags", ";").unwrap();
        assert_eq!((seps.item, seps.key), (';', ':'));
        let seps = Separators::parse("Limits", ";=").unwrap();
        assert_eq!((seps.item, seps.key), (';', '='));
    }

    #[test]
    fn separators_reject_more_than_two() {
        let err = Separators::parse("Limits", ";=|").unwrap_err();
        assert!(matches!(err, CfgError::InvalidSeparators { .. }));
    }

    #[test]
    fn separators_must_be_ascii() {
        for text in ["§", ";·", "\""] {
            let err = Separators::parse("Tags", text).unwrap_err();
            assert!(matches!(err, CfgError::InvalidSeparators { .. }));
        }
    }

    #[test]
    fn tag_defaults_to_declared_name() {
        let tag = Key::new("Port").parse_tag().unwrap().unwrap();
        assert_eq!(tag, Tag { name: "Port", inline: false });
    }

    #[test]
    fn tag_renames_and_inlines() {
        let tag = Key::new("File").tag("cfg,inline").parse_tag().unwrap().unwrap();
        assert_eq!(tag, Tag { name: "cfg", inline: true });
        let tag = Key::new("File").tag(",inline").parse_tag().unwrap().unwrap();
        assert_eq!(tag.name, "File");
        assert!(tag.inline);
    }

    #[test]
    fn dash_excludes_field() {
        assert!(Key::new("Secret").tag("-").parse_tag().unwrap().is_none());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = Key::new("Port").tag(",bogus").parse_tag().unwrap_err();
        match err {
            CfgError::UnknownTagFlag { field, flag } => {
                assert_eq!(field, "Port");
                assert_eq!(flag, "bogus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
