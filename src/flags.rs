//! Command line source, built on clap's runtime builder API.
//!
//! Each option of a tree level becomes one long flag named after its
//! lower-cased flattened name (`--log-level`), with an optional short alias
//! supplied by [`FromFlags::short`]. Flags of options without help text are
//! accepted but hidden from the usage output. Booleans take an optional
//! `=value`; bare `--debug` means true.
//!
//! Only flags actually present on the command line produce values. The
//! first positional argument and everything after it are returned as
//! leftovers, for subcommand dispatch or the record's done hook.
//!
//! `-h`, `--help` and `-help` request help.

use chrono::{DateTime, FixedOffset};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{CfgError, Origin};
use crate::loader::Assignment;
use crate::names::NameIndex;
use crate::record::FromFlags;
use crate::tree::Tree;
use crate::value::{self, Value};

const HELP: &str = "help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parser {
    Bool,
    Int,
    Uint,
    Float,
    Duration,
    Time,
    Text,
}

impl Parser {
    fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Parser::Bool,
            Value::Int(_) => Parser::Int,
            Value::Uint(_) => Parser::Uint,
            Value::Float(_) => Parser::Float,
            Value::Duration(_) => Parser::Duration,
            Value::Time(_) => Parser::Time,
            Value::Str(_) | Value::List(_) | Value::Map(_) => Parser::Text,
        }
    }

    fn configure(self, arg: Arg, value: &Value) -> Arg {
        // An option's value is always the next word, even one starting with '-'.
        let arg = if self == Parser::Bool {
            arg
        } else {
            arg.allow_hyphen_values(true)
        };
        match self {
            Parser::Bool => arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
                .value_name("BOOL")
                .value_parser(value::parse_bool),
            Parser::Int => arg.value_name("INT").value_parser(value::parse_int),
            Parser::Uint => arg.value_name("UINT").value_parser(value::parse_uint),
            Parser::Float => arg.value_name("FLOAT").value_parser(value::parse_float),
            Parser::Duration => arg
                .value_name("DURATION")
                .value_parser(value::parse_duration),
            Parser::Time => arg.value_name("TIME").value_parser(value::parse_time),
            Parser::Text => arg
                .value_name(match value {
                    Value::List(_) => "LIST",
                    Value::Map(_) => "MAP",
                    _ => "STRING",
                })
                .value_parser(value_parser!(String)),
        }
    }

    fn take(self, matches: &ArgMatches, id: &str) -> Option<Value> {
        match self {
            Parser::Bool => matches.get_one::<bool>(id).copied().map(Value::Bool),
            Parser::Int => matches.get_one::<i64>(id).copied().map(Value::Int),
            Parser::Uint => matches.get_one::<u64>(id).copied().map(Value::Uint),
            Parser::Float => matches.get_one::<f64>(id).copied().map(Value::Float),
            Parser::Duration => matches
                .get_one::<Duration>(id)
                .copied()
                .map(Value::Duration),
            Parser::Time => matches
                .get_one::<DateTime<FixedOffset>>(id)
                .copied()
                .map(Value::Time),
            Parser::Text => matches.get_one::<String>(id).cloned().map(Value::Str),
        }
    }
}

struct Flag {
    id: String,
    short: Option<char>,
    entry: usize,
    parser: Parser,
}

pub(crate) enum Parsed {
    Help,
    Matches(ArgMatches),
}

/// The flags of one tree level, ready to parse.
pub(crate) struct FlagSet {
    command: Command,
    flags: Vec<Flag>,
    help: bool,
}

impl FlagSet {
    pub(crate) fn build(
        name: &str,
        about: &str,
        tree: &Tree,
        index: &NameIndex,
        from: Option<&dyn FromFlags>,
    ) -> Result<Self, CfgError> {
        let mut command = Command::new(name.to_string())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .allow_external_subcommands(true)
            .external_subcommand_value_parser(value_parser!(String));
        if !about.is_empty() {
            command = command.about(about.to_string());
        }

        let mut flags = Vec::with_capacity(index.len());
        let mut shorts = HashSet::new();
        for (entry, option) in index.entries().iter().enumerate() {
            let Some(node) = tree.lookup(&option.path) else {
                continue;
            };
            let Some(value) = &node.value else {
                continue;
            };
            let id = option.name.to_lowercase();
            let parser = Parser::of(value);
            let mut arg = Arg::new(id.clone())
                .long(id.clone())
                .action(ArgAction::Set)
                .hide(node.usage.is_empty());
            if !node.usage.is_empty() {
                arg = arg.help(node.usage.clone());
            }
            let short = from.and_then(|f| f.short(&id));
            if let Some(short) = short {
                if !shorts.insert(short) {
                    return Err(CfgError::DuplicateName(format!("-{short}")));
                }
                arg = arg.short(short);
            }
            let default = value.to_text(node.separators);
            if !default.is_empty() {
                arg = arg.default_value(default);
            }
            command = command.arg(parser.configure(arg, value));
            flags.push(Flag {
                id,
                short,
                entry,
                parser,
            });
        }

        // A field flattening to "help" takes precedence over the built-in flag.
        let help = index.find(HELP).is_none();
        if help {
            let mut arg = Arg::new(HELP)
                .long(HELP)
                .action(ArgAction::SetTrue)
                .help("Print help");
            if !shorts.contains(&'h') {
                arg = arg.short('h');
            }
            command = command.arg(arg);
        }

        let listed: Vec<_> = tree.subcommands().filter(|n| !n.usage.is_empty()).collect();
        if !listed.is_empty() {
            let width = listed.iter().map(|n| n.name.len()).max().unwrap_or_default();
            let mut text = String::from("Commands:\n");
            for node in listed {
                let summary = node.usage.lines().next().unwrap_or_default();
                text.push_str(&format!("  {:width$}  {summary}\n", node.name));
            }
            command = command.after_help(text);
        }

        Ok(Self {
            command,
            flags,
            help,
        })
    }

    pub(crate) fn parse(&mut self, args: &[String]) -> Result<Parsed, CfgError> {
        let split = self.first_positional(args);
        let args = args.iter().enumerate().map(|(i, arg)| {
            if i < split && arg == "-help" {
                "--help".to_string()
            } else {
                arg.clone()
            }
        });
        let matches = self.command.try_get_matches_from_mut(args)?;
        if self.help && matches.get_flag(HELP) {
            return Ok(Parsed::Help);
        }
        Ok(Parsed::Matches(matches))
    }

    /// Position of the first argument that is neither a flag nor a flag's
    /// value. Leftovers start there and are passed on untouched.
    fn first_positional(&self, args: &[String]) -> usize {
        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();
            if arg == "-" || arg == "--" || !arg.starts_with('-') {
                return i;
            }
            if self.takes_next_word(arg) {
                i += 1;
            }
            i += 1;
        }
        args.len()
    }

    fn takes_next_word(&self, arg: &str) -> bool {
        let mut takes = self.flags.iter().filter(|f| f.parser != Parser::Bool);
        if let Some(long) = arg.strip_prefix("--") {
            return !long.contains('=') && takes.any(|f| f.id == long);
        }
        let mut chars = arg.chars().skip(1);
        match (chars.next(), chars.next()) {
            (Some(c), None) => takes.any(|f| f.short == Some(c)),
            _ => false,
        }
    }

    /// Values of the flags given on the command line.
    pub(crate) fn visited(&self, matches: &ArgMatches) -> Vec<Assignment> {
        self.flags
            .iter()
            .filter(|f| matches.value_source(&f.id) == Some(ValueSource::CommandLine))
            .filter_map(|f| {
                Some(Assignment {
                    id: f.entry,
                    value: f.parser.take(matches, &f.id)?,
                    origin: Origin::Flag,
                })
            })
            .collect()
    }

    /// Positional arguments left after the flags.
    pub(crate) fn leftovers(matches: &ArgMatches) -> Vec<String> {
        match matches.subcommand() {
            Some((first, rest)) => std::iter::once(first.to_string())
                .chain(rest.get_many::<String>("").into_iter().flatten().cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn render_help(&mut self) -> String {
        self.command.render_help().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{AppConfig, Signed};

    fn flag_set(config: &mut AppConfig) -> (FlagSet, NameIndex) {
        let tree = Tree::build(config).unwrap();
        let index = NameIndex::build(&tree, '-').unwrap();
        let set = FlagSet::build("app", "demo service", &tree, &index, Some(&*config)).unwrap();
        (set, index)
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    fn matches(set: &mut FlagSet, list: &[&str]) -> ArgMatches {
        match set.parse(&args(list)).unwrap() {
            Parsed::Matches(m) => m,
            Parsed::Help => panic!("unexpected help"),
        }
    }

    fn value_of(set: &FlagSet, index: &NameIndex, m: &ArgMatches, name: &str) -> Option<Value> {
        let id = index.find(name)?;
        set.visited(m).into_iter().find(|a| a.id == id).map(|a| a.value)
    }

    #[test]
    fn only_given_flags_produce_values() {
        let (mut set, index) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["--port=7070"]);
        assert_eq!(set.visited(&m).len(), 1);
        assert_eq!(value_of(&set, &index, &m, "port"), Some(Value::Uint(7070)));
    }

    #[test]
    fn integers_accept_base_prefixes() {
        let (mut set, index) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["--port", "0x50"]);
        assert_eq!(value_of(&set, &index, &m, "port"), Some(Value::Uint(80)));
    }

    #[test]
    fn bare_bool_flag_is_true() {
        let (mut set, index) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["--debug"]);
        assert_eq!(value_of(&set, &index, &m, "debug"), Some(Value::Bool(true)));
        let m = matches(&mut set, &["--debug=F"]);
        assert_eq!(value_of(&set, &index, &m, "debug"), Some(Value::Bool(false)));
    }

    #[test]
    fn grouped_and_list_flags() {
        let (mut set, index) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["--log-level", "debug", "--tags=a;b", "--timeout", "2m"]);
        assert_eq!(
            value_of(&set, &index, &m, "log-level"),
            Some(Value::Str("debug".into()))
        );
        assert_eq!(value_of(&set, &index, &m, "tags"), Some(Value::Str("a;b".into())));
        assert_eq!(
            value_of(&set, &index, &m, "timeout"),
            Some(Value::Duration(Duration::from_secs(120)))
        );
    }

    #[test]
    fn short_alias() {
        let (mut set, index) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["-p", "81"]);
        assert_eq!(value_of(&set, &index, &m, "port"), Some(Value::Uint(81)));
    }

    #[test]
    fn positional_arguments_are_left_over() {
        let (mut set, _) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["--debug", "start", "--workers=4", "now"]);
        assert_eq!(FlagSet::leftovers(&m), args(&["start", "--workers=4", "now"]));
    }

    #[test]
    fn every_help_spelling_requests_help() {
        for spelling in ["-h", "--help", "-help"] {
            let (mut set, _) = flag_set(&mut AppConfig::default());
            assert!(matches!(set.parse(&args(&[spelling])).unwrap(), Parsed::Help));
        }
    }

    #[test]
    fn negative_numbers_are_flag_values() {
        let mut config = Signed::default();
        let tree = Tree::build(&mut config).unwrap();
        let index = NameIndex::build(&tree, '-').unwrap();
        let mut set = FlagSet::build("app", "", &tree, &index, None).unwrap();
        let m = matches(&mut set, &["--offset", "-5", "--scale", "-0.5"]);
        assert_eq!(value_of(&set, &index, &m, "offset"), Some(Value::Int(-5)));
        assert_eq!(value_of(&set, &index, &m, "scale"), Some(Value::Float(-0.5)));
    }

    #[test]
    fn text_value_may_start_with_a_dash() {
        let (mut set, index) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["--log-level", "-help"]);
        assert_eq!(
            value_of(&set, &index, &m, "log-level"),
            Some(Value::Str("-help".into()))
        );
    }

    #[test]
    fn help_spelling_after_a_positional_is_left_alone() {
        let (mut set, _) = flag_set(&mut AppConfig::default());
        let m = matches(&mut set, &["-p", "81", "extra", "-help"]);
        assert_eq!(FlagSet::leftovers(&m), args(&["extra", "-help"]));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        let (mut set, _) = flag_set(&mut AppConfig::default());
        let err = set.parse(&args(&["--nope"])).err().unwrap();
        assert!(matches!(err, CfgError::Flags(_)));
    }

    #[test]
    fn bad_value_is_an_error() {
        let (mut set, _) = flag_set(&mut AppConfig::default());
        assert!(set.parse(&args(&["--port=eighty"])).is_err());
    }

    #[test]
    fn help_lists_documented_flags_and_commands() {
        let (mut set, _) = flag_set(&mut AppConfig::default());
        let help = set.render_help();
        assert!(help.contains("demo service"));
        assert!(help.contains("--port"));
        assert!(help.contains("port to listen on"));
        assert!(help.contains("--log-level"));
        assert!(!help.contains("--debug"));
        assert!(help.contains("Commands:"));
        assert!(help.contains("start the service"));
        assert!(!help.contains("stop"));
    }
}
