//! The loading pipeline.
//!
//! [`Loader`] walks a record's sources in a fixed order, each one filling
//! only the options no earlier source assigned:
//!
//! 1. Command line flags. A help request stops here. When the first
//!    positional argument names a subcommand, the subcommand is loaded with
//!    the remaining arguments instead, and the outer level ends.
//! 2. The record's done hook, given the subcommand chain and leftovers.
//! 3. Environment variables.
//! 4. The config file, which is then saved back if the record asks for it.
//! 5. Init hooks, the record first and then its groups.
//!
//! Options no source touched keep the value the record was built with.
//!
//! ```ignore
//! let mut config = AppConfig::default();
//! cfgtree::Loader::new()
//!     .program("app")
//!     .env_separator('_')
//!     .load(&mut config)?;
//! ```

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::env;
use crate::error::{CfgError, Origin};
use crate::file;
use crate::flags::{FlagSet, Parsed};
use crate::hooks;
use crate::names::NameIndex;
use crate::record::{self, Config, Visitor};
use crate::tree::Tree;
use crate::types::{ENV_SEPARATOR, GROUP_SEPARATOR, Key, LoadOutcome};
use crate::value::{Field, Value};

/// A value found by one source for one indexed option.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assignment {
    pub id: usize,
    pub value: Value,
    pub origin: Origin,
}

/// Rendered help for one tree level, handed to the usage handler.
pub struct UsageWriter<'a> {
    text: &'a str,
    out: &'a mut dyn Write,
}

impl UsageWriter<'_> {
    /// Write the help text to the configured output.
    pub fn write_usage(&mut self) -> io::Result<()> {
        self.out.write_all(self.text.as_bytes())?;
        self.out.flush()
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn text(&self) -> &str {
        self.text
    }
}

/// Called on a help request with `None`, or on a command line error.
pub type UsageHandler = Box<dyn FnMut(Option<&CfgError>, &mut UsageWriter<'_>) -> Result<(), CfgError>>;

/// Print the error and the help text, then exit: status 2 after an error,
/// 0 after a help request.
fn exit_with_usage(err: Option<&CfgError>, usage: &mut UsageWriter<'_>) -> Result<(), CfgError> {
    if let Some(err) = err {
        writeln!(usage.output(), "{err}")?;
    }
    usage.write_usage()?;
    std::process::exit(if err.is_some() { 2 } else { 0 })
}

fn program_name() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg| {
            Path::new(&arg)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "app".to_string())
}

pub struct Loader {
    env_separator: char,
    group_separator: char,
    program: Option<String>,
    args: Option<Vec<String>>,
    env_vars: Option<HashMap<String, String>>,
    output: Box<dyn Write>,
    usage_handler: UsageHandler,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            env_separator: ENV_SEPARATOR,
            group_separator: GROUP_SEPARATOR,
            program: None,
            args: None,
            env_vars: None,
            output: Box::new(io::stderr()),
            usage_handler: Box::new(exit_with_usage),
        }
    }
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Separator joining group names in environment variable names.
    pub fn env_separator(mut self, sep: char) -> Self {
        self.env_separator = sep;
        self
    }

    /// Separator joining group names in flag names and INI sections.
    pub fn flags_group_separator(mut self, sep: char) -> Self {
        self.group_separator = sep;
        self
    }

    /// Program name shown in the help output. Defaults to the executable's
    /// file stem.
    pub fn program(mut self, name: impl Into<String>) -> Self {
        self.program = Some(name.into());
        self
    }

    /// Command line arguments, without the program name. Defaults to the
    /// process arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Read environment variables from this map instead of the process
    /// environment.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Where help and command line errors go. Defaults to stderr.
    pub fn flags_output(mut self, out: impl Write + 'static) -> Self {
        self.output = Box::new(out);
        self
    }

    /// Replace the default handler, which prints usage and exits.
    pub fn usage_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Option<&CfgError>, &mut UsageWriter<'_>) -> Result<(), CfgError> + 'static,
    {
        self.usage_handler = Box::new(handler);
        self
    }

    /// Fill `config` from all of its sources.
    pub fn load<C: Config>(mut self, config: &mut C) -> Result<LoadOutcome, CfgError> {
        let args = match self.args.take() {
            Some(args) => args,
            None => std::env::args_os()
                .skip(1)
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
        };
        let name = self.program.clone().unwrap_or_else(program_name);
        self.load_level(config, &name, &args, Vec::new())
    }

    /// Write the help text of `config`'s top level to `out`.
    pub fn write_usage(&self, config: &mut dyn Config, out: &mut dyn Write) -> Result<(), CfgError> {
        let tree = Tree::build(config)?;
        let index = NameIndex::build(&tree, self.group_separator)?;
        let about = hooks::usage_of(config, "")?;
        let name = self.program.clone().unwrap_or_else(program_name);
        let mut flags = FlagSet::build(&name, &about, &tree, &index, config.flags().as_deref())?;
        out.write_all(flags.render_help().as_bytes())?;
        Ok(())
    }

    fn load_level(
        &mut self,
        record: &mut dyn Config,
        name: &str,
        args: &[String],
        commands: Vec<String>,
    ) -> Result<LoadOutcome, CfgError> {
        debug!(level = name, "loading configuration");
        let mut tree = Tree::build(record)?;
        let mut index = NameIndex::build(&tree, self.group_separator)?;
        debug!(options = index.len(), "field tree built");
        let about = hooks::usage_of(record, "")?;

        if let Some(from) = record.flags() {
            let mut flags = FlagSet::build(name, &about, &tree, &index, Some(&*from))?;
            let matches = match flags.parse(args) {
                Ok(Parsed::Matches(matches)) => matches,
                Ok(Parsed::Help) => {
                    self.show_usage(None, &mut flags)?;
                    return Ok(LoadOutcome::HelpRequested);
                }
                Err(err) => {
                    self.show_usage(Some(&err), &mut flags)?;
                    return Err(err);
                }
            };
            assign(record, &mut tree, &mut index, flags.visited(&matches))?;

            let leftovers = FlagSet::leftovers(&matches);
            if let Some((first, rest)) = leftovers.split_first()
                && let Some(sub) = tree.subcommand(first)
            {
                let sub = sub.name.clone();
                debug!(command = %sub, "dispatching subcommand");
                let mut chain = commands;
                chain.push(sub.clone());
                let mut dispatch = Dispatch {
                    loader: self,
                    name: &sub,
                    args: rest,
                    commands: Some(chain),
                    outcome: None,
                };
                record.describe(&mut dispatch)?;
                let outcome = dispatch.outcome;
                return outcome.ok_or(CfgError::FieldNotFound(sub));
            }

            if let Some(from) = record.flags() {
                from.done(&commands, &leftovers).map_err(CfgError::Hook)?;
            }
        }

        if let Some(from) = record.env() {
            let sep = self.env_separator;
            let values = match &self.env_vars {
                Some(vars) => env::collect(&index, from, sep, |var| Ok(vars.get(var).cloned()))?,
                None => env::collect(&index, from, sep, env::process_var)?,
            };
            assign(record, &mut tree, &mut index, values)?;
        }

        let merge = match record.io() {
            Some(io) => Some(file::read(io, &tree, &index, self.group_separator)?),
            None => None,
        };
        if let Some(mut merge) = merge {
            let values = std::mem::take(&mut merge.values);
            assign(record, &mut tree, &mut index, values)?;
            if let Some(io) = record.io() {
                merge.save(io, &tree, &about)?;
            }
        }

        hooks::init(record)?;
        debug!(level = name, "configuration loaded");
        Ok(LoadOutcome::Applied)
    }

    fn show_usage(&mut self, err: Option<&CfgError>, flags: &mut FlagSet) -> Result<(), CfgError> {
        let text = flags.render_help();
        let mut usage = UsageWriter {
            text: &text,
            out: &mut *self.output,
        };
        (self.usage_handler)(err, &mut usage)
    }
}

/// Apply `values` to the record's fields, located by their tree path, and
/// mark them assigned.
fn assign(
    record: &mut dyn Config,
    tree: &mut Tree,
    index: &mut NameIndex,
    values: Vec<Assignment>,
) -> Result<(), CfgError> {
    if values.is_empty() {
        return Ok(());
    }
    let pending = values
        .into_iter()
        .map(|a| (index.entry(a.id).path.clone(), a))
        .collect();
    let mut visitor = Assign {
        pending,
        index,
        tree,
        path: Vec::new(),
        assigned: Vec::new(),
    };
    record.describe(&mut visitor)?;
    if let Some(missing) = visitor.pending.values().next() {
        return Err(CfgError::FieldNotFound(index.entry(missing.id).name.clone()));
    }
    for id in visitor.assigned {
        index.resolve(id);
    }
    Ok(())
}

struct Assign<'a> {
    pending: HashMap<Vec<String>, Assignment>,
    index: &'a NameIndex,
    tree: &'a mut Tree,
    path: Vec<String>,
    assigned: Vec<usize>,
}

impl Assign<'_> {
    fn apply(&mut self, field: &mut dyn Field) -> Result<(), CfgError> {
        let Some(assignment) = self.pending.remove(&self.path) else {
            return Ok(());
        };
        let entry = self.index.entry(assignment.id);
        debug!(option = %entry.name, origin = %assignment.origin, "option assigned");
        if let Err(source) = field.set(assignment.value, entry.separators) {
            return Err(CfgError::Codec {
                key: entry.name.clone(),
                origin: assignment.origin,
                source,
            });
        }
        if let Some(node) = self.tree.lookup_mut(&self.path) {
            node.value = Some(field.marshal());
        }
        self.assigned.push(assignment.id);
        Ok(())
    }
}

impl Visitor for Assign<'_> {
    fn field(&mut self, key: Key<'_>, value: &mut dyn Field) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        self.path.push(tag.name.to_string());
        let result = self.apply(value);
        self.path.pop();
        result
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        if self.pending.is_empty() || record::is_subcommand(record) {
            return Ok(());
        }
        self.path.push(tag.name.to_string());
        let result = record.describe(self);
        self.path.pop();
        result
    }
}

/// Finds the named subcommand among the record's groups and loads it.
struct Dispatch<'a> {
    loader: &'a mut Loader,
    name: &'a str,
    args: &'a [String],
    commands: Option<Vec<String>>,
    outcome: Option<LoadOutcome>,
}

impl Visitor for Dispatch<'_> {
    fn field(&mut self, _: Key<'_>, _: &mut dyn Field) -> Result<(), CfgError> {
        Ok(())
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        let Some(tag) = key.parse_tag()? else {
            return Ok(());
        };
        if tag.name != self.name || !record::is_subcommand(record) {
            return Ok(());
        }
        let Some(commands) = self.commands.take() else {
            return Ok(());
        };
        let outcome = self.loader.load_level(record, tag.name, self.args, commands)?;
        self.outcome = Some(outcome);
        Ok(())
    }
}

/// Load `config` from the process arguments and environment with default
/// settings.
pub fn load<C: Config>(config: &mut C) -> Result<LoadOutcome, CfgError> {
    Loader::new().load(config)
}

/// Load `config` from the given arguments, without the program name.
pub fn load_args<C, I, S>(config: &mut C, args: I) -> Result<LoadOutcome, CfgError>
where
    C: Config,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Loader::new().args(args).load(config)
}

/// Write the help text of `config` to `out`.
pub fn usage(config: &mut dyn Config, out: &mut dyn Write) -> Result<(), CfgError> {
    Loader::new().write_usage(config, out)
}
