//! Environment variable source.
//!
//! Every option still waiting for a value is offered to the record's
//! [`FromEnv::var`] under its flattened name, group names joined by the
//! environment separator (`Log_Level`). The record answers with the variable
//! to read, or an empty string to leave the option alone. Values are taken as
//! text and parsed by the field.
//!
//! Variables are looked up through a closure so tests can pass a synthetic
//! environment instead of `std::env`.

use tracing::trace;

use crate::error::{CfgError, Origin};
use crate::loader::Assignment;
use crate::names::NameIndex;
use crate::record::FromEnv;
use crate::value::Value;

pub(crate) fn collect(
    index: &NameIndex,
    from: &dyn FromEnv,
    sep: char,
    lookup: impl Fn(&str) -> Result<Option<String>, CfgError>,
) -> Result<Vec<Assignment>, CfgError> {
    let mut found = Vec::new();
    for id in index.outstanding() {
        let var = from.var(&index.entry(id).joined(sep));
        if var.is_empty() {
            continue;
        }
        if let Some(text) = lookup(&var)? {
            trace!(%var, "environment variable set");
            found.push(Assignment {
                id,
                value: Value::Str(text),
                origin: Origin::Env(var),
            });
        }
    }
    Ok(found)
}

/// Read `var` from the process environment.
pub(crate) fn process_var(var: &str) -> Result<Option<String>, CfgError> {
    match std::env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(CfgError::Env {
            var: var.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Prefix every name with `prefix` and the separator, upper-cased:
/// `Log_Level` becomes `APP_LOG_LEVEL`.
pub fn prefixed(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_uppercase()
    } else {
        format!("{prefix}_{name}").to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::fixtures::test::AppConfig;
    use crate::tree::Tree;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn index() -> NameIndex {
        let tree = Tree::build(&mut AppConfig::default()).unwrap();
        NameIndex::build(&tree, '-').unwrap()
    }

    #[test]
    fn outstanding_options_are_looked_up() {
        let index = index();
        let env = vars(&[("APP_PORT", "9090"), ("APP_LOG_LEVEL", "debug"), ("OTHER", "x")]);
        let found = collect(&index, &AppConfig::default(), '_', |v| Ok(env.get(v).cloned()))
            .unwrap();
        assert_eq!(found.len(), 2);
        let port = found.iter().find(|a| a.origin == Origin::Env("APP_PORT".into())).unwrap();
        assert_eq!(port.value, Value::Str("9090".into()));
        assert_eq!(index.entry(port.id).name, "port");
    }

    #[test]
    fn resolved_options_are_skipped() {
        let mut index = index();
        index.resolve(index.find("port").unwrap());
        let env = vars(&[("APP_PORT", "9090")]);
        let found = collect(&index, &AppConfig::default(), '_', |v| Ok(env.get(v).cloned()))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn empty_variable_name_skips_the_option() {
        let index = index();
        // AppConfig gives the config file name no variable.
        let env = vars(&[("APP_NAME", "/etc/app.toml")]);
        let found = collect(&index, &AppConfig::default(), '_', |v| Ok(env.get(v).cloned()))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn prefix_is_upper_cased() {
        assert_eq!(prefixed("app", "Log_Level"), "APP_LOG_LEVEL");
        assert_eq!(prefixed("", "port"), "PORT");
    }
}
