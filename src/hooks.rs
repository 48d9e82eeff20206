//! Record-wide sweeps over groups: init hooks and usage lookup. Neither
//! descends into excluded groups or subcommands.

use crate::error::CfgError;
use crate::record::{self, Config, Visitor};
use crate::types::Key;
use crate::value::Field;

struct InitSweep;

impl Visitor for InitSweep {
    fn field(&mut self, _: Key<'_>, _: &mut dyn Field) -> Result<(), CfgError> {
        Ok(())
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        if key.parse_tag()?.is_none() || record::is_subcommand(record) {
            return Ok(());
        }
        record.init().map_err(CfgError::Init)?;
        record.describe(self)
    }
}

/// Run `init` on the record, then on its groups, parents first.
pub(crate) fn init(record: &mut dyn Config) -> Result<(), CfgError> {
    record.init().map_err(CfgError::Init)?;
    record.describe(&mut InitSweep)
}

struct UsageSweep<'a> {
    name: &'a str,
    found: String,
}

impl Visitor for UsageSweep<'_> {
    fn field(&mut self, _: Key<'_>, _: &mut dyn Field) -> Result<(), CfgError> {
        Ok(())
    }

    fn group(&mut self, key: Key<'_>, record: &mut dyn Config) -> Result<(), CfgError> {
        if !self.found.is_empty()
            || key.parse_tag()?.is_none()
            || record::is_subcommand(record)
        {
            return Ok(());
        }
        self.found = record.usage(self.name);
        if self.found.is_empty() {
            record.describe(self)?;
        }
        Ok(())
    }
}

/// The first non-empty help text for `name` offered by the record or,
/// depth first, by one of its groups.
pub fn usage_of(record: &mut dyn Config, name: &str) -> Result<String, CfgError> {
    let text = record.usage(name);
    if !text.is_empty() {
        return Ok(text);
    }
    let mut sweep = UsageSweep {
        name,
        found: String::new(),
    };
    record.describe(&mut sweep)?;
    Ok(sweep.found)
}
