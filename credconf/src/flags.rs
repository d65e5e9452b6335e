// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

use crate::{error::Result, field::Field};
use clap::{Arg, ArgAction, Command};
use log::*;
use std::{
    collections::{HashMap, HashSet},
    ffi::OsString,
};

/// Command line options registered by loaders
///
/// Every field with a flag name contributes one long option. The same
/// registry is handed to all loaders of an application so that the whole
/// command line is parsed at once.
#[derive(Debug, Clone)]
pub struct FlagRegistry {
    program: String,
    args: Vec<Arg>,
    names: HashSet<String>,
}

impl FlagRegistry {
    pub fn new(program: impl Into<String>) -> Self {
        FlagRegistry {
            program: program.into(),
            args: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Register the flag of `field`
    ///
    /// Returns `false` when the field has no flag or the flag name is
    /// already registered, in which case nothing changes.
    pub fn register(&mut self, field: &Field) -> bool {
        let Some(flag) = field.flag() else {
            return false;
        };
        if !self.names.insert(flag.to_string()) {
            debug!("Flag --{flag} already registered");
            return false;
        }

        let mut arg = Arg::new(flag.to_string())
            .long(flag.to_string())
            .help(field.describe())
            .action(ArgAction::Set);
        if field.is_switch() {
            arg = arg
                .value_name("BOOL")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true");
        }
        self.args.push(arg);
        true
    }

    pub fn is_registered(&self, flag: &str) -> bool {
        self.names.contains(flag)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The clap command holding every registered flag
    pub fn command(&self) -> Command {
        Command::new(self.program.clone()).args(self.args.iter().cloned())
    }

    /// Parse `args`, the first item being the program name
    pub fn parse_from<I, T>(&self, args: I) -> Result<FlagValues>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command().try_get_matches_from(args)?;
        let values = self
            .names
            .iter()
            .filter_map(|name| {
                matches
                    .get_one::<String>(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();
        Ok(FlagValues { values })
    }
}

/// Flags given on one command line, by flag name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagValues {
    values: HashMap<String, String>,
}

impl FlagValues {
    pub fn get(&self, flag: &str) -> Option<&str> {
        self.values.get(flag).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FlagValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FlagValues {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
