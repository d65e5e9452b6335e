// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! Declarative field tables.
//!
//! Loaders describe each configurable value with a `const` [`FieldSpec`]
//! and bind it to a [`Scope`] at runtime, which yields the concrete
//! environment variable and command line flag names for that value.
//!
//! ```
//! use credconf::field::{FieldSpec, Scope};
//!
//! const PORT: FieldSpec = FieldSpec::new("Port", "PORT")
//!     .flag("port")
//!     .default_value("8080");
//!
//! let field = Scope::new("MY_APP", "").nest("MY_DB", "my-db").bind(&PORT);
//! assert_eq!(field.env_var(), "MY_APP_MY_DB_PORT");
//! assert_eq!(field.flag(), Some("my-db-port"));
//! ```

use std::fmt;

/// Static description of a single configurable value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    name: &'static str,
    env: &'static str,
    flag: Option<&'static str>,
    default: Option<&'static str>,
    required: bool,
    switch: bool,
    help: &'static str,
}

impl FieldSpec {
    /// `name` is used in error messages, `env` is the variable suffix
    pub const fn new(name: &'static str, env: &'static str) -> Self {
        FieldSpec {
            name,
            env,
            flag: None,
            default: None,
            required: false,
            switch: false,
            help: "",
        }
    }

    /// Expose the field as a `--<scope>-<flag>` command line option
    pub const fn flag(mut self, flag: &'static str) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Value used when no other source supplies one
    pub const fn default_value(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Boolean flag that may be given without a value
    pub const fn switch(mut self) -> Self {
        self.switch = true;
        self
    }

    pub const fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default(&self) -> Option<&'static str> {
        self.default
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_switch(&self) -> bool {
        self.switch
    }
}

/// Prefixes applied to the fields of one loader
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    env: String,
    flag: String,
}

fn join(prefix: &str, sep: char, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}{sep}{suffix}"),
    }
}

impl Scope {
    /// Scope without any prefix
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(env: impl Into<String>, flag: impl Into<String>) -> Self {
        Scope {
            env: env.into(),
            flag: flag.into(),
        }
    }

    /// Child scope, e.g. `MY_APP` + `MY_DB` gives `MY_APP_MY_DB`
    pub fn nest(&self, env: &str, flag: &str) -> Scope {
        Scope {
            env: join(&self.env, '_', env),
            flag: join(&self.flag, '-', flag),
        }
    }

    pub fn env_prefix(&self) -> &str {
        &self.env
    }

    pub fn flag_prefix(&self) -> &str {
        &self.flag
    }

    pub fn bind(&self, spec: &FieldSpec) -> Field {
        Field {
            spec: *spec,
            env_var: join(&self.env, '_', spec.env),
            flag: spec.flag.map(|f| join(&self.flag, '-', f)),
        }
    }
}

/// A [`FieldSpec`] with its concrete source names
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    spec: FieldSpec,
    env_var: String,
    flag: Option<String>,
}

impl Field {
    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    pub fn flag(&self) -> Option<&str> {
        self.flag.as_deref()
    }

    pub fn default(&self) -> Option<&'static str> {
        self.spec.default
    }

    pub fn is_required(&self) -> bool {
        self.spec.required
    }

    pub fn is_switch(&self) -> bool {
        self.spec.switch
    }

    /// Help text shown for the command line flag
    pub fn describe(&self) -> String {
        let mut text = if self.spec.help.is_empty() {
            format!("{} value", self.spec.name)
        } else {
            self.spec.help.to_string()
        };
        if let Some(default) = self.spec.default {
            text.push_str(&format!(" [default: '{default}']"));
        }
        if self.spec.required {
            text.push_str(" [required]");
        }
        text.push_str(&format!(" [env: {}]", self.env_var));
        text
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec.name)
    }
}
