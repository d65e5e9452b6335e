// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
use crate::error::Result;
use config::{Environment, Map, Source};
use log::*;
use std::fmt;

/// Snapshot of the environment variables consulted by loaders
///
/// Variable names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct EnvSource {
    vars: Map<String, String>,
}

impl EnvSource {
    /// Collect the variables of the running process
    pub fn from_process() -> Result<Self> {
        Self::collect(Environment::default())
    }

    /// Use `map` in place of the process environment
    pub fn from_map(map: Map<String, String>) -> Result<Self> {
        Self::collect(Environment::default().source(Some(map)))
    }

    fn collect(env: Environment) -> Result<Self> {
        let mut vars = Map::new();
        for (key, value) in env.collect()? {
            let _ = vars.insert(key, value.into_string()?);
        }
        debug!("Collected {} environment variable(s)", vars.len());
        Ok(EnvSource { vars })
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.vars.get(&var.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EnvSource {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }
}

// Values may be secrets, only the names are shown
impl fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.vars.keys().collect();
        names.sort();
        f.debug_struct("EnvSource").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_map() {
        let map = Map::from([
            ("MY_APP_MY_DB_PORT".to_string(), "8080".to_string()),
            ("MY_APP_MY_SERVICE_NAME".to_string(), "".to_string()),
        ]);
        let env = EnvSource::from_map(map).expect("failed to collect env");
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("MY_APP_MY_DB_PORT"), Some("8080"));
        assert_eq!(env.get("my_app_my_db_port"), Some("8080"));
        // An empty variable is still set
        assert_eq!(env.get("MY_APP_MY_SERVICE_NAME"), Some(""));
        assert_eq!(env.get("MY_APP_MY_DB_ADDRESS"), None);
    }

    #[test]
    fn test_debug_hides_values() {
        let env: EnvSource = [("SECRET_TOKEN", "hunter2")].into_iter().collect();
        let shown = format!("{env:?}");
        assert!(shown.contains("secret_token"), "{shown}");
        assert!(!shown.contains("hunter2"), "{shown}");
    }

    #[test]
    fn test_from_process() {
        let env = EnvSource::from_process().expect("failed to collect env");
        assert_eq!(env.get("PATH").is_some(), std::env::var_os("PATH").is_some());
    }
}
