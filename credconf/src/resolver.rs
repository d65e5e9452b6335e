// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! Layered resolution of loader snapshots.
//!
//! For every field the first value found wins, in this order:
//!
//! 1. the command line flag
//! 2. the environment variable
//! 3. the value in the last successfully resolved snapshot
//! 4. the declared default
//!
//! A [`Resolver`] runs one cycle at a time. A cycle either produces a
//! complete snapshot, which then becomes the previous snapshot, or fails
//! and leaves the previous snapshot in place.

use crate::{
    env::EnvSource,
    error::{Error, Result},
    field::Field,
    flags::{FlagRegistry, FlagValues},
    path::{FilePath, SecretPath},
    secret::Secret,
};
use log::*;
use serde::de::DeserializeOwned;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Produces one snapshot type from the configured sources
pub trait Loader {
    type Output: Clone;

    /// Add the command line flags of every field to `flags`
    fn register(&self, flags: &mut FlagRegistry);

    /// Build a fresh snapshot
    ///
    /// `previous` is the last snapshot this loader produced successfully,
    /// if any.
    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&Self::Output>,
    ) -> Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Flag,
    Env,
}

/// The sources consulted during one resolution cycle
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
    flags: &'a FlagValues,
    env: &'a EnvSource,
    root: Option<&'a Path>,
}

fn parse_value<T: DeserializeOwned>(field: &Field, raw: &str) -> Result<T> {
    config::Value::new(None, raw.to_string())
        .try_deserialize()
        .map_err(|e| Error::InvalidValue {
            field: field.name().to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

impl<'a> Sources<'a> {
    pub fn new(flags: &'a FlagValues, env: &'a EnvSource) -> Self {
        Sources {
            flags,
            env,
            root: None,
        }
    }

    /// Directory relative default paths are joined onto
    pub fn with_root(mut self, root: &'a Path) -> Self {
        self.root = Some(root);
        self
    }

    pub fn root(&self) -> Option<&'a Path> {
        self.root
    }

    fn raw(&self, field: &Field) -> Option<(Origin, &'a str)> {
        let flag = field
            .flag()
            .and_then(|f| self.flags.get(f))
            .map(|v| (Origin::Flag, v));
        flag.or_else(|| {
            self.env.get(field.env_var()).map(|v| (Origin::Env, v))
        })
    }

    /// Value given explicitly on the command line or in the environment
    pub fn lookup<T: DeserializeOwned>(
        &self,
        field: &Field,
    ) -> Result<Option<T>> {
        match self.raw(field) {
            Some((origin, raw)) => {
                debug!("{field} set from {origin:?}");
                parse_value(field, raw).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Resolve a field that may stay unset
    ///
    /// Fails with `MissingRequiredField` when the field is required and no
    /// source, previous value or default supplies it.
    pub fn optional<T: DeserializeOwned>(
        &self,
        field: &Field,
        previous: Option<T>,
    ) -> Result<Option<T>> {
        if let Some(value) = self.lookup(field)? {
            return Ok(Some(value));
        }
        if previous.is_some() {
            debug!("{field} kept from previous snapshot");
            return Ok(previous);
        }
        if let Some(default) = field.default() {
            debug!("{field} set from default");
            return parse_value(field, default).map(Some);
        }
        if field.is_required() {
            return Err(Error::MissingRequiredField(field.name().to_string()));
        }
        Ok(None)
    }

    /// Resolve a field, falling back to the zero value of `T`
    pub fn value<T: DeserializeOwned + Default>(
        &self,
        field: &Field,
        previous: Option<T>,
    ) -> Result<T> {
        Ok(self.optional(field, previous)?.unwrap_or_default())
    }

    /// Resolve a path field
    ///
    /// Explicit values are used as given, a relative default is joined
    /// onto the configuration root.
    pub fn path(
        &self,
        field: &Field,
        previous: Option<&FilePath>,
    ) -> Result<FilePath> {
        if let Some(path) = self.lookup::<String>(field)? {
            return Ok(FilePath::new(path));
        }
        if let Some(path) = previous.filter(|p| p.is_some()) {
            debug!("{field} kept from previous snapshot");
            return Ok(path.clone());
        }
        if let Some(default) = field.default() {
            debug!("{field} set from default");
            return Ok(FilePath::new(match self.root {
                Some(root) => root.join(default),
                None => PathBuf::from(default),
            }));
        }
        if field.is_required() {
            return Err(Error::MissingRequiredField(field.name().to_string()));
        }
        Ok(FilePath::empty())
    }

    /// Resolve a path field and read the secret it points to
    ///
    /// Returns the resolved path with the secret, so the path can be kept
    /// in the snapshot. A required secret must exist, an optional one may
    /// be missing.
    pub fn secret_file(
        &self,
        field: &Field,
        previous: Option<&FilePath>,
    ) -> Result<(FilePath, Secret<String>)> {
        let path = self.path(field, previous)?;
        let secret = SecretPath::from(path.clone());
        if secret.is_none() {
            return Ok((path, Secret::absent()));
        }
        let value = if field.is_required() {
            secret.read()?
        } else {
            secret.read_optional()?
        };
        Ok((path, value))
    }
}

/// Runs resolution cycles for a loader and keeps the last snapshot
pub struct Resolver<L: Loader> {
    loader: L,
    flags: FlagRegistry,
    root: Option<PathBuf>,
    previous: Option<L::Output>,
}

impl<L: Loader> Resolver<L> {
    /// Create a resolver, registering the loader's flags in `flags`
    pub fn new(loader: L, mut flags: FlagRegistry) -> Self {
        loader.register(&mut flags);
        Resolver {
            loader,
            flags,
            root: None,
            previous: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn flags(&self) -> &FlagRegistry {
        &self.flags
    }

    /// The last successfully resolved snapshot
    pub fn previous(&self) -> Option<&L::Output> {
        self.previous.as_ref()
    }

    /// Run one cycle against already parsed flags
    pub fn resolve(
        &mut self,
        flags: &FlagValues,
        env: &EnvSource,
    ) -> Result<L::Output> {
        let mut sources = Sources::new(flags, env);
        if let Some(root) = &self.root {
            sources = sources.with_root(root);
        }

        match self.loader.load(&sources, self.previous.as_ref()) {
            Ok(snapshot) => {
                info!("Configuration resolved");
                self.previous = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Configuration not updated: {e}");
                Err(e)
            }
        }
    }

    /// Run one cycle, parsing `args` with the registered flags
    pub fn resolve_args<I, T>(
        &mut self,
        args: I,
        env: &EnvSource,
    ) -> Result<L::Output>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let flags = self.flags.parse_from(args)?;
        self.resolve(&flags, env)
    }

    /// Run one cycle against the process arguments and environment
    pub fn update(&mut self) -> Result<L::Output> {
        let env = EnvSource::from_process()?;
        self.resolve_args(std::env::args_os(), &env)
    }
}
