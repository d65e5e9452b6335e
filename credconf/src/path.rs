// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! Optional filesystem locations.
//!
//! A [`FilePath`] is a path that may or may not have been configured. A
//! [`SecretPath`] is the same handle for files whose contents are secret: it
//! only accepts files readable by their owner alone and returns
//! [`Secret`] values on read.

use crate::{
    error::{Error, Result},
    permissions,
    secret::Secret,
};
use std::{
    env,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    os::unix::{ffi::OsStrExt, fs::OpenOptionsExt},
    path::{Component, Path, PathBuf},
};

const NOT_CONFIGURED: &str = "file path";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilePath {
    path: Option<PathBuf>,
    resolved: bool,
}

impl FilePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePath {
            path: Some(path.into()),
            resolved: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
        self.resolved = false;
    }

    pub fn clear(&mut self) {
        self.path = None;
        self.resolved = false;
    }

    pub fn get(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_some(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.path.is_none()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Return `self` when configured, otherwise `other`
    pub fn or(self, other: FilePath) -> FilePath {
        if self.is_some() {
            self
        } else {
            other
        }
    }

    /// Configured path, or `NotConfigured`
    pub fn require(&self) -> Result<&Path> {
        self.get()
            .ok_or_else(|| Error::NotConfigured(NOT_CONFIGURED.into()))
    }

    /// Resolve to an absolute path
    ///
    /// `.` and `..` components are folded lexically, so the file does not
    /// need to exist. Resolving an already resolved handle is a no-op.
    pub fn to_absolute(&self) -> Result<FilePath> {
        if self.resolved {
            return Ok(self.clone());
        }
        let absolute = absolute_path(self.require()?)?;
        Ok(FilePath {
            path: Some(absolute),
            resolved: true,
        })
    }

    /// Whether the configured path exists. Absence is not an error.
    pub fn exists(&self) -> bool {
        match self.to_absolute() {
            Ok(p) => p.get().map(Path::exists).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Whether `other` names the same location
    ///
    /// Both sides are made absolute (and canonicalised when they exist), so
    /// relative and absolute spellings of one file compare equal.
    pub fn matches(&self, other: impl AsRef<Path>) -> bool {
        let Some(own) = self.get() else {
            return false;
        };
        match (comparable(own), comparable(other.as_ref())) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Whether all bits in `require` and none in `forbid` are set
    pub fn check_permissions(
        &self,
        require: u32,
        forbid: u32,
    ) -> Result<bool> {
        permissions::check_mode(self.require()?, require, forbid)
    }

    /// Like [`FilePath::check_permissions`], failing with `PermissionDenied`
    pub fn enforce_permissions(
        &self,
        require: u32,
        forbid: u32,
    ) -> Result<()> {
        permissions::enforce_mode(self.require()?, require, forbid)
    }

    pub fn set_permissions(&self, mode: u32) -> Result<()> {
        permissions::set_mode(self.require()?, mode)
    }

    /// Read the file as UTF-8 text. A zero byte file yields an empty string.
    pub fn read(&self) -> Result<String> {
        let path = self.require()?;
        fs::read_to_string(path).map_err(|e| Error::io(path, e))
    }

    /// Read a file that is allowed to be missing
    ///
    /// Returns `Ok(None)` when no path is configured or the file does not
    /// exist. Any other failure is still an error.
    pub fn read_optional(&self) -> Result<Option<String>> {
        let Some(path) = self.get() else {
            return Ok(None);
        };
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Create or truncate the file, write `bytes` and set `mode`
    pub fn write(&self, bytes: &[u8], mode: u32) -> Result<()> {
        let path = self.require()?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        file.write_all(bytes).map_err(|e| Error::io(path, e))?;
        // The creation mode is filtered by the umask and ignored for
        // existing files
        permissions::set_mode(path, mode)
    }

    pub fn remove(&self) -> Result<()> {
        let path = self.require()?;
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    }

    /// Move the path into a [`SecretPath`], leaving this handle empty
    pub fn upgrade(&mut self) -> SecretPath {
        SecretPath::from(std::mem::take(self))
    }
}

impl From<PathBuf> for FilePath {
    fn from(path: PathBuf) -> Self {
        FilePath::new(path)
    }
}

impl From<&str> for FilePath {
    fn from(path: &str) -> Self {
        FilePath::new(path)
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.as_os_str().as_bytes().contains(&0) {
        return Err(invalid("path contains a NUL byte"));
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|e| invalid(&format!("no working directory: {e}")))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                normalized.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                _ = normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    Ok(normalized)
}

fn comparable(path: &Path) -> Result<PathBuf> {
    let absolute = absolute_path(path)?;
    Ok(fs::canonicalize(&absolute).unwrap_or(absolute))
}

/// Path to a file holding secret material
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretPath {
    path: FilePath,
}

impl SecretPath {
    /// Bits that must be set on a secret file
    pub const REQUIRE: u32 = permissions::OWNER_READ;
    /// Bits that must be clear on a secret file
    pub const FORBID: u32 = permissions::GROUP_OTHER_ALL;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        SecretPath {
            path: FilePath::new(path),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<PathBuf>) {
        self.path.set(path)
    }

    pub fn clear(&mut self) {
        self.path.clear()
    }

    pub fn get(&self) -> Option<&Path> {
        self.path.get()
    }

    pub fn is_some(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.path.is_none()
    }

    pub fn or(self, other: SecretPath) -> SecretPath {
        SecretPath {
            path: self.path.or(other.path),
        }
    }

    pub fn require(&self) -> Result<&Path> {
        self.path.require()
    }

    pub fn to_absolute(&self) -> Result<SecretPath> {
        Ok(SecretPath {
            path: self.path.to_absolute()?,
        })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn matches(&self, other: impl AsRef<Path>) -> bool {
        self.path.matches(other)
    }

    /// Check the file is `0600`: owner read/write, nothing for group/other
    pub fn check_permissions(&self) -> Result<bool> {
        self.path.check_permissions(Self::REQUIRE, Self::FORBID)
    }

    pub fn check_permissions_with(
        &self,
        require: u32,
        forbid: u32,
    ) -> Result<bool> {
        self.path.check_permissions(require, forbid)
    }

    pub fn enforce_permissions(&self) -> Result<()> {
        self.path.enforce_permissions(Self::REQUIRE, Self::FORBID)
    }

    pub fn set_permissions(&self, mode: u32) -> Result<()> {
        self.path.set_permissions(mode)
    }

    /// Read the secret after checking its permissions
    pub fn read(&self) -> Result<Secret<String>> {
        self.enforce_permissions()?;
        self.path.read().map(Secret::new)
    }

    /// Read a secret that is allowed to be missing
    pub fn read_optional(&self) -> Result<Secret<String>> {
        if !self.exists() {
            return Ok(Secret::absent());
        }
        self.enforce_permissions()?;
        self.path.read_optional().map(Secret::from)
    }

    /// Raw bytes of the file, after checking its permissions
    pub(crate) fn read_bytes(&self) -> Result<Vec<u8>> {
        self.enforce_permissions()?;
        let path = self.require()?;
        fs::read(path).map_err(|e| Error::io(path, e))
    }

    /// Write the secret with mode `0600`
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.path.write(bytes, permissions::SECRET_FILE_MODE)
    }

    pub fn remove(&self) -> Result<()> {
        self.path.remove()
    }
}

impl From<FilePath> for SecretPath {
    fn from(path: FilePath) -> Self {
        SecretPath { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::REDACTED;

    #[test]
    fn test_absent_path() {
        let p = FilePath::empty();
        assert!(p.is_none());
        assert!(!p.exists());
        assert!(!p.matches("/tmp"));
        assert!(matches!(p.to_absolute(), Err(Error::NotConfigured(_))));
        assert!(matches!(p.remove(), Err(Error::NotConfigured(_))));
        assert!(matches!(p.read(), Err(Error::NotConfigured(_))));
        assert_eq!(p.read_optional().unwrap(), None); //#[allow_ci]
    }

    #[test]
    fn test_to_absolute_folds_components() {
        let p = FilePath::new("/etc/./myapp/../myapp/tls/cert.pem");
        let abs = p.to_absolute().expect("failed to resolve");
        assert_eq!(abs.get(), Some(Path::new("/etc/myapp/tls/cert.pem")));
        assert!(abs.is_resolved());
        assert_eq!(abs.to_absolute().unwrap(), abs); //#[allow_ci]
    }

    #[test]
    fn test_to_absolute_relative() {
        let p = FilePath::new("tls/cert.pem");
        let abs = p.to_absolute().expect("failed to resolve");
        let cwd = env::current_dir().expect("no working directory");
        assert_eq!(abs.get(), Some(cwd.join("tls/cert.pem").as_path()));
    }

    #[test]
    fn test_to_absolute_invalid() {
        let p = FilePath::new("");
        assert!(matches!(p.to_absolute(), Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn test_matches_relative_and_absolute() {
        let cwd = env::current_dir().expect("no working directory");
        let p = FilePath::new("Cargo.toml");
        assert!(p.matches(cwd.join("Cargo.toml")));
        assert!(p.matches("./Cargo.toml"));
        assert!(!p.matches(cwd.join("Cargo.lock.missing")));
    }

    #[test]
    fn test_read_write_remove() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let p = FilePath::new(dir.path().join("data.txt"));
        assert!(!p.exists());
        assert_eq!(p.read_optional().unwrap(), None); //#[allow_ci]
        assert!(matches!(p.read(), Err(Error::Io { .. })));

        p.write(b"", 0o640).expect("failed to write");
        assert!(p.exists());
        assert_eq!(p.read().unwrap(), ""); //#[allow_ci]
        assert_eq!(p.read_optional().unwrap(), Some(String::new())); //#[allow_ci]
        assert!(p.check_permissions(0o640, 0o007).unwrap()); //#[allow_ci]

        p.write(b"content", 0o600).expect("failed to write");
        assert_eq!(p.read().unwrap(), "content"); //#[allow_ci]
        assert!(p.check_permissions(0o600, 0o077).unwrap()); //#[allow_ci]

        p.remove().expect("failed to remove");
        assert!(!p.exists());
    }

    #[test]
    fn test_check_permissions() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let p = FilePath::new(dir.path().join("key.pem"));
        p.write(b"k", 0o600).expect("failed to write");
        assert!(p.check_permissions(0o600, 0o066).unwrap()); //#[allow_ci]
        assert!(!p.check_permissions(0o644, 0).unwrap()); //#[allow_ci]

        let missing = FilePath::new(dir.path().join("missing"));
        assert!(matches!(
            missing.check_permissions(0o600, 0),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_upgrade_clears_source() {
        let mut p = FilePath::new("/etc/myapp/secretkey.txt");
        let s = p.upgrade();
        assert!(p.is_none());
        assert_eq!(s.get(), Some(Path::new("/etc/myapp/secretkey.txt")));
    }

    #[test]
    fn test_secret_read_requires_0600() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let s = SecretPath::new(dir.path().join("secret.txt"));
        s.write(b"hunter2").expect("failed to write");
        assert!(s.check_permissions().unwrap()); //#[allow_ci]

        let value = s.read().expect("failed to read secret");
        assert_eq!(value.reveal().map(String::as_str), Some("hunter2"));
        assert_eq!(value.to_string(), REDACTED);

        s.set_permissions(0o644).expect("failed to chmod");
        assert!(!s.check_permissions().unwrap()); //#[allow_ci]
        assert!(matches!(s.read(), Err(Error::PermissionDenied { .. })));
    }

    #[test]
    fn test_secret_read_only_owner() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let s = SecretPath::new(dir.path().join("secret.txt"));
        s.write(b"hunter2").expect("failed to write");
        s.set_permissions(0o400).expect("failed to chmod");
        assert!(s.check_permissions().unwrap()); //#[allow_ci]
        assert!(s.read().unwrap().is_some()); //#[allow_ci]

        s.set_permissions(0o440).expect("failed to chmod");
        assert!(matches!(s.read(), Err(Error::PermissionDenied { .. })));
    }

    #[test]
    fn test_secret_read_optional() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let s = SecretPath::new(dir.path().join("missing.txt"));
        assert!(s.read_optional().unwrap().is_none()); //#[allow_ci]
        assert!(matches!(s.read(), Err(Error::Io { .. })));
        assert!(SecretPath::empty().read_optional().unwrap().is_none()); //#[allow_ci]
    }
}
