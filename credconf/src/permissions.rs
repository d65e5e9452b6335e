// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

use crate::error::{Error, Result};
use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::Path,
};

pub const OWNER_READ: u32 = 0o400;
pub const OWNER_WRITE: u32 = 0o200;
pub const OWNER_READ_WRITE: u32 = OWNER_READ | OWNER_WRITE;
pub const GROUP_WRITE: u32 = 0o020;
pub const OTHER_WRITE: u32 = 0o002;
pub const GROUP_ALL: u32 = 0o070;
pub const OTHER_ALL: u32 = 0o007;
pub const GROUP_OTHER_ALL: u32 = GROUP_ALL | OTHER_ALL;

/// Mode used when writing private keys and secrets
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Mode used when writing certificates and public keys
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// Permission bits (lower 12 bits) of the file at `path`
pub fn file_mode(path: &Path) -> Result<u32> {
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    Ok(meta.permissions().mode() & 0o7777)
}

/// Whether every bit in `require` is set and no bit in `forbid` is set
pub fn mode_satisfies(mode: u32, require: u32, forbid: u32) -> bool {
    mode & require == require && mode & forbid == 0
}

/// Check the mode of the file at `path` against the given masks
pub fn check_mode(path: &Path, require: u32, forbid: u32) -> Result<bool> {
    Ok(mode_satisfies(file_mode(path)?, require, forbid))
}

/// Like [`check_mode`], but a failed check is an error
pub fn enforce_mode(path: &Path, require: u32, forbid: u32) -> Result<()> {
    let mode = file_mode(path)?;
    if mode_satisfies(mode, require, forbid) {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            path: path.to_path_buf(),
            mode,
            require,
            forbid,
        })
    }
}

/// Set file permissions to the given mode
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(path, e))
}
