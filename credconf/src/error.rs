// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No value or path was set where one is required
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// The path cannot be made absolute
    #[error("invalid path '{}': {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Failure to stat, read, write or remove a file
    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File mode does not satisfy the required policy
    #[error(
        "{} has mode {mode:#o}, expected bits {require:#o} set and {forbid:#o} clear",
        .path.display()
    )]
    PermissionDenied {
        path: PathBuf,
        mode: u32,
        require: u32,
        forbid: u32,
    },

    /// Malformed PEM or key content
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Certificate public key and private key do not belong together
    #[error(
        "private key {} does not match certificate {}",
        .key.display(),
        .cert.display()
    )]
    KeyCertMismatch { cert: PathBuf, key: PathBuf },

    /// Key algorithm outside of RSA, DSA, ECDSA and Ed25519
    #[error("unknown key type {id} in {}", .path.display())]
    UnknownKeyType { path: PathBuf, id: String },

    /// TLS was enabled without the material needed to use it
    #[error("incomplete TLS configuration: {0}")]
    IncompleteTlsConfig(String),

    /// Required field without a value from any source
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    /// A source supplied a value that does not parse as the field type
    #[error("invalid value '{value}' for field {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The command line was rejected
    #[error("failed to parse command line flags")]
    Flags(#[from] clap::Error),

    /// Environment variables could not be collected
    #[error("failed to collect environment variables")]
    Environment(#[from] config::ConfigError),

    /// TLS handshake with a peer failed
    #[error("TLS handshake with {server_name} failed: {message}")]
    Handshake { server_name: String, message: String },

    /// Error generated by openssl
    #[error("openssl error: {message}")]
    Openssl {
        message: String,
        #[source]
        source: openssl::error::ErrorStack,
    },
}

impl Error {
    pub(crate) fn io(
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn openssl(
        message: impl Into<String>,
        source: openssl::error::ErrorStack,
    ) -> Self {
        Error::Openssl {
            message: message.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_field() {
        let e = Error::MissingRequiredField("Name".into());
        assert_eq!(e.to_string(), "missing required field: Name");
    }

    #[test]
    fn test_permission_denied_shows_octal() {
        let e = Error::PermissionDenied {
            path: PathBuf::from("/tmp/key.pem"),
            mode: 0o644,
            require: 0o600,
            forbid: 0o077,
        };
        let msg = e.to_string();
        assert!(msg.contains("0o644"), "{msg}");
        assert!(msg.contains("0o77"), "{msg}");
    }
}
