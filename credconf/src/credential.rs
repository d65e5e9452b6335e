// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! PEM credential files.
//!
//! Each handle wraps a path and only hands its content to the openssl
//! parser after the path is known to be configured and the file mode is
//! acceptable.

use crate::{
    crypto::{self, PrivateKey, PublicKey},
    error::{Error, Result},
    path::{FilePath, SecretPath},
    permissions,
};
use log::*;
use openssl::x509::X509;
use std::{fmt, fs};

/// Certificates may be world readable, but nobody but the owner may
/// change them
const CERT_REQUIRE: u32 = permissions::OWNER_READ;
const CERT_FORBID: u32 = permissions::GROUP_WRITE | permissions::OTHER_WRITE;

fn read_public_file(path: &FilePath, what: &str) -> Result<Vec<u8>> {
    let p = path
        .get()
        .ok_or_else(|| Error::NotConfigured(what.to_string()))?;
    permissions::enforce_mode(p, CERT_REQUIRE, CERT_FORBID)?;
    fs::read(p).map_err(|e| Error::io(p, e))
}

/// File holding one or more PEM encoded X.509 certificates, leaf first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateFile(FilePath);

impl CertificateFile {
    pub fn new(path: impl Into<FilePath>) -> Self {
        CertificateFile(path.into())
    }

    pub fn path(&self) -> &FilePath {
        &self.0
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn read_certificates(&self) -> Result<Vec<X509>> {
        let pem = read_public_file(&self.0, "certificate file")?;
        let path = self.0.require()?;
        crypto::parse_certificates(path, &pem)
    }

    /// Write the chain as PEM with mode `0644`
    pub fn write_certificates(&self, certs: &[X509]) -> Result<()> {
        let pem = crypto::certificates_to_pem(certs)?;
        self.0.write(&pem, permissions::PUBLIC_FILE_MODE)
    }
}

impl From<FilePath> for CertificateFile {
    fn from(path: FilePath) -> Self {
        CertificateFile(path)
    }
}

/// File holding exactly one PEM encoded private key
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrivateKeyFile(SecretPath);

impl PrivateKeyFile {
    pub fn new(path: impl Into<SecretPath>) -> Self {
        PrivateKeyFile(path.into())
    }

    pub fn path(&self) -> &SecretPath {
        &self.0
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn read_private_key(&self) -> Result<PrivateKey> {
        let path = self
            .0
            .get()
            .ok_or_else(|| Error::NotConfigured("private key file".into()))?;
        let pem = self.0.read_bytes()?;
        let key = crypto::parse_private_key(path, &pem)?;
        debug!("Loaded {key:?} from {}", path.display());
        Ok(key)
    }

    /// Load the key together with its certificate chain
    ///
    /// The leaf certificate must carry the public half of this key.
    pub fn read_certificate(
        &self,
        cert: &CertificateFile,
    ) -> Result<TlsIdentity> {
        let chain = cert.read_certificates()?;
        let key = self.read_private_key()?;

        // parse_certificates never returns an empty chain
        let matched = match chain.first() {
            Some(leaf) => key.matches_certificate(leaf)?,
            None => false,
        };
        if !matched {
            return Err(Error::KeyCertMismatch {
                cert: cert.path().require()?.to_path_buf(),
                key: self.0.require()?.to_path_buf(),
            });
        }
        Ok(TlsIdentity { chain, key })
    }

    /// Write the key as PKCS#8 PEM with mode `0600`
    pub fn write_private_key(&self, key: &PrivateKey) -> Result<()> {
        self.0.write(&key.to_pem()?)
    }
}

impl From<SecretPath> for PrivateKeyFile {
    fn from(path: SecretPath) -> Self {
        PrivateKeyFile(path)
    }
}

impl From<FilePath> for PrivateKeyFile {
    fn from(path: FilePath) -> Self {
        PrivateKeyFile(SecretPath::from(path))
    }
}

/// File holding one or more PEM encoded public keys
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublicKeyFile(FilePath);

impl PublicKeyFile {
    pub fn new(path: impl Into<FilePath>) -> Self {
        PublicKeyFile(path.into())
    }

    pub fn path(&self) -> &FilePath {
        &self.0
    }

    pub fn read_public_keys(&self) -> Result<Vec<PublicKey>> {
        let pem = read_public_file(&self.0, "public key file")?;
        let path = self.0.require()?;
        let keys = crypto::parse_public_keys(path, &pem)?;
        debug!("Loaded {} public key(s) from {}", keys.len(), path.display());
        Ok(keys)
    }

    pub fn write_public_key(&self, key: &PublicKey) -> Result<()> {
        self.0.write(&key.to_pem()?, permissions::PUBLIC_FILE_MODE)
    }
}

impl From<FilePath> for PublicKeyFile {
    fn from(path: FilePath) -> Self {
        PublicKeyFile(path)
    }
}

/// A certificate chain and the private key of its leaf
#[derive(Clone)]
pub struct TlsIdentity {
    chain: Vec<X509>,
    key: PrivateKey,
}

impl TlsIdentity {
    pub fn leaf(&self) -> Option<&X509> {
        self.chain.first()
    }

    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn into_parts(self) -> (Vec<X509>, PrivateKey) {
        (self.chain, self.key)
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("chain_len", &self.chain.len())
            .field("key", &self.key)
            .finish()
    }
}
