// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

pub mod x509;

use crate::error::{Error, Result};
use log::*;
use openssl::{
    ec::{EcGroup, EcKey},
    nid::Nid,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
    x509::X509,
};
use std::{fmt, path::Path};

/// Algorithm family of a key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Dsa,
    Ecdsa,
    Ed25519,
    Unknown,
}

impl KeyType {
    pub fn from_id(id: Id) -> KeyType {
        match id {
            Id::RSA => KeyType::Rsa,
            Id::DSA => KeyType::Dsa,
            Id::EC => KeyType::Ecdsa,
            Id::ED25519 => KeyType::Ed25519,
            _ => KeyType::Unknown,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyType::Rsa => "RSA",
            KeyType::Dsa => "DSA",
            KeyType::Ecdsa => "ECDSA",
            KeyType::Ed25519 => "Ed25519",
            KeyType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A parsed private key of a supported algorithm
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(PKey<Private>),
    Dsa(PKey<Private>),
    Ecdsa(PKey<Private>),
    Ed25519(PKey<Private>),
}

impl PrivateKey {
    /// Classify an openssl key. Unsupported algorithms return the key id.
    pub fn from_pkey(
        pkey: PKey<Private>,
    ) -> std::result::Result<Self, String> {
        match KeyType::from_id(pkey.id()) {
            KeyType::Rsa => Ok(PrivateKey::Rsa(pkey)),
            KeyType::Dsa => Ok(PrivateKey::Dsa(pkey)),
            KeyType::Ecdsa => Ok(PrivateKey::Ecdsa(pkey)),
            KeyType::Ed25519 => Ok(PrivateKey::Ed25519(pkey)),
            KeyType::Unknown => Err(format!("{:?}", pkey.id())),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Rsa(_) => KeyType::Rsa,
            PrivateKey::Dsa(_) => KeyType::Dsa,
            PrivateKey::Ecdsa(_) => KeyType::Ecdsa,
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    pub fn pkey(&self) -> &PKey<Private> {
        match self {
            PrivateKey::Rsa(k)
            | PrivateKey::Dsa(k)
            | PrivateKey::Ecdsa(k)
            | PrivateKey::Ed25519(k) => k,
        }
    }

    pub fn bits(&self) -> u32 {
        self.pkey().bits()
    }

    /// Public half of the key
    pub fn public_key(&self) -> Result<PublicKey> {
        let der = self.pkey().public_key_to_der().map_err(|source| {
            Error::openssl("failed to encode public key in DER format", source)
        })?;
        let public = PKey::public_key_from_der(&der).map_err(|source| {
            Error::openssl("failed to decode public key from DER", source)
        })?;
        // The algorithm family is preserved by the DER round trip
        Ok(match self {
            PrivateKey::Rsa(_) => PublicKey::Rsa(public),
            PrivateKey::Dsa(_) => PublicKey::Dsa(public),
            PrivateKey::Ecdsa(_) => PublicKey::Ecdsa(public),
            PrivateKey::Ed25519(_) => PublicKey::Ed25519(public),
        })
    }

    /// Whether the certificate carries the public half of this key
    pub fn matches_certificate(&self, cert: &X509) -> Result<bool> {
        let cert_key = cert.public_key().map_err(|source| {
            Error::openssl("failed to get certificate public key", source)
        })?;
        Ok(cert_key.public_eq(self.pkey()))
    }

    /// Encode the key in PKCS#8 PEM format
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        self.pkey().private_key_to_pem_pkcs8().map_err(|source| {
            Error::openssl(
                "failed to encode private key in PKCS#8 format",
                source,
            )
        })
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, {} bits)", self.key_type(), self.bits())
    }
}

/// A parsed public key of a supported algorithm
#[derive(Clone)]
pub enum PublicKey {
    Rsa(PKey<Public>),
    Dsa(PKey<Public>),
    Ecdsa(PKey<Public>),
    Ed25519(PKey<Public>),
}

impl PublicKey {
    pub fn from_pkey(pkey: PKey<Public>) -> std::result::Result<Self, String> {
        match KeyType::from_id(pkey.id()) {
            KeyType::Rsa => Ok(PublicKey::Rsa(pkey)),
            KeyType::Dsa => Ok(PublicKey::Dsa(pkey)),
            KeyType::Ecdsa => Ok(PublicKey::Ecdsa(pkey)),
            KeyType::Ed25519 => Ok(PublicKey::Ed25519(pkey)),
            KeyType::Unknown => Err(format!("{:?}", pkey.id())),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Rsa(_) => KeyType::Rsa,
            PublicKey::Dsa(_) => KeyType::Dsa,
            PublicKey::Ecdsa(_) => KeyType::Ecdsa,
            PublicKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    pub fn pkey(&self) -> &PKey<Public> {
        match self {
            PublicKey::Rsa(k)
            | PublicKey::Dsa(k)
            | PublicKey::Ecdsa(k)
            | PublicKey::Ed25519(k) => k,
        }
    }

    pub fn bits(&self) -> u32 {
        self.pkey().bits()
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        self.pkey().public_key_to_pem().map_err(|source| {
            Error::openssl("failed to encode public key in PEM format", source)
        })
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.pkey().public_eq(other.pkey())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}, {} bits)", self.key_type(), self.bits())
    }
}

/// One `-----BEGIN <label>-----` ... `-----END <label>-----` section
#[derive(Debug, PartialEq, Eq)]
struct PemBlock<'a> {
    label: &'a str,
    text: &'a str,
}

/// Split PEM text into labelled blocks, leaving decoding to openssl
fn pem_blocks(text: &str) -> Vec<PemBlock<'_>> {
    let mut blocks = Vec::new();
    let mut open: Option<(&str, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim();

        if let Some(label) = trimmed
            .strip_prefix("-----BEGIN ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            open = Some((label, start));
        } else if let Some(label) = trimmed
            .strip_prefix("-----END ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            if let Some((begin_label, begin)) = open.take() {
                if begin_label == label {
                    blocks.push(PemBlock {
                        label,
                        text: &text[begin..offset],
                    });
                }
            }
        }
    }
    blocks
}

fn pem_text<'a>(path: &Path, pem: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(pem)
        .map_err(|e| Error::parse(path, format!("content is not UTF-8: {e}")))
}

/// Parse every certificate in `pem`. At least one is required.
pub fn parse_certificates(path: &Path, pem: &[u8]) -> Result<Vec<X509>> {
    let certs = X509::stack_from_pem(pem).map_err(|e| {
        Error::parse(path, format!("invalid certificate PEM: {e}"))
    })?;
    if certs.is_empty() {
        return Err(Error::parse(path, "no certificate found"));
    }
    debug!("Loaded {} certificate(s) from {}", certs.len(), path.display());
    Ok(certs)
}

/// Parse exactly one private key from `pem`
pub fn parse_private_key(path: &Path, pem: &[u8]) -> Result<PrivateKey> {
    let text = pem_text(path, pem)?;
    let mut keys: Vec<PKey<Private>> = Vec::new();

    for block in pem_blocks(text)
        .into_iter()
        .filter(|b| b.label.ends_with("PRIVATE KEY"))
    {
        if block.label == "ENCRYPTED PRIVATE KEY" {
            return Err(Error::parse(
                path,
                "encrypted private keys are not supported",
            ));
        }
        // An empty passphrase keeps openssl from prompting on the terminal
        match PKey::private_key_from_pem_callback(
            block.text.as_bytes(),
            |_| Ok(0),
        ) {
            Ok(k) => keys.push(k),
            Err(e) => {
                debug!(
                    "Skipping undecodable {} block in {}: {e}",
                    block.label,
                    path.display()
                );
            }
        }
    }

    let pkey = match keys.len() {
        0 => return Err(Error::parse(path, "no private key found")),
        1 => keys.remove(0),
        n => {
            return Err(Error::parse(
                path,
                format!("expected exactly one private key, found {n}"),
            ))
        }
    };

    PrivateKey::from_pkey(pkey).map_err(|id| Error::UnknownKeyType {
        path: path.to_path_buf(),
        id,
    })
}

/// Parse all public keys in `pem`. At least one is required.
pub fn parse_public_keys(path: &Path, pem: &[u8]) -> Result<Vec<PublicKey>> {
    let text = pem_text(path, pem)?;
    let mut keys = Vec::new();

    for block in pem_blocks(text) {
        let decoded = match block.label {
            "PUBLIC KEY" => PKey::public_key_from_pem(block.text.as_bytes()),
            "RSA PUBLIC KEY" => {
                Rsa::public_key_from_pem_pkcs1(block.text.as_bytes())
                    .and_then(PKey::from_rsa)
            }
            _ => continue,
        };
        match decoded {
            Ok(pkey) => {
                let key = PublicKey::from_pkey(pkey).map_err(|id| {
                    Error::UnknownKeyType {
                        path: path.to_path_buf(),
                        id,
                    }
                })?;
                keys.push(key);
            }
            Err(e) => {
                debug!(
                    "Skipping undecodable {} block in {}: {e}",
                    block.label,
                    path.display()
                );
            }
        }
    }

    if keys.is_empty() {
        return Err(Error::parse(path, "no public key found"));
    }
    Ok(keys)
}

/// Encode certificates as concatenated PEM blocks
pub fn certificates_to_pem(certs: &[X509]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for cert in certs {
        out.extend(cert.to_pem().map_err(|source| {
            Error::openssl(
                "failed to encode X509 certificate in PEM format",
                source,
            )
        })?);
    }
    Ok(out)
}

/// Generate an RSA private key with the given size
pub fn rsa_generate(key_size: u32) -> Result<PrivateKey> {
    let rsa = Rsa::generate(key_size).map_err(|source| {
        Error::openssl("failed to generate RSA key pair", source)
    })?;
    let pkey = PKey::from_rsa(rsa).map_err(|source| {
        Error::openssl(
            "failed to create PKey structure from RSA structure",
            source,
        )
    })?;
    Ok(PrivateKey::Rsa(pkey))
}

/// Generate an ECDSA private key on the given named curve
pub fn ecc_generate(curve: Nid) -> Result<PrivateKey> {
    let group = EcGroup::from_curve_name(curve).map_err(|source| {
        Error::openssl("failed to create EcGroup from NID", source)
    })?;
    let ec = EcKey::generate(&group).map_err(|source| {
        Error::openssl("failed to generate EC private key", source)
    })?;
    let pkey = PKey::from_ec_key(ec).map_err(|source| {
        Error::openssl(
            "failed to create PKey structure from EcKey structure",
            source,
        )
    })?;
    Ok(PrivateKey::Ecdsa(pkey))
}

/// Generate an Ed25519 private key
pub fn ed25519_generate() -> Result<PrivateKey> {
    let pkey = PKey::generate_ed25519().map_err(|source| {
        Error::openssl("failed to generate Ed25519 private key", source)
    })?;
    Ok(PrivateKey::Ed25519(pkey))
}
