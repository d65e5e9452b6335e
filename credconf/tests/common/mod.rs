// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
#![allow(dead_code)]

use credconf::{
    credential::{CertificateFile, PrivateKeyFile},
    crypto::{self, x509::CertificateBuilder, PrivateKey},
    path::SecretPath,
};
use std::path::Path;

/// Generate an RSA key and a self-signed certificate for it
pub fn rsa_identity() -> (openssl::x509::X509, PrivateKey) {
    let key = crypto::rsa_generate(2048).expect("failed to generate key");
    let cert = CertificateBuilder::new()
        .common_name("localhost")
        .private_key(&key)
        .build()
        .expect("failed to build certificate");
    (cert, key)
}

/// Write a fresh RSA pair as `<dir>/cert.pem` and `<dir>/key.pem`
pub fn write_rsa_pair(dir: &Path) -> (CertificateFile, PrivateKeyFile) {
    let (cert, key) = rsa_identity();
    let cert_file = CertificateFile::new(dir.join("cert.pem"));
    let key_file = PrivateKeyFile::new(SecretPath::new(dir.join("key.pem")));
    cert_file
        .write_certificates(&[cert])
        .expect("failed to write certificate");
    key_file.write_private_key(&key).expect("failed to write key");
    (cert_file, key_file)
}
