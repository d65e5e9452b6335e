// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! Transport security policy.
//!
//! A [`TlsPolicy`] is produced on every resolution cycle, also when TLS is
//! disabled. The protocol floor, curve order and cipher suites are fixed
//! and cannot be changed through configuration.

use crate::{
    credential::{CertificateFile, PrivateKeyFile},
    crypto::PrivateKey,
    error::{Error, Result},
    field::{FieldSpec, Scope},
    flags::FlagRegistry,
    path::FilePath,
    resolver::{Loader, Sources},
};
use log::*;
use openssl::{
    ssl::{
        ConnectConfiguration, SslAcceptor, SslConnector, SslContextBuilder,
        SslMethod, SslStream, SslVerifyMode, SslVersion,
    },
    x509::X509,
};
use std::{
    fmt,
    io::{Read, Write},
};

pub const MIN_PROTOCOL_VERSION: SslVersion = SslVersion::TLS1_3;

/// Key exchange groups, most preferred first
pub const CURVE_PREFERENCES: &[&str] = &["P-521", "P-384", "P-256"];

/// TLS 1.3 cipher suites, most preferred first
pub const CIPHER_SUITES: &[&str] =
    &["TLS_AES_256_GCM_SHA384", "TLS_CHACHA20_POLY1305_SHA256"];

pub const TLS_ENABLED: FieldSpec = FieldSpec::new("TlsEnabled", "TLS_ENABLED")
    .flag("tls-enabled")
    .switch()
    .default_value("false")
    .help("Serve and connect over TLS");
pub const TLS_SERVER_NAME: FieldSpec =
    FieldSpec::new("TlsServerName", "TLS_SERVER_NAME")
        .flag("tls-server-name")
        .help("Name expected in the peer certificate");
pub const TLS_SKIP_VERIFY: FieldSpec =
    FieldSpec::new("TlsSkipVerify", "TLS_SKIP_VERIFY")
        .flag("tls-skip-verify")
        .switch()
        .default_value("false")
        .help("Do not verify the peer certificate");
pub const TLS_CERT: FieldSpec = FieldSpec::new("TlsCert", "TLS_CERT")
    .flag("tls-cert")
    .default_value("tls/cert.pem")
    .help("PEM certificate chain, leaf first");
pub const TLS_KEY: FieldSpec = FieldSpec::new("TlsKey", "TLS_KEY")
    .flag("tls-key")
    .default_value("tls/key.pem")
    .help("PEM private key of the leaf certificate");

fn context_error(
    message: &str,
) -> impl FnOnce(openssl::error::ErrorStack) -> Error {
    let message = message.to_string();
    move |source| Error::openssl(message, source)
}

/// Inputs of a [`TlsPolicy`] before validation
#[derive(Clone, Debug, Default)]
pub struct TlsSettings {
    pub enabled: Option<bool>,
    pub server_name: Option<String>,
    pub skip_verify: Option<bool>,
    pub certificate: CertificateFile,
    pub private_key: PrivateKeyFile,
}

impl TlsSettings {
    /// Validate the settings and load the credentials when enabled
    pub fn build(&self) -> Result<TlsPolicy> {
        let enabled = self.enabled.unwrap_or(false);
        let skip_verify = self.skip_verify.unwrap_or(false);

        let mut policy = TlsPolicy {
            enabled,
            server_name: self.server_name.clone(),
            skip_verify,
            certificate_chain: Vec::new(),
            private_key: None,
            certificate: self.certificate.clone(),
            private_key_file: self.private_key.clone(),
        };

        if !enabled {
            warn!("TLS is disabled");
            return Ok(policy);
        }

        if self.certificate.is_none() || self.private_key.is_none() {
            return Err(Error::IncompleteTlsConfig(
                "TLS is enabled, but the certificate or key file is not set"
                    .into(),
            ));
        }
        if self.server_name.is_none() && !skip_verify {
            // No peer identity could be validated
            return Err(Error::IncompleteTlsConfig(
                "TLS is enabled without a server name and with verification on"
                    .into(),
            ));
        }
        if skip_verify {
            warn!("TLS peer verification is disabled");
        }

        let (chain, key) = self
            .private_key
            .read_certificate(&self.certificate)?
            .into_parts();
        policy.certificate_chain = chain;
        policy.private_key = Some(key);
        Ok(policy)
    }
}

/// Validated transport security configuration
#[derive(Clone)]
pub struct TlsPolicy {
    enabled: bool,
    server_name: Option<String>,
    skip_verify: bool,
    certificate_chain: Vec<X509>,
    private_key: Option<PrivateKey>,
    certificate: CertificateFile,
    private_key_file: PrivateKeyFile,
}

impl TlsPolicy {
    /// Policy with TLS turned off
    pub fn disabled() -> Self {
        TlsPolicy {
            enabled: false,
            server_name: None,
            skip_verify: false,
            certificate_chain: Vec::new(),
            private_key: None,
            certificate: CertificateFile::default(),
            private_key_file: PrivateKeyFile::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn skip_verify(&self) -> bool {
        self.skip_verify
    }

    pub fn certificate_chain(&self) -> &[X509] {
        &self.certificate_chain
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    /// Where the chain was loaded from
    pub fn certificate_file(&self) -> &CertificateFile {
        &self.certificate
    }

    /// Where the key was loaded from
    pub fn private_key_file(&self) -> &PrivateKeyFile {
        &self.private_key_file
    }

    fn identity(&self) -> Result<(&X509, &PrivateKey)> {
        match (self.certificate_chain.first(), &self.private_key) {
            (Some(leaf), Some(key)) => Ok((leaf, key)),
            _ => Err(Error::IncompleteTlsConfig(
                "no certificate or private key loaded".into(),
            )),
        }
    }

    fn apply(&self, builder: &mut SslContextBuilder) -> Result<()> {
        builder
            .set_min_proto_version(Some(MIN_PROTOCOL_VERSION))
            .map_err(context_error("failed to set minimum TLS version"))?;
        builder
            .set_groups_list(&CURVE_PREFERENCES.join(":"))
            .map_err(context_error("failed to set TLS groups"))?;
        builder
            .set_ciphersuites(&CIPHER_SUITES.join(":"))
            .map_err(context_error("failed to set TLS cipher suites"))?;
        Ok(())
    }

    fn set_identity(&self, builder: &mut SslContextBuilder) -> Result<()> {
        let (leaf, key) = self.identity()?;
        builder
            .set_certificate(leaf)
            .map_err(context_error("failed to set TLS certificate"))?;
        for cert in self.certificate_chain.iter().skip(1) {
            builder
                .add_extra_chain_cert(cert.clone())
                .map_err(context_error(
                    "failed to add TLS chain certificate",
                ))?;
        }
        builder
            .set_private_key(key.pkey())
            .map_err(context_error("failed to set TLS private key"))?;
        builder
            .check_private_key()
            .map_err(context_error("TLS private key does not match"))
    }

    /// Server context, or `None` when TLS is disabled
    pub fn acceptor(&self) -> Result<Option<SslAcceptor>> {
        if !self.enabled {
            return Ok(None);
        }
        let mut builder =
            SslAcceptor::mozilla_modern_v5(SslMethod::tls_server()).map_err(
                context_error("failed to create TLS acceptor builder"),
            )?;
        self.apply(&mut builder)?;
        self.set_identity(&mut builder)?;
        Ok(Some(builder.build()))
    }

    /// Client context
    ///
    /// When TLS is enabled the loaded identity is offered to the peer.
    pub fn connector(&self) -> Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())
            .map_err(context_error("failed to create TLS connector builder"))?;
        self.apply(&mut builder)?;
        if self.enabled {
            self.set_identity(&mut builder)?;
        }
        if self.skip_verify {
            builder.set_verify(SslVerifyMode::NONE);
        }
        Ok(builder.build())
    }

    /// Per connection settings for `connector`
    pub fn configure(
        &self,
        connector: &SslConnector,
    ) -> Result<ConnectConfiguration> {
        let mut config = connector
            .configure()
            .map_err(context_error("failed to configure TLS connection"))?;
        if self.skip_verify {
            config.set_verify_hostname(false);
        }
        Ok(config)
    }

    /// Run the client handshake over `stream`
    ///
    /// The peer certificate is checked against the configured server name,
    /// which is also sent as SNI. Without a server name the handshake only
    /// proceeds when verification is skipped.
    pub fn connect<S>(
        &self,
        connector: &SslConnector,
        stream: S,
    ) -> Result<SslStream<S>>
    where
        S: Read + Write + fmt::Debug,
    {
        let mut config = self.configure(connector)?;
        let server_name = match (&self.server_name, self.skip_verify) {
            (Some(name), _) => name.as_str(),
            (None, true) => {
                config.set_use_server_name_indication(false);
                ""
            }
            (None, false) => {
                return Err(Error::IncompleteTlsConfig(
                    "no server name to verify the peer against".into(),
                ))
            }
        };
        config
            .connect(server_name, stream)
            .map_err(|e| Error::Handshake {
                server_name: server_name.to_string(),
                message: e.to_string(),
            })
    }
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsPolicy")
            .field("enabled", &self.enabled)
            .field("server_name", &self.server_name)
            .field("skip_verify", &self.skip_verify)
            .field("chain_len", &self.certificate_chain.len())
            .field("private_key", &self.private_key)
            .finish()
    }
}

/// Loads a [`TlsPolicy`] from the `TLS_*` fields of a scope
#[derive(Clone, Debug, Default)]
pub struct TlsLoader {
    scope: Scope,
}

impl TlsLoader {
    pub fn new(scope: Scope) -> Self {
        TlsLoader { scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Loader for TlsLoader {
    type Output = TlsPolicy;

    fn register(&self, flags: &mut FlagRegistry) {
        for spec in [
            &TLS_ENABLED,
            &TLS_SERVER_NAME,
            &TLS_SKIP_VERIFY,
            &TLS_CERT,
            &TLS_KEY,
        ] {
            let _ = flags.register(&self.scope.bind(spec));
        }
    }

    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&TlsPolicy>,
    ) -> Result<TlsPolicy> {
        let previous_cert = previous.map(|p| p.certificate.path());
        let previous_key = previous
            .and_then(|p| p.private_key_file.path().get())
            .map(FilePath::new);

        let settings = TlsSettings {
            enabled: sources.optional(
                &self.scope.bind(&TLS_ENABLED),
                previous.map(|p| p.enabled),
            )?,
            server_name: sources.optional(
                &self.scope.bind(&TLS_SERVER_NAME),
                previous.and_then(|p| p.server_name.clone()),
            )?,
            skip_verify: sources.optional(
                &self.scope.bind(&TLS_SKIP_VERIFY),
                previous.map(|p| p.skip_verify),
            )?,
            certificate: CertificateFile::from(
                sources.path(&self.scope.bind(&TLS_CERT), previous_cert)?,
            ),
            private_key: PrivateKeyFile::from(sources.path(
                &self.scope.bind(&TLS_KEY),
                previous_key.as_ref(),
            )?),
        };
        settings.build()
    }
}
