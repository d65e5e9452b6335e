// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
use crate::{
    crypto::PrivateKey,
    error::{Error, Result},
};
use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    error::ErrorStack,
    hash::MessageDigest,
    nid::Nid,
    x509::{extension, X509Name, X509},
};

static LOCAL_IPS: &[&str] = &["127.0.0.1", "::1"];
static LOCAL_DNS_NAMES: &[&str] = &["localhost"];

/// Builder for self-signed certificates, used to bootstrap development
/// credentials
#[derive(Default)]
pub struct CertificateBuilder<'a> {
    common_name: Option<&'a str>,
    dns_names: Vec<&'a str>,
    ips: Vec<&'a str>,
    not_after: Option<u32>,
    private_key: Option<&'a PrivateKey>,
}

impl<'a> CertificateBuilder<'a> {
    pub fn new() -> CertificateBuilder<'a> {
        CertificateBuilder::default()
    }

    /// Set the subject (and issuer) Common Name
    pub fn common_name(mut self, cn: &'a str) -> Self {
        self.common_name = Some(cn);
        self
    }

    /// Set the certificate expiration date, in days from now (default 365)
    pub fn not_after(mut self, days_from_now: u32) -> Self {
        self.not_after = Some(days_from_now);
        self
    }

    /// Set the key the certificate is issued for and signed with
    pub fn private_key(mut self, private_key: &'a PrivateKey) -> Self {
        self.private_key = Some(private_key);
        self
    }

    /// DNS names added to the Subject Alternative Name, after `localhost`
    pub fn add_dns_names(mut self, dns_names: Vec<&'a str>) -> Self {
        self.dns_names.extend(dns_names);
        self
    }

    /// IPs added to the Subject Alternative Name, after the loopback ones
    pub fn add_ips(mut self, ips: Vec<&'a str>) -> Self {
        self.ips.extend(ips);
        self
    }

    pub fn build(self) -> Result<X509> {
        let builder_error = |message: &str| {
            let message = message.to_string();
            move |source: ErrorStack| Error::openssl(message, source)
        };

        let cn = self.common_name.ok_or_else(|| {
            Error::NotConfigured("certificate common name".into())
        })?;
        let key = self.private_key.ok_or_else(|| {
            Error::NotConfigured("certificate private key".into())
        })?;

        let mut name = X509Name::builder()
            .map_err(builder_error("failed to create X509 Name object"))?;
        name.append_entry_by_nid(Nid::COMMONNAME, cn)
            .map_err(builder_error("failed to set Common Name"))?;
        let name = name.build();

        let mut builder = X509::builder().map_err(builder_error(
            "failed to create X509 certificate builder object",
        ))?;
        builder
            .set_version(2)
            .map_err(builder_error("failed to set X509 certificate version"))?;

        let mut serial = BigNum::new()
            .map_err(builder_error("failed to create serial number"))?;
        serial
            .rand(127, MsbOption::MAYBE_ZERO, false)
            .map_err(builder_error("failed to generate serial number"))?;
        let serial = serial
            .to_asn1_integer()
            .map_err(builder_error("failed to encode serial number"))?;
        builder
            .set_serial_number(&serial)
            .map_err(builder_error("failed to set serial number"))?;

        builder
            .set_subject_name(&name)
            .map_err(builder_error("failed to set subject name"))?;
        // Self-signed certificate, the issuer is the same as the subject
        builder
            .set_issuer_name(&name)
            .map_err(builder_error("failed to set issuer name"))?;

        let valid_from = Asn1Time::days_from_now(0)
            .map_err(builder_error("failed to get ASN.1 Time for now"))?;
        builder
            .set_not_before(&valid_from)
            .map_err(builder_error("failed to set Not Before date"))?;
        let valid_to = Asn1Time::days_from_now(self.not_after.unwrap_or(365))
            .map_err(builder_error("failed to get ASN.1 expiration time"))?;
        builder
            .set_not_after(&valid_to)
            .map_err(builder_error("failed to set Not After date"))?;

        let public = key.public_key()?;
        builder
            .set_pubkey(public.pkey())
            .map_err(builder_error("failed to set certificate public key"))?;

        let mut san = extension::SubjectAlternativeName::new();
        let extra_dns_names = self
            .dns_names
            .iter()
            .filter(|n| !LOCAL_DNS_NAMES.contains(n));
        for dns_name in LOCAL_DNS_NAMES.iter().chain(extra_dns_names) {
            _ = san.dns(dns_name);
        }
        for ip in LOCAL_IPS
            .iter()
            .chain(self.ips.iter().filter(|i| !LOCAL_IPS.contains(i)))
        {
            _ = san.ip(ip);
        }
        let san = san
            .build(&builder.x509v3_context(None, None))
            .map_err(builder_error(
                "failed to build Subject Alternative Name",
            ))?;
        builder
            .append_extension(san)
            .map_err(builder_error(
                "failed to append Subject Alternative Name",
            ))?;

        // Ed25519 signs the message directly, without a separate digest
        let digest = match key {
            PrivateKey::Ed25519(_) => MessageDigest::null(),
            PrivateKey::Rsa(_) | PrivateKey::Dsa(_) | PrivateKey::Ecdsa(_) => {
                MessageDigest::sha256()
            }
        };
        builder
            .sign(key.pkey(), digest)
            .map_err(builder_error("failed to sign X509 certificate"))?;

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::*;

    fn check(key: PrivateKey) {
        let cert = CertificateBuilder::new()
            .common_name("credconf-test")
            .add_dns_names(vec!["service.example", "localhost"])
            .add_ips(vec!["10.0.0.1"])
            .private_key(&key)
            .build()
            .expect("failed to build certificate");

        assert!(key.matches_certificate(&cert).unwrap()); //#[allow_ci]
        let names = cert.subject_alt_names().expect("missing SAN");
        let dns: Vec<&str> = names.iter().filter_map(|n| n.dnsname()).collect();
        assert_eq!(dns, vec!["localhost", "service.example"]);
        assert_eq!(names.iter().filter(|n| n.ipaddress().is_some()).count(), 3);
    }

    #[test]
    fn test_generate_rsa_certificate() {
        check(rsa_generate(2048).unwrap()); //#[allow_ci]
    }

    #[test]
    fn test_generate_ecc_certificate() {
        check(ecc_generate(Nid::SECP384R1).unwrap()); //#[allow_ci]
    }

    #[test]
    fn test_generate_ed25519_certificate() {
        check(ed25519_generate().unwrap()); //#[allow_ci]
    }

    #[test]
    fn test_missing_common_name() {
        let key = rsa_generate(2048).unwrap(); //#[allow_ci]
        let r = CertificateBuilder::new().private_key(&key).build();
        assert!(matches!(r, Err(Error::NotConfigured(_))));
    }
}
