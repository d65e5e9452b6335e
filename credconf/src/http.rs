// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! Network binding of an HTTP server.
//!
//! [`HttpServerLoader`] resolves where a server listens, how clients reach
//! it and which [`TlsPolicy`] it serves with. Constructing the server from
//! an [`HttpServerConfig`] is left to the caller.

use crate::{
    error::{Error, Result},
    field::{FieldSpec, Scope},
    flags::FlagRegistry,
    resolver::{Loader, Sources},
    tls::{TlsLoader, TlsPolicy},
};
use log::*;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

pub const PROTOCOL: FieldSpec = FieldSpec::new("Protocol", "PROTOCOL")
    .flag("protocol")
    .help("One of http, https, http2 or h2c");
pub const HOSTNAME: FieldSpec = FieldSpec::new("Hostname", "HOSTNAME")
    .flag("hostname")
    .help("Name clients use to reach the server");
pub const BIND_ADDR: FieldSpec = FieldSpec::new("BindAddr", "BIND_ADDR")
    .flag("bind-addr")
    .default_value("127.0.0.1")
    .help("IP address to listen on, empty for all interfaces");
pub const BIND_PORT: FieldSpec = FieldSpec::new("BindPort", "BIND_PORT")
    .flag("port")
    .help("Port to listen on");
pub const READ_TIMEOUT: FieldSpec =
    FieldSpec::new("ReadTimeout", "READ_TIMEOUT")
        .default_value("0")
        .help("Seconds allowed to read a request, 0 for no limit");
pub const READ_HEADER_TIMEOUT: FieldSpec =
    FieldSpec::new("ReadHeaderTimeout", "READ_HEADER_TIMEOUT")
        .default_value("0")
        .help("Seconds allowed to read request headers, 0 for no limit");
pub const MAX_HEADER_BYTES: FieldSpec =
    FieldSpec::new("MaxHeaderBytes", "MAX_HEADER_BYTES")
        .default_value("0")
        .help("Largest accepted request header, 0 for the server default");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Http2,
    /// HTTP/2 without TLS
    H2c,
}

/// HTTP versions a server should accept
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Protocols {
    pub http1: bool,
    pub http2: bool,
    pub unencrypted_http2: bool,
}

impl Protocol {
    /// URL scheme clients connect with
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http | Protocol::H2c => "http",
            Protocol::Https | Protocol::Http2 => "https",
        }
    }

    pub fn protocols(&self) -> Protocols {
        match self {
            Protocol::Http | Protocol::Https => Protocols {
                http1: true,
                ..Default::default()
            },
            Protocol::Http2 => Protocols {
                http2: true,
                ..Default::default()
            },
            Protocol::H2c => Protocols {
                unencrypted_http2: true,
                ..Default::default()
            },
        }
    }

    /// Port implied by the scheme, if there is a standard one
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Protocol::Http => Some(80),
            Protocol::Https => Some(443),
            Protocol::Http2 | Protocol::H2c => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Http2 => "http2",
            Protocol::H2c => "h2c",
        };
        f.write_str(name)
    }
}

/// Everything needed to start an HTTP server
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    pub protocol: Protocol,
    pub protocols: Protocols,
    /// The configured hostname, or the bind address when none was given
    pub hostname: String,
    pub bind_addr: String,
    pub port: u16,
    /// `scheme://hostname[:port]`, the port omitted when it is the default
    pub remote_address: String,
    pub tls: TlsPolicy,
    pub read_timeout: Duration,
    pub read_header_timeout: Duration,
    pub max_header_bytes: usize,
    socket_addr: SocketAddr,
    protocol_defaulted: bool,
    hostname_defaulted: bool,
    port_defaulted: bool,
}

impl HttpServerConfig {
    /// Address to bind the listener to
    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }

    /// Whether the port came from the protocol rather than configuration
    pub fn port_defaulted(&self) -> bool {
        self.port_defaulted
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_read_header_timeout(mut self, timeout: Duration) -> Self {
        self.read_header_timeout = timeout;
        self
    }

    pub fn with_max_header_bytes(mut self, count: usize) -> Self {
        self.max_header_bytes = count;
        self
    }
}

fn bind_ip(field: &str, addr: &str) -> Result<IpAddr> {
    if addr.is_empty() {
        return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    addr.parse().map_err(|e: std::net::AddrParseError| {
        Error::InvalidValue {
            field: field.to_string(),
            value: addr.to_string(),
            reason: e.to_string(),
        }
    })
}

fn remote_address(
    protocol: Protocol,
    hostname: &str,
    port: u16,
    defaulted: bool,
) -> String {
    let host = if hostname.parse::<Ipv6Addr>().is_ok() {
        format!("[{hostname}]")
    } else {
        hostname.to_string()
    };
    if defaulted {
        format!("{}://{host}", protocol.scheme())
    } else {
        format!("{}://{host}:{port}", protocol.scheme())
    }
}

/// Loads an [`HttpServerConfig`] from one scope
#[derive(Clone, Debug, Default)]
pub struct HttpServerLoader {
    scope: Scope,
    tls: TlsLoader,
}

impl HttpServerLoader {
    /// TLS fields are read from the same scope
    pub fn new(scope: Scope) -> Self {
        HttpServerLoader {
            tls: TlsLoader::new(scope.clone()),
            scope,
        }
    }
}

impl Loader for HttpServerLoader {
    type Output = HttpServerConfig;

    fn register(&self, flags: &mut FlagRegistry) {
        for spec in [
            &PROTOCOL,
            &HOSTNAME,
            &BIND_ADDR,
            &BIND_PORT,
            &READ_TIMEOUT,
            &READ_HEADER_TIMEOUT,
            &MAX_HEADER_BYTES,
        ] {
            let _ = flags.register(&self.scope.bind(spec));
        }
        self.tls.register(flags);
    }

    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&HttpServerConfig>,
    ) -> Result<HttpServerConfig> {
        let tls = self.tls.load(sources, previous.map(|p| &p.tls))?;

        // Values derived from other fields are recomputed, not carried over
        let (protocol, protocol_defaulted) = match sources.optional(
            &self.scope.bind(&PROTOCOL),
            previous.filter(|p| !p.protocol_defaulted).map(|p| p.protocol),
        )? {
            Some(protocol) => (protocol, false),
            None if tls.is_enabled() => (Protocol::Https, true),
            None => (Protocol::Http, true),
        };

        let bind_field = self.scope.bind(&BIND_ADDR);
        let bind_addr: String =
            sources.value(&bind_field, previous.map(|p| p.bind_addr.clone()))?;
        let ip = bind_ip(bind_field.name(), &bind_addr)?;

        let (hostname, hostname_defaulted) = match sources.optional(
            &self.scope.bind(&HOSTNAME),
            previous
                .filter(|p| !p.hostname_defaulted)
                .map(|p| p.hostname.clone()),
        )? {
            Some(hostname) => (hostname, false),
            None => (bind_addr.clone(), true),
        };

        let port_field = self.scope.bind(&BIND_PORT);
        let previous_port = previous
            .filter(|p| !p.port_defaulted)
            .map(|p| p.port);
        let (port, port_defaulted) =
            match sources.optional(&port_field, previous_port)? {
                Some(port) => (port, false),
                None => match protocol.default_port() {
                    Some(port) => (port, true),
                    None => {
                        return Err(Error::MissingRequiredField(
                            port_field.name().to_string(),
                        ))
                    }
                },
            };

        let read_timeout: u64 = sources.value(
            &self.scope.bind(&READ_TIMEOUT),
            previous.map(|p| p.read_timeout.as_secs()),
        )?;
        let read_header_timeout: u64 = sources.value(
            &self.scope.bind(&READ_HEADER_TIMEOUT),
            previous.map(|p| p.read_header_timeout.as_secs()),
        )?;
        let max_header_bytes = sources.value(
            &self.scope.bind(&MAX_HEADER_BYTES),
            previous.map(|p| p.max_header_bytes),
        )?;

        let remote_address =
            remote_address(protocol, &hostname, port, port_defaulted);
        debug!("HTTP server reachable at {remote_address}");

        Ok(HttpServerConfig {
            protocol,
            protocols: protocol.protocols(),
            hostname,
            bind_addr,
            port,
            remote_address,
            tls,
            read_timeout: Duration::from_secs(read_timeout),
            read_header_timeout: Duration::from_secs(read_header_timeout),
            max_header_bytes,
            socket_addr: SocketAddr::new(ip, port),
            protocol_defaulted,
            hostname_defaulted,
            port_defaulted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{env::EnvSource, flags::FlagValues};

    fn load(
        env: &[(&str, &str)],
        previous: Option<&HttpServerConfig>,
    ) -> Result<HttpServerConfig> {
        let loader = HttpServerLoader::new(Scope::new("SRV", "srv"));
        let flags = FlagValues::default();
        let env: EnvSource = env.iter().copied().collect();
        loader.load(&Sources::new(&flags, &env), previous)
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(Protocol::H2c.to_string(), "h2c");
        assert_eq!(Protocol::Http2.scheme(), "https");
        assert_eq!(Protocol::H2c.scheme(), "http");
        assert!(Protocol::Https.protocols().http1);
        assert!(Protocol::H2c.protocols().unencrypted_http2);
        assert!(!Protocol::Http2.protocols().http1);
    }

    #[test]
    fn test_defaults() {
        let c = load(&[], None).unwrap(); //#[allow_ci]
        assert_eq!(c.protocol, Protocol::Http);
        assert_eq!(c.bind_addr, "127.0.0.1");
        assert_eq!(c.hostname, "127.0.0.1");
        assert_eq!(c.port, 80);
        assert!(c.port_defaulted());
        assert_eq!(c.remote_address, "http://127.0.0.1");
        assert_eq!(c.socket_addr(), "127.0.0.1:80".parse().unwrap()); //#[allow_ci]
        assert!(!c.tls.is_enabled());
        assert_eq!(c.read_timeout, Duration::ZERO);
    }

    #[test]
    fn test_explicit_values() {
        let c = load(
            &[
                ("SRV_PROTOCOL", "h2c"),
                ("SRV_BIND_ADDR", ""),
                ("SRV_HOSTNAME", "api.example"),
                ("SRV_BIND_PORT", "8443"),
                ("SRV_READ_TIMEOUT", "30"),
                ("SRV_MAX_HEADER_BYTES", "16384"),
            ],
            None,
        )
        .unwrap(); //#[allow_ci]
        assert_eq!(c.protocol, Protocol::H2c);
        assert_eq!(c.remote_address, "http://api.example:8443");
        assert_eq!(c.socket_addr(), "0.0.0.0:8443".parse().unwrap()); //#[allow_ci]
        assert_eq!(c.read_timeout, Duration::from_secs(30));
        assert_eq!(c.max_header_bytes, 16384);

        let c = c.with_read_header_timeout(Duration::from_secs(5));
        assert_eq!(c.read_header_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_ipv6_remote_address() {
        let env = [("SRV_BIND_ADDR", "::1"), ("SRV_BIND_PORT", "8080")];
        let c = load(&env, None).unwrap(); //#[allow_ci]
        assert_eq!(c.remote_address, "http://[::1]:8080");
    }

    #[test]
    fn test_port_required_without_standard_port() {
        assert!(matches!(
            load(&[("SRV_PROTOCOL", "http2")], None),
            Err(Error::MissingRequiredField(ref f)) if f == "BindPort"
        ));
    }

    #[test]
    fn test_invalid_bind_addr() {
        assert!(matches!(
            load(&[("SRV_BIND_ADDR", "localhost")], None),
            Err(Error::InvalidValue { ref field, .. }) if field == "BindAddr"
        ));
    }

    #[test]
    fn test_defaulted_port_follows_protocol() {
        let first = load(&[], None).unwrap(); //#[allow_ci]
        assert_eq!(first.port, 80);

        let second =
            load(&[("SRV_PROTOCOL", "https")], Some(&first)).unwrap(); //#[allow_ci]
        assert_eq!(second.port, 443);
        assert_eq!(second.remote_address, "https://127.0.0.1");

        let third =
            load(&[("SRV_BIND_PORT", "9000")], Some(&second)).unwrap(); //#[allow_ci]
        let fourth = load(&[], Some(&third)).unwrap(); //#[allow_ci]
        assert_eq!(fourth.port, 9000);
        assert!(!fourth.port_defaulted());
    }

    #[test]
    fn test_derived_values_recomputed() {
        let first = load(&[], None).unwrap(); //#[allow_ci]
        let second =
            load(&[("SRV_BIND_ADDR", "10.0.0.5")], Some(&first)).unwrap(); //#[allow_ci]
        assert_eq!(second.hostname, "10.0.0.5");
        assert_eq!(second.bind_addr, "10.0.0.5");
        assert_eq!(second.protocol, Protocol::Http);
    }
}
