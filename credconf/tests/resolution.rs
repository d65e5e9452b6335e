// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
mod common;

use credconf::{
    env::EnvSource,
    field::{FieldSpec, Scope},
    flags::FlagRegistry,
    http::{HttpServerConfig, HttpServerLoader},
    Error, Loader, Resolver, Result, Sources,
};
use std::fs;
use tempfile::tempdir;

const NAME: FieldSpec = FieldSpec::new("Name", "NAME").required();
const PRIORITY: FieldSpec =
    FieldSpec::new("Priority", "PRIORITY").default_value("1");

#[derive(Clone, Debug)]
struct ServiceConfig {
    name: String,
    priority: u16,
    server: HttpServerConfig,
}

struct ServiceLoader {
    scope: Scope,
    server: HttpServerLoader,
}

impl ServiceLoader {
    fn new() -> Self {
        let scope = Scope::new("APP", "");
        ServiceLoader {
            server: HttpServerLoader::new(scope.clone()),
            scope,
        }
    }
}

impl Loader for ServiceLoader {
    type Output = ServiceConfig;

    fn register(&self, flags: &mut FlagRegistry) {
        self.server.register(flags);
    }

    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&ServiceConfig>,
    ) -> Result<ServiceConfig> {
        Ok(ServiceConfig {
            name: sources.value(
                &self.scope.bind(&NAME),
                previous.map(|p| p.name.clone()),
            )?,
            priority: sources.value(
                &self.scope.bind(&PRIORITY),
                previous.map(|p| p.priority),
            )?,
            server: self
                .server
                .load(sources, previous.map(|p| &p.server))?,
        })
    }
}

fn resolver() -> Resolver<ServiceLoader> {
    Resolver::new(ServiceLoader::new(), FlagRegistry::new("service"))
}

fn env(vars: &[(&str, &str)]) -> EnvSource {
    vars.iter().copied().collect()
}

#[test]
fn test_port_precedence() {
    let mut r = resolver();
    let vars = env(&[("APP_NAME", "svc"), ("APP_BIND_PORT", "8080")]);

    let first = r
        .resolve_args(["service", "--port", "9090"], &vars)
        .expect("failed to resolve");
    assert_eq!(first.server.port, 9090);
    assert_eq!(first.server.remote_address, "http://127.0.0.1:9090");

    // Without the flag the environment wins again
    let second = r
        .resolve_args(["service"], &vars)
        .expect("failed to resolve");
    assert_eq!(second.server.port, 8080);

    // Nothing set at all, the port stays where it was
    let third = r
        .resolve_args(["service"], &env(&[("APP_NAME", "svc")]))
        .expect("failed to resolve");
    assert_eq!(third.server.port, 8080);
}

#[test]
fn test_default_port() {
    let mut r = resolver();
    let snap = r
        .resolve_args(["service"], &env(&[("APP_NAME", "svc")]))
        .expect("failed to resolve");
    assert_eq!(snap.server.port, 80);
    assert_eq!(snap.priority, 1);
}

#[test]
fn test_missing_required_field() {
    let mut r = resolver();
    match r.resolve_args(["service"], &EnvSource::default()) {
        Err(Error::MissingRequiredField(name)) => assert_eq!(name, "Name"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(r.previous().is_none());

    let good = r
        .resolve_args(
            ["service", "--port", "9000"],
            &env(&[("APP_NAME", "svc")]),
        )
        .expect("failed to resolve");

    // A failing cycle leaves the last snapshot in place
    let bad = env(&[("APP_NAME", "other"), ("APP_PRIORITY", "high")]);
    assert!(matches!(
        r.resolve_args(["service"], &bad),
        Err(Error::InvalidValue { .. })
    ));
    let kept = r.previous().expect("previous snapshot lost");
    assert_eq!(kept.name, good.name);
    assert_eq!(kept.server.port, 9000);
}

#[test]
fn test_unknown_flag_keeps_snapshot() {
    let mut r = resolver();
    let vars = env(&[("APP_NAME", "svc")]);
    let _ = r.resolve_args(["service"], &vars).unwrap(); //#[allow_ci]
    assert!(matches!(
        r.resolve_args(["service", "--bogus"], &vars),
        Err(Error::Flags(_))
    ));
    assert!(r.previous().is_some());
}

#[test]
fn test_tls_from_root() {
    let root = tempdir().unwrap(); //#[allow_ci]
    let tls_dir = root.path().join("tls");
    fs::create_dir(&tls_dir).unwrap(); //#[allow_ci]
    let _ = common::write_rsa_pair(&tls_dir);

    let mut r = resolver().with_root(root.path());
    let vars = env(&[
        ("APP_NAME", "svc"),
        ("APP_TLS_ENABLED", "true"),
        ("APP_HOSTNAME", "localhost"),
    ]);

    // Server name is neither set nor waived
    assert!(matches!(
        r.resolve_args(["service"], &vars),
        Err(Error::IncompleteTlsConfig(_))
    ));

    let snap = r
        .resolve_args(["service", "--tls-server-name", "localhost"], &vars)
        .expect("failed to resolve");
    assert!(snap.server.tls.is_enabled());
    assert_eq!(snap.server.port, 443);
    assert_eq!(snap.server.remote_address, "https://localhost");
    assert!(snap.server.tls.acceptor().unwrap().is_some()); //#[allow_ci]
}
