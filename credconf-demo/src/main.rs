// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
use anyhow::{Context, Result};
use credconf::{flags::FlagRegistry, Error, Resolver};
use log::*;
use std::path::PathBuf;

mod app_config;

use app_config::{MyAppLoader, DEFAULT_ROOT};

/// Overrides the directory relative default paths are resolved against
const ROOT_ENV_VAR: &str = "MY_APP_CONFIG_ROOT";

fn main() -> Result<()> {
    pretty_env_logger::init();

    let root = std::env::var_os(ROOT_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
    let mut resolver =
        Resolver::new(MyAppLoader::new(), FlagRegistry::new("credconf-demo"))
            .with_root(&root);

    let conf = match resolver.update() {
        Ok(conf) => conf,
        // Prints usage for --help as well as for bad flags
        Err(Error::Flags(e)) => e.exit(),
        Err(e) => {
            return Err(e).context(format!(
                "failed to load configuration from {}",
                root.display()
            ))
        }
    };

    let service = &conf.service;
    info!(
        "Starting server for Name: {} NodeID: {}",
        service.name, service.node_id
    );
    info!("Secret key: {}", service.secret_key);
    info!(
        "Listening on {}, reachable at {}",
        service.server.socket_addr(),
        service.server.remote_address
    );
    info!("Database at {}:{}", conf.db.address, conf.db.port);
    debug!("{conf:#?}");

    match service.server.tls.acceptor()? {
        Some(_) => info!("TLS acceptor ready"),
        None => info!("Serving without TLS"),
    }
    Ok(())
}
