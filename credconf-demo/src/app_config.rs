// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors
use credconf::{
    field::{FieldSpec, Scope},
    flags::FlagRegistry,
    http::{HttpServerConfig, HttpServerLoader},
    path::FilePath,
    Loader, Result, Secret, Sources,
};

pub const ENV_PREFIX: &str = "MY_APP";
pub const DEFAULT_ROOT: &str = "/etc/myapp/";

const NAME: FieldSpec = FieldSpec::new("Name", "NAME").required();
const DESCRIPTION: FieldSpec = FieldSpec::new("Description", "DESCRIPTION");
const NODE_ID: FieldSpec = FieldSpec::new("NodeID", "NODE")
    .flag("node")
    .default_value("1")
    .help("Identifier of this node in the cluster");
const PRIORITY: FieldSpec =
    FieldSpec::new("Priority", "PRIORITY").default_value("1");
const SECRET_KEY: FieldSpec = FieldSpec::new("SecretKey", "SECRET_KEY")
    .flag("secret-key")
    .default_value("secretkey.txt")
    .help("File holding the service secret, mode 0600");

const DB_ADDRESS: FieldSpec = FieldSpec::new("Address", "ADDRESS")
    .flag("address")
    .default_value("127.0.0.1");
const DB_PORT: FieldSpec = FieldSpec::new("Port", "PORT")
    .flag("port")
    .default_value("8080");

#[derive(Clone, Debug)]
pub struct MyServiceConfig {
    pub name: String,
    pub description: String,
    pub node_id: u32,
    pub priority: u16,
    pub secret_key_file: FilePath,
    pub secret_key: Secret<String>,
    pub server: HttpServerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MyDbConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct MyAppConfig {
    pub service: MyServiceConfig,
    pub db: MyDbConfig,
}

pub struct MyServiceLoader {
    scope: Scope,
    server: HttpServerLoader,
}

impl Loader for MyServiceLoader {
    type Output = MyServiceConfig;

    fn register(&self, flags: &mut FlagRegistry) {
        for spec in [&NODE_ID, &SECRET_KEY] {
            let _ = flags.register(&self.scope.bind(spec));
        }
        self.server.register(flags);
    }

    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&MyServiceConfig>,
    ) -> Result<MyServiceConfig> {
        let (secret_key_file, secret_key) = sources.secret_file(
            &self.scope.bind(&SECRET_KEY),
            previous.map(|p| &p.secret_key_file),
        )?;
        let server = self
            .server
            .load(sources, previous.map(|p| &p.server))?;

        Ok(MyServiceConfig {
            name: sources.value(
                &self.scope.bind(&NAME),
                previous.map(|p| p.name.clone()),
            )?,
            description: sources.value(
                &self.scope.bind(&DESCRIPTION),
                previous.map(|p| p.description.clone()),
            )?,
            node_id: sources.value(
                &self.scope.bind(&NODE_ID),
                previous.map(|p| p.node_id),
            )?,
            priority: sources.value(
                &self.scope.bind(&PRIORITY),
                previous.map(|p| p.priority),
            )?,
            secret_key_file,
            secret_key,
            server,
        })
    }
}

pub struct MyDbLoader {
    scope: Scope,
}

impl Loader for MyDbLoader {
    type Output = MyDbConfig;

    fn register(&self, flags: &mut FlagRegistry) {
        for spec in [&DB_ADDRESS, &DB_PORT] {
            let _ = flags.register(&self.scope.bind(spec));
        }
    }

    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&MyDbConfig>,
    ) -> Result<MyDbConfig> {
        Ok(MyDbConfig {
            address: sources.value(
                &self.scope.bind(&DB_ADDRESS),
                previous.map(|p| p.address.clone()),
            )?,
            port: sources
                .value(&self.scope.bind(&DB_PORT), previous.map(|p| p.port))?,
        })
    }
}

/// Both sections, resolved together
pub struct MyAppLoader {
    service: MyServiceLoader,
    db: MyDbLoader,
}

impl MyAppLoader {
    pub fn new() -> Self {
        let root = Scope::new(ENV_PREFIX, "");
        let service = root.nest("MY_SERVICE", "my-service");
        MyAppLoader {
            service: MyServiceLoader {
                server: HttpServerLoader::new(service.clone()),
                scope: service,
            },
            db: MyDbLoader {
                scope: root.nest("MY_DB", "my-db"),
            },
        }
    }
}

impl Default for MyAppLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for MyAppLoader {
    type Output = MyAppConfig;

    fn register(&self, flags: &mut FlagRegistry) {
        self.service.register(flags);
        self.db.register(flags);
    }

    fn load(
        &self,
        sources: &Sources<'_>,
        previous: Option<&MyAppConfig>,
    ) -> Result<MyAppConfig> {
        Ok(MyAppConfig {
            service: self
                .service
                .load(sources, previous.map(|p| &p.service))?,
            db: self.db.load(sources, previous.map(|p| &p.db))?,
        })
    }
}
