// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

pub mod credential;
pub mod crypto;
pub mod env;
pub mod error;
pub mod field;
pub mod flags;
pub mod http;
pub mod path;
pub mod permissions;
pub mod resolver;
pub mod secret;
pub mod tls;

pub use error::{Error, Result};
pub use resolver::{Loader, Resolver, Sources};
pub use secret::Secret;
