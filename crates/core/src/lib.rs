//! Core types for the Strata schema layer
//!
//! This crate defines the foundational pieces shared by the schema crates:
//! - Error: the closed error taxonomy (`StrataError`, `ErrorKind`)
//! - Config: `strata-schema.toml` loading and environment overrides

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;

pub use config::{RecordDecl, SchemaConfig, TraversalLimits, CONFIG_FILE_NAME, DEBUG_ENV_VAR};
pub use error::{ErrorKind, StrataError, StrataResult};
