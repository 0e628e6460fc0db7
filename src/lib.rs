//! StrataDB Schema - runtime slots and structured values for dynamic data
//!
//! Declare structured value types (records, sequences, mappings) with
//! per-field checks and cross-field invariants, then construct, read, mutate
//! and freeze instances of them, including instances nested in each other.
//!
//! # Quick Start
//!
//! ```
//! use stratadb_schema::{RecordType, TypeOptions, Value, ErrorKind};
//!
//! let point = RecordType::create(
//!     [("x", "Integer"), ("y", "Integer")],
//!     TypeOptions::default().named("Point"),
//! )?;
//!
//! let p = point.new_instance([("x", 1i64), ("y", 2i64)])?;
//! p.set("x", 10i64)?;
//! assert_eq!(p.get("x")?, Value::Int(10));
//!
//! p.freeze()?;
//! assert_eq!(p.set("x", 0i64).unwrap_err().kind(), ErrorKind::Frozen);
//! # Ok::<(), stratadb_schema::StrataError>(())
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: error taxonomy and `strata-schema.toml` configuration
//! - `strata-schema`: slots, the three structured families and traversal
//!
//! Instance internals are never exposed; the gated [`introspect`] module is
//! the only window into them and is not part of the stable surface.

pub use strata_schema::*;
