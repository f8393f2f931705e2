// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Data Analyst - Schema Layer
//!
//! This crate defines the single flat schema model shared by every data store
//! engine, and the on-disk store that persists it.
//!
//! - [`Column`] and [`Table`] describe one persisted schema fact. Relational
//!   tables, document collections, measurements, search indices and OLAP cubes
//!   are all expressed through this one shape.
//! - [`SchemaStore`] writes one JSON file per table and reads them back.
//!
//! ## Persisted format
//!
//! ```json
//! {
//!   "name": "orders",
//!   "columns": {
//!     "user_id": {
//!       "name": "user_id",
//!       "data_type": "bigint",
//!       "is_nullable": false,
//!       "is_primary_key": false,
//!       "is_foreign_key": true,
//!       "foreign_key_reference": "users.id",
//!       "comments": ""
//!     }
//!   }
//! }
//! ```

pub mod error;
pub mod model;
pub mod store;

pub use error::{SchemaError, SchemaResult};
pub use model::{Column, Table};
pub use store::SchemaStore;
