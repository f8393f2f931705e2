// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for Data Analyst
//!
//! This crate provides common testing components including:
//! - An in-memory mock adapter with call counters
//! - A scripted text generator that records its requests
//! - Sample tables and queries

pub mod fixtures;
pub mod generator;
pub mod mock_adapter;

// Re-exports for convenience
pub use fixtures::{QueryFixtures, SchemaFixtures, row};
pub use generator::ScriptedGenerator;
pub use mock_adapter::{MockAdapter, MockAdapterBuilder};
