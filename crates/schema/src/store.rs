// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema store
//!
//! Persists one JSON unit per [`Table`] in a directory. File names are derived
//! from the table name, so writing a table twice overwrites the earlier unit.
//!
//! [`SchemaStore::replace_all`] is a full replace: every `*.json` unit in the
//! directory is removed before the new set is written, so tables missing from
//! the latest introspection do not survive.

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::model::Table;

/// Extension of persisted schema units
const UNIT_EXTENSION: &str = "json";

/// Directory-backed store of schema units
#[derive(Debug, Clone)]
pub struct SchemaStore {
    root: PathBuf,
}

impl SchemaStore {
    /// Create a store rooted at `root`
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the persisted units
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the unit for `table_name`
    pub fn unit_path(&self, table_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", unit_file_stem(table_name), UNIT_EXTENSION))
    }

    /// Persist one table, overwriting an existing unit of the same name
    pub fn write(&self, table: &Table) -> SchemaResult<PathBuf> {
        self.ensure_root()?;

        let path = self.unit_path(&table.name);
        let mut body = serde_json::to_string_pretty(table)
            .map_err(|e| SchemaError::serialization(&path, e))?;
        body.push('\n');

        fs::write(&path, body).map_err(|e| SchemaError::io(&path, e))?;
        debug!(table = %table.name, path = %path.display(), "Wrote schema unit");
        Ok(path)
    }

    /// Delete every persisted unit, returning how many were removed
    ///
    /// A missing directory counts as already empty.
    pub fn clear(&self) -> SchemaResult<usize> {
        let mut removed = 0;
        for path in self.unit_paths()? {
            fs::remove_file(&path).map_err(|e| SchemaError::io(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Replace the whole persisted schema with `tables`
    pub fn replace_all<'a>(&self, tables: impl IntoIterator<Item = &'a Table>) -> SchemaResult<()> {
        self.ensure_root()?;
        let removed = self.clear()?;
        debug!(removed, root = %self.root.display(), "Cleared schema units");

        for table in tables {
            self.write(table)?;
        }
        Ok(())
    }

    /// Read a single table unit
    pub fn read(&self, path: &Path) -> SchemaResult<Table> {
        let body = fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
        serde_json::from_str(&body).map_err(|e| SchemaError::serialization(path, e))
    }

    /// Load every persisted unit, keyed by table name
    ///
    /// Units are read in file-name order so the resulting map is stable.
    pub fn load_all(&self) -> SchemaResult<IndexMap<String, Table>> {
        let mut tables = IndexMap::new();
        for path in self.unit_paths()? {
            let table = self.read(&path)?;
            tables.insert(table.name.clone(), table);
        }
        Ok(tables)
    }

    fn ensure_root(&self) -> SchemaResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| SchemaError::io(&self.root, e))
    }

    fn unit_paths(&self) -> SchemaResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SchemaError::io(&self.root, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SchemaError::io(&self.root, e))?.path();
            let is_unit = path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(UNIT_EXTENSION);
            if is_unit {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// File stem for a table name
///
/// Characters outside `[A-Za-z0-9._-]` are percent-encoded byte by byte, which
/// keeps names like `sales/2024` or `Sales [Cube]` inside the store directory.
/// A leading `_` is encoded too; a bare `_` prefix marks the empty and
/// all-dot names, which cannot be used as file names.
fn unit_file_stem(table_name: &str) -> String {
    let mut stem = String::with_capacity(table_name.len());
    for (i, byte) in table_name.bytes().enumerate() {
        match byte {
            b'_' if i == 0 => stem.push_str("%5F"),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => stem.push(byte as char),
            _ => stem.push_str(&format!("%{byte:02X}")),
        }
    }
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        stem = stem.replace('.', "%2E");
        stem.insert_str(0, "_");
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_map_to_themselves() {
        assert_eq!(unit_file_stem("users"), "users");
        assert_eq!(unit_file_stem("order_items-2024.v1"), "order_items-2024.v1");
    }

    #[test]
    fn test_unsafe_characters_are_encoded() {
        assert_eq!(unit_file_stem("sales/2024"), "sales%2F2024");
        assert_eq!(unit_file_stem("Sales Cube"), "Sales%20Cube");
        assert_eq!(unit_file_stem(".."), "_%2E%2E");
        assert_eq!(unit_file_stem(""), "_");
    }

    #[test]
    fn test_reserved_prefix_does_not_collide() {
        assert_eq!(unit_file_stem("_"), "%5F");
        assert_eq!(unit_file_stem("_audit_log"), "%5Faudit_log");
        assert_eq!(unit_file_stem("audit_log"), "audit_log");
        assert_ne!(unit_file_stem("_%2E%2E"), unit_file_stem(".."));
    }

    #[test]
    fn test_unit_path_is_inside_root() {
        let store = SchemaStore::new("/tmp/schema");
        let path = store.unit_path("../etc/passwd");
        assert_eq!(path.parent(), Some(Path::new("/tmp/schema")));
    }
}
