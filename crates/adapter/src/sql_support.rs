// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Row normalization shared by the sqlx-backed engines

use sqlx::{Column as _, ColumnIndex, Decode, Row as SqlxRow, Type, TypeInfo as _, ValueRef as _};
use tracing::warn;

use crate::error::{AdapterError, AdapterResult};
use crate::value::{Row, Value};

/// Convert driver rows, delegating non-null cells to `decode`
///
/// `decode` receives the row, the column ordinal and the driver's type name.
pub(crate) fn normalize_rows<R, F>(rows: &[R], decode: F) -> AdapterResult<Vec<Row>>
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    F: Fn(&R, usize, &str) -> AdapterResult<Value>,
{
    rows.iter()
        .map(|row| {
            let mut out = Row::with_capacity(row.len());
            for column in row.columns() {
                let ordinal = column.ordinal();
                let raw = row
                    .try_get_raw(ordinal)
                    .map_err(|e| decode_error(column.name(), e))?;
                let value = if raw.is_null() {
                    Value::Null
                } else {
                    decode(row, ordinal, column.type_info().name())?
                };
                out.insert(column.name().to_string(), value);
            }
            Ok(out)
        })
        .collect()
}

/// Typed cell access with errors mapped to execution failures
pub(crate) fn get<'r, R, T>(row: &'r R, ordinal: usize) -> AdapterResult<T>
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get(ordinal)
        .map_err(|e| decode_error(&ordinal.to_string(), e))
}

/// Cell access without the driver's type compatibility check
pub(crate) fn get_unchecked<'r, R, T>(row: &'r R, ordinal: usize) -> AdapterResult<T>
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database>,
{
    row.try_get_unchecked(ordinal)
        .map_err(|e| decode_error(&ordinal.to_string(), e))
}

/// Null plus a warning for cells of a type without a JSON rendering
pub(crate) fn unsupported(type_name: &str) -> Value {
    warn!(type_name, "Unsupported column type rendered as null");
    Value::Null
}

pub(crate) fn decode_error(column: &str, e: sqlx::Error) -> AdapterError {
    AdapterError::Execution(format!("Failed to decode column '{column}': {e}"))
}

pub(crate) fn execution_error(e: sqlx::Error) -> AdapterError {
    AdapterError::Execution(e.to_string())
}
