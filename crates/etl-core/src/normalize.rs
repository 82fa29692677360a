//! Raw JSON to normalized per-kind tables.
//!
//! The normalizer turns the heterogeneous payloads of a [`RawBatch`] into one
//! flat table per document kind. Schemas are not fixed up front: each kind's
//! columns are the union of the fields observed across all of its records,
//! merged explicitly and filled with nulls where a symbol's records lack a
//! field. Malformed documents are skipped with a warning, never fatal; a kind
//! where nothing parses is dropped from the result with a warning.

use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{EtlError, Result};
use crate::types::{DocumentKind, DocumentTables, RawBatch, RawDocument};

/// Converts a raw batch into one normalized table per document kind.
///
/// Concatenation is append-only: rows keep arriving per symbol and duplicates
/// are not deduplicated at this stage.
///
/// # Errors
/// Returns an error only for frame-construction failures; malformed documents
/// and empty kinds degrade to warnings.
pub fn parse_to_tables(batch: &RawBatch) -> Result<DocumentTables> {
    let mut tables = DocumentTables::new();

    for kind in batch.kinds() {
        let mut frames = Vec::new();
        for document in batch.documents(kind) {
            let parsed = match kind {
                DocumentKind::Stock => stock_frame(document),
                _ => statement_frame(document),
            };
            match parsed {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    warn!(kind = %kind, symbol = %document.symbol, error = %e, "skipping document");
                }
            }
        }

        if frames.is_empty() {
            warn!(kind = %kind, "no documents parsed for kind, dropping it from the run");
            continue;
        }

        let table = concat_union(frames)?;
        tables.insert(kind, parse_date_column(table)?);
    }

    Ok(tables)
}

/// Builds a frame from one `stock` document.
///
/// Expects an object with a `historical` array of daily records; the
/// document's symbol becomes the second column.
fn stock_frame(document: &RawDocument) -> Result<DataFrame> {
    let malformed = |message: &str| EtlError::Malformed {
        symbol: document.symbol.to_string(),
        kind: document.kind.to_string(),
        message: message.to_string(),
    };

    let object = document
        .payload
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object"))?;
    let historical = object
        .get("historical")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'historical' array"))?;

    let records = as_records(historical)
        .ok_or_else(|| malformed("'historical' entries are not objects"))?;
    let mut frame = records_to_frame(&records).map_err(|e| malformed(&e.to_string()))?;

    let symbol_column = Column::new(
        PlSmallStr::from("symbol"),
        vec![document.symbol.as_str(); frame.height()],
    );
    frame
        .insert_column(1, symbol_column)
        .map_err(|e| EtlError::Frame(e.to_string()))?;
    Ok(frame)
}

/// Builds a frame from one statement document.
///
/// Expects an array of field-to-scalar records. The symbol is attached as a
/// column when the records do not already carry one.
fn statement_frame(document: &RawDocument) -> Result<DataFrame> {
    let malformed = |message: &str| EtlError::Malformed {
        symbol: document.symbol.to_string(),
        kind: document.kind.to_string(),
        message: message.to_string(),
    };

    let array = document
        .payload
        .as_array()
        .ok_or_else(|| malformed("expected a JSON array of period records"))?;
    let records = as_records(array).ok_or_else(|| malformed("period records are not objects"))?;
    let mut frame = records_to_frame(&records).map_err(|e| malformed(&e.to_string()))?;

    if frame.column("symbol").is_err() {
        let symbol_column = Column::new(
            PlSmallStr::from("symbol"),
            vec![document.symbol.as_str(); frame.height()],
        );
        frame
            .insert_column(1, symbol_column)
            .map_err(|e| EtlError::Frame(e.to_string()))?;
    }
    Ok(frame)
}

/// Views an array of JSON values as records, or `None` if any entry is not an
/// object.
fn as_records(values: &[Value]) -> Option<Vec<&Map<String, Value>>> {
    if values.is_empty() {
        return None;
    }
    values.iter().map(Value::as_object).collect()
}

/// How a JSON field is represented in the frame.
#[derive(Clone, Copy, PartialEq)]
enum FieldRepr {
    Float,
    Bool,
    Text,
}

/// Builds a frame from field-to-scalar records.
///
/// Columns are the union of the fields observed, in first-seen order. A field
/// holding only numbers becomes `Float64`, only booleans `Boolean`, anything
/// mixed or textual `String`; records missing a field contribute nulls.
fn records_to_frame(records: &[&Map<String, Value>]) -> Result<DataFrame> {
    let mut fields: Vec<&str> = Vec::new();
    for record in records {
        for name in record.keys() {
            if !fields.iter().any(|f| f == name) {
                fields.push(name);
            }
        }
    }
    if fields.is_empty() {
        return Err(EtlError::Frame("records carry no fields".to_string()));
    }

    let mut columns = Vec::with_capacity(fields.len());
    for field in &fields {
        let repr = classify_field(records, field);
        let column = match repr {
            FieldRepr::Float => Column::new(
                PlSmallStr::from(*field),
                records
                    .iter()
                    .map(|r| r.get(*field).and_then(Value::as_f64))
                    .collect::<Vec<Option<f64>>>(),
            ),
            FieldRepr::Bool => Column::new(
                PlSmallStr::from(*field),
                records
                    .iter()
                    .map(|r| r.get(*field).and_then(Value::as_bool))
                    .collect::<Vec<Option<bool>>>(),
            ),
            FieldRepr::Text => Column::new(
                PlSmallStr::from(*field),
                records
                    .iter()
                    .map(|r| r.get(*field).and_then(value_to_text))
                    .collect::<Vec<Option<String>>>(),
            ),
        };
        columns.push(column);
    }

    DataFrame::new(columns).map_err(|e| EtlError::Frame(e.to_string()))
}

fn classify_field(records: &[&Map<String, Value>], field: &str) -> FieldRepr {
    let mut has_number = false;
    let mut has_bool = false;
    let mut has_text = false;
    for record in records {
        match record.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Number(_)) => has_number = true,
            Some(Value::Bool(_)) => has_bool = true,
            Some(_) => has_text = true,
        }
    }
    if has_text || (has_number && has_bool) {
        FieldRepr::Text
    } else if has_bool {
        FieldRepr::Bool
    } else {
        FieldRepr::Float
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Concatenates frames after an explicit schema merge.
///
/// The merged schema is the union of the column names in first-seen order;
/// each frame is extended with null columns for the names it lacks before the
/// rows are stacked.
fn concat_union(frames: Vec<DataFrame>) -> Result<DataFrame> {
    if frames.len() == 1 {
        let mut frames = frames;
        return Ok(frames.pop().unwrap_or_default());
    }

    let mut union: Vec<(PlSmallStr, DataType)> = Vec::new();
    for frame in &frames {
        for column in frame.get_columns() {
            if !union.iter().any(|(name, _)| name == column.name()) {
                union.push((column.name().clone(), column.dtype().clone()));
            }
        }
    }
    let names: Vec<PlSmallStr> = union.iter().map(|(name, _)| name.clone()).collect();

    let mut aligned = Vec::with_capacity(frames.len());
    for mut frame in frames {
        for (name, dtype) in &union {
            if frame.column(name.as_str()).is_err() {
                frame
                    .with_column(Column::full_null(name.clone(), frame.height(), dtype))
                    .map_err(|e| EtlError::Frame(e.to_string()))?;
            }
        }
        let frame = frame
            .select(names.iter().cloned())
            .map_err(|e| EtlError::Frame(e.to_string()))?;
        aligned.push(frame.lazy());
    }

    concat(
        aligned,
        UnionArgs {
            to_supertypes: true,
            ..Default::default()
        },
    )
    .map_err(|e| EtlError::Frame(e.to_string()))?
    .collect()
    .map_err(|e| EtlError::Frame(e.to_string()))
}

/// Parses a textual `date` column into the `Date` dtype.
///
/// Dates arrive as `YYYY-MM-DD` text; anything unparsable is a defect in the
/// upstream payload.
fn parse_date_column(frame: DataFrame) -> Result<DataFrame> {
    let is_text_date = frame
        .column("date")
        .map(|c| c.dtype() == &DataType::String)
        .unwrap_or(false);
    if !is_text_date {
        return Ok(frame);
    }
    frame
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .map_err(|e| EtlError::Frame(e.to_string()))
}
