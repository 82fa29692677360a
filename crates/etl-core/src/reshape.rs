//! Wide and long/tidy shape transformations.
//!
//! Two reshapes are produced from the normalized statement tables:
//!
//! - [`wide_format`]: one row per (date, symbol) across all three statement
//!   kinds, via successive strict inner joins.
//! - [`long_format`]: one row per (date, symbol, statement_type, metric,
//!   value), the canonical representation for cross-kind aggregation.
//!
//! The wide join's column-collision policy is lossy by design: a column of a
//! later-joined table whose name already exists in the accumulated result is
//! dropped, keeping the income-statement version. Columns that legitimately
//! differ across kinds (e.g. `reportedCurrency`) lose their later values;
//! every drop is logged so the loss is visible per run.

use polars::prelude::*;
use tracing::warn;

use crate::error::{EtlError, Result};
use crate::types::{DocumentKind, DocumentTables};

/// Bookkeeping columns excluded from the tidy representation.
pub const NON_METRIC_COLUMNS: [&str; 6] = [
    "link",
    "finalLink",
    "fillingDate",
    "acceptedDate",
    "calendarYear",
    "period",
];

/// Join and melt identifier columns.
const ID_COLUMNS: [&str; 2] = ["date", "symbol"];

/// Inner-joins the three statement tables into one row-per-period table.
///
/// A period absent from any one statement kind produces no output row. All
/// three kinds must be present and non-empty; a missing kind surfaces as
/// [`EtlError::MissingKind`] rather than a silently-empty result, since the
/// strict-join semantics would otherwise mask it.
pub fn wide_format(tables: &DocumentTables) -> Result<DataFrame> {
    let mut parts = Vec::with_capacity(DocumentKind::STATEMENTS.len());
    for kind in DocumentKind::STATEMENTS {
        let table = tables
            .get(kind)
            .filter(|t| t.height() > 0)
            .ok_or_else(|| EtlError::MissingKind {
                operation: "wide format".to_string(),
                kind: kind.to_string(),
            })?;
        for key in ID_COLUMNS {
            if table.column(key).is_err() {
                return Err(EtlError::Frame(format!(
                    "{kind} table is missing join key '{key}'"
                )));
            }
        }
        parts.push((kind, table));
    }

    let mut accumulated = parts[0].1.clone();
    for (kind, table) in &parts[1..] {
        let collisions: Vec<String> = table
            .get_column_names()
            .into_iter()
            .filter(|name| {
                !ID_COLUMNS.contains(&name.as_str()) && accumulated.column(name.as_str()).is_ok()
            })
            .map(ToString::to_string)
            .collect();
        if !collisions.is_empty() {
            warn!(
                kind = %kind,
                dropped = ?collisions,
                "dropping colliding columns, keeping earlier-joined values"
            );
        }

        let trimmed = table.drop_many(collisions.iter().map(String::as_str));
        accumulated = accumulated
            .lazy()
            .join(
                trimmed.lazy(),
                [col("date"), col("symbol")],
                [col("date"), col("symbol")],
                JoinArgs::new(JoinType::Inner),
            )
            .collect()
            .map_err(|e| EtlError::Frame(e.to_string()))?;
    }

    accumulated
        .lazy()
        .sort(["symbol", "date"], Default::default())
        .collect()
        .map_err(|e| EtlError::Frame(e.to_string()))
}

/// Melts the statement tables into one tidy table.
///
/// Every statement table present (never `stock`) contributes one row per
/// (date, symbol, metric) after the bookkeeping columns are dropped. Tables
/// are processed independently; an empty input yields an empty result.
pub fn long_format(tables: &DocumentTables) -> Result<DataFrame> {
    let named: Vec<(&str, &DataFrame)> = tables
        .statement_tables()
        .into_iter()
        .map(|(kind, table)| (kind.as_str(), table))
        .collect();
    melt_frames(&named)
}

/// Melts named frames into one (date, symbol, statement_type, metric, value)
/// table.
///
/// Each frame's non-identifier columns become metric rows tagged with the
/// frame's name; values are coerced to floats, with non-numeric cells
/// becoming nulls. Shared by the statement tidy table and the indicator
/// read-back.
pub fn melt_frames(frames: &[(&str, &DataFrame)]) -> Result<DataFrame> {
    let mut melted = Vec::with_capacity(frames.len());
    for (name, frame) in frames {
        if let Some(part) = melt_one(name, frame)? {
            melted.push(part.lazy());
        }
    }
    if melted.is_empty() {
        return empty_tidy();
    }

    concat(melted, UnionArgs::default())
        .map_err(|e| EtlError::Frame(e.to_string()))?
        .collect()
        .map_err(|e| EtlError::Frame(e.to_string()))
}

/// Melts one frame, or `None` if it has no rows or no metric columns.
fn melt_one(statement: &str, frame: &DataFrame) -> Result<Option<DataFrame>> {
    if frame.height() == 0 {
        return Ok(None);
    }

    let frame = frame.drop_many(NON_METRIC_COLUMNS);
    for key in ID_COLUMNS {
        if frame.column(key).is_err() {
            return Err(EtlError::Frame(format!(
                "cannot melt '{statement}': missing identifier column '{key}'"
            )));
        }
    }

    let metrics: Vec<PlSmallStr> = frame
        .get_column_names()
        .into_iter()
        .filter(|name| !ID_COLUMNS.contains(&name.as_str()))
        .cloned()
        .collect();
    if metrics.is_empty() {
        return Ok(None);
    }

    let height = frame.height();
    let date = frame.column("date").map_err(|e| EtlError::Frame(e.to_string()))?;
    let symbol = frame
        .column("symbol")
        .map_err(|e| EtlError::Frame(e.to_string()))?;

    let mut date_out = date.clone();
    let mut symbol_out = symbol.clone();
    let mut metric_out: Vec<&str> = Vec::with_capacity(height * metrics.len());
    let mut value_out: Option<Column> = None;

    for (i, metric) in metrics.iter().enumerate() {
        if i > 0 {
            date_out
                .append(date)
                .map_err(|e| EtlError::Frame(e.to_string()))?;
            symbol_out
                .append(symbol)
                .map_err(|e| EtlError::Frame(e.to_string()))?;
        }
        metric_out.extend(std::iter::repeat_n(metric.as_str(), height));

        let values = frame
            .column(metric.as_str())
            .map_err(|e| EtlError::Frame(e.to_string()))?
            .cast(&DataType::Float64)
            .map_err(|e| EtlError::Frame(e.to_string()))?;
        match value_out.as_mut() {
            None => value_out = Some(values),
            Some(accumulated) => {
                accumulated
                    .append(&values)
                    .map_err(|e| EtlError::Frame(e.to_string()))?;
            }
        }
    }

    let mut values = value_out.unwrap_or_else(|| {
        Column::full_null(PlSmallStr::from("value"), 0, &DataType::Float64)
    });
    values.rename(PlSmallStr::from("value"));

    let rows = height * metrics.len();
    let statement_out = Column::new(PlSmallStr::from("statement_type"), vec![statement; rows]);
    let metric_col = Column::new(PlSmallStr::from("metric"), metric_out);

    DataFrame::new(vec![date_out, symbol_out, statement_out, metric_col, values])
        .map_err(|e| EtlError::Frame(e.to_string()))
        .map(Some)
}

/// An empty tidy table with the canonical schema.
fn empty_tidy() -> Result<DataFrame> {
    DataFrame::new(vec![
        Column::full_null(PlSmallStr::from("date"), 0, &DataType::Date),
        Column::new(PlSmallStr::from("symbol"), Vec::<String>::new()),
        Column::new(PlSmallStr::from("statement_type"), Vec::<String>::new()),
        Column::new(PlSmallStr::from("metric"), Vec::<String>::new()),
        Column::new(PlSmallStr::from("value"), Vec::<f64>::new()),
    ])
    .map_err(|e| EtlError::Frame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(columns: Vec<Column>) -> DataFrame {
        DataFrame::new(columns).unwrap()
    }

    fn statement_tables() -> DocumentTables {
        let mut tables = DocumentTables::new();
        tables.insert(
            DocumentKind::IncomeStatement,
            frame(vec![
                Column::new("date".into(), vec!["2023-01-03", "2022-01-03"]),
                Column::new("symbol".into(), vec!["AAPL", "AAPL"]),
                Column::new("revenue".into(), vec![1000.0, 900.0]),
                Column::new("netIncome".into(), vec![100.0, 90.0]),
            ]),
        );
        tables.insert(
            DocumentKind::BalanceSheet,
            frame(vec![
                Column::new("date".into(), vec!["2023-01-03", "2022-01-03"]),
                Column::new("symbol".into(), vec!["AAPL", "AAPL"]),
                Column::new("netIncome".into(), vec![-1.0, -1.0]),
                Column::new("totalAssets".into(), vec![5000.0, 4500.0]),
            ]),
        );
        tables.insert(
            DocumentKind::Cashflow,
            frame(vec![
                // 2022 period missing from the cash flow statement
                Column::new("date".into(), vec!["2023-01-03"]),
                Column::new("symbol".into(), vec!["AAPL"]),
                Column::new("operatingCashFlow".into(), vec![150.0]),
            ]),
        );
        tables
    }

    #[test]
    fn test_wide_is_key_intersection() {
        let wide = wide_format(&statement_tables()).unwrap();

        // 2022 is missing from cashflow, so only 2023 survives the joins
        assert_eq!(wide.height(), 1);
        let dates = wide.column("date").unwrap();
        assert_eq!(dates.str().unwrap().get(0), Some("2023-01-03"));
    }

    #[test]
    fn test_wide_collision_keeps_income_value() {
        let wide = wide_format(&statement_tables()).unwrap();

        // netIncome exists in both income and balance; income wins
        let net_income = wide.column("netIncome").unwrap().f64().unwrap();
        assert_eq!(net_income.get(0), Some(100.0));
    }

    #[test]
    fn test_wide_requires_all_three_kinds() {
        let mut tables = statement_tables();
        tables.insert(DocumentKind::BalanceSheet, DataFrame::empty());
        // Re-inserting an empty table must surface as a missing kind
        let err = wide_format(&tables).unwrap_err();
        assert!(matches!(err, EtlError::MissingKind { .. }));
    }

    #[test]
    fn test_long_drops_bookkeeping_columns() {
        let mut tables = DocumentTables::new();
        tables.insert(
            DocumentKind::IncomeStatement,
            frame(vec![
                Column::new("date".into(), vec!["2023-01-03"]),
                Column::new("symbol".into(), vec!["AAPL"]),
                Column::new("link".into(), vec!["https://example.com/filing"]),
                Column::new("revenue".into(), vec![1000.0]),
                Column::new("netIncome".into(), vec![100.0]),
            ]),
        );

        let tidy = long_format(&tables).unwrap();

        assert_eq!(tidy.height(), 2);
        let metrics = tidy.column("metric").unwrap();
        let metrics: Vec<Option<&str>> =
            (0..tidy.height()).map(|i| metrics.str().unwrap().get(i)).collect();
        assert!(metrics.contains(&Some("revenue")));
        assert!(metrics.contains(&Some("netIncome")));
        assert!(!metrics.contains(&Some("link")));
    }

    #[test]
    fn test_long_tags_statement_type() {
        let tidy = long_format(&statement_tables()).unwrap();
        let tags = tidy.column("statement_type").unwrap();
        let tags: Vec<Option<&str>> =
            (0..tidy.height()).map(|i| tags.str().unwrap().get(i)).collect();
        assert!(tags.contains(&Some("income_statement")));
        assert!(tags.contains(&Some("balance_sheet")));
        assert!(tags.contains(&Some("cashflow")));
    }

    #[test]
    fn test_long_of_nothing_is_empty() {
        let tidy = long_format(&DocumentTables::new()).unwrap();
        assert_eq!(tidy.height(), 0);
        assert_eq!(tidy.width(), 5);
    }

    #[test]
    fn test_melt_then_pivot_recovers_values() {
        let wide = wide_format(&statement_tables()).unwrap();
        let tidy = melt_frames(&[("statements", &wide)]).unwrap();

        let dates = tidy.column("date").unwrap();
        let symbols = tidy.column("symbol").unwrap();
        let metrics = tidy.column("metric").unwrap();
        let values = tidy.column("value").unwrap().f64().unwrap();

        // Every non-identifier cell of the wide table must appear exactly once
        let metric_names: Vec<String> = wide
            .get_column_names()
            .into_iter()
            .filter(|n| !ID_COLUMNS.contains(&n.as_str()))
            .map(ToString::to_string)
            .collect();
        for row in 0..wide.height() {
            let date = wide.column("date").unwrap().str().unwrap().get(row).unwrap().to_string();
            let symbol = wide.column("symbol").unwrap().str().unwrap().get(row).unwrap().to_string();
            for metric in &metric_names {
                let expected = wide.column(metric).unwrap().f64().unwrap().get(row);
                let mut found = Vec::new();
                for i in 0..tidy.height() {
                    if dates.str().unwrap().get(i) == Some(date.as_str())
                        && symbols.str().unwrap().get(i) == Some(symbol.as_str())
                        && metrics.str().unwrap().get(i) == Some(metric.as_str())
                    {
                        found.push(values.get(i));
                    }
                }
                assert_eq!(found, vec![expected]);
            }
        }
    }
}
