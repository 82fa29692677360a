//! SQLite-backed table store.
//!
//! Implements [`TableStore`] over a single connection. Table schemas are
//! derived from the loaded frame's dtypes; dates are stored as ISO text.
//! Every table name passing through here is validated against the
//! identifier allow-list before being spliced into a statement.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::*;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use etl_core::indicators::{self, IndicatorFamily};
use etl_core::types::validate_identifier;
use etl_core::{EtlError, Namespace, Result, TableStore, WriteMode};

/// Days from the common era to the Unix epoch, for the Date dtype.
const UNIX_EPOCH_DAYS: i32 = 719_163;

/// SQLite-backed relational store.
///
/// Uses a single connection behind a mutex; the pipeline is sequential, so
/// there is no contention to speak of.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    /// Returns [`EtlError::Sql`] if the database cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| EtlError::Sql(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns [`EtlError::Sql`] if the database cannot be opened.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EtlError::Sql(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| EtlError::Sql(e.to_string()))
    }

    /// Maps a frame dtype to a SQLite column type. Unknown dtypes degrade to
    /// TEXT.
    fn sql_type(dtype: &DataType) -> &'static str {
        match dtype {
            DataType::Float32 | DataType::Float64 => "REAL",
            DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => "INTEGER",
            _ => "TEXT",
        }
    }

    fn to_sql_value(value: AnyValue<'_>) -> SqlValue {
        match value {
            AnyValue::Null => SqlValue::Null,
            AnyValue::Boolean(b) => SqlValue::Integer(i64::from(b)),
            AnyValue::Int8(v) => SqlValue::Integer(i64::from(v)),
            AnyValue::Int16(v) => SqlValue::Integer(i64::from(v)),
            AnyValue::Int32(v) => SqlValue::Integer(i64::from(v)),
            AnyValue::Int64(v) => SqlValue::Integer(v),
            AnyValue::UInt8(v) => SqlValue::Integer(i64::from(v)),
            AnyValue::UInt16(v) => SqlValue::Integer(i64::from(v)),
            AnyValue::UInt32(v) => SqlValue::Integer(i64::from(v)),
            AnyValue::UInt64(v) => SqlValue::Integer(v as i64),
            AnyValue::Float32(v) => SqlValue::Real(f64::from(v)),
            AnyValue::Float64(v) => SqlValue::Real(v),
            AnyValue::String(s) => SqlValue::Text(s.to_string()),
            AnyValue::StringOwned(s) => SqlValue::Text(s.to_string()),
            AnyValue::Date(days) => {
                match NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS) {
                    Some(date) => SqlValue::Text(date.to_string()),
                    None => SqlValue::Null,
                }
            }
            other => SqlValue::Text(other.to_string()),
        }
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn load_table(&self, name: &str, table: &DataFrame, mode: WriteMode) -> Result<()> {
        validate_identifier(name)?;
        let conn = self.lock()?;

        if mode == WriteMode::Replace {
            conn.execute(&format!("DROP TABLE IF EXISTS \"{name}\""), [])
                .map_err(|e| EtlError::Sql(e.to_string()))?;
        }

        let columns = table.get_columns();
        let definitions: Vec<String> = columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name(), Self::sql_type(c.dtype())))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{name}\" ({})",
                definitions.join(", ")
            ),
            [],
        )
        .map_err(|e| EtlError::Sql(e.to_string()))?;

        let column_list: Vec<String> = columns
            .iter()
            .map(|c| format!("\"{}\"", c.name()))
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let insert = format!(
            "INSERT INTO \"{name}\" ({}) VALUES ({})",
            column_list.join(", "),
            placeholders.join(", ")
        );

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| EtlError::Sql(e.to_string()))?;
        for row in 0..table.height() {
            let mut values = Vec::with_capacity(columns.len());
            for column in columns {
                let value = column
                    .get(row)
                    .map_err(|e| EtlError::Sql(e.to_string()))?;
                values.push(Self::to_sql_value(value));
            }
            tx.execute(&insert, params_from_iter(values))
                .map_err(|e| EtlError::Sql(e.to_string()))?;
        }
        tx.commit().map_err(|e| EtlError::Sql(e.to_string()))?;

        debug!(table = name, rows = table.height(), mode = ?mode, "loaded table");
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(statement)
            .map_err(|e| EtlError::Sql(e.to_string()))
    }

    async fn read_table(&self, name: &str) -> Result<DataFrame> {
        validate_identifier(name)?;
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!("SELECT * FROM \"{name}\""))
            .map_err(|e| EtlError::Sql(e.to_string()))?;
        let column_names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let width = column_names.len();

        let mut rows_data: Vec<Vec<SqlValue>> = Vec::new();
        let mut rows = stmt.query([]).map_err(|e| EtlError::Sql(e.to_string()))?;
        while let Some(row) = rows.next().map_err(|e| EtlError::Sql(e.to_string()))? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(
                    row.get::<_, SqlValue>(index)
                        .map_err(|e| EtlError::Sql(e.to_string()))?,
                );
            }
            rows_data.push(values);
        }

        let mut columns = Vec::with_capacity(width);
        for (index, column_name) in column_names.iter().enumerate() {
            let has_text = rows_data
                .iter()
                .any(|r| matches!(r[index], SqlValue::Text(_)));
            let column = if has_text {
                let values: Vec<Option<String>> = rows_data
                    .iter()
                    .map(|r| match &r[index] {
                        SqlValue::Text(s) => Some(s.clone()),
                        SqlValue::Integer(v) => Some(v.to_string()),
                        SqlValue::Real(v) => Some(v.to_string()),
                        SqlValue::Null | SqlValue::Blob(_) => None,
                    })
                    .collect();
                Column::new(PlSmallStr::from(column_name.as_str()), values)
            } else {
                let values: Vec<Option<f64>> = rows_data
                    .iter()
                    .map(|r| match r[index] {
                        SqlValue::Integer(v) => Some(v as f64),
                        SqlValue::Real(v) => Some(v),
                        _ => None,
                    })
                    .collect();
                Column::new(PlSmallStr::from(column_name.as_str()), values)
            };
            columns.push(column);
        }

        let frame = DataFrame::new(columns).map_err(|e| EtlError::Frame(e.to_string()))?;

        // Re-type the date column the way it was loaded
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

    async fn table_exists(&self, name: &str) -> Result<bool> {
        validate_identifier(name)?;
        let conn = self.lock()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EtlError::Sql(e.to_string()))?;
        Ok(found.is_some())
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        validate_identifier(name)?;
        let conn = self.lock()?;
        conn.execute(&format!("DROP TABLE IF EXISTS \"{name}\""), [])
            .map_err(|e| EtlError::Sql(e.to_string()))?;
        Ok(())
    }
}

/// Materializes the three indicator family tables from the namespace's wide
/// statements table.
///
/// Replace semantics by default; timestamped runs append to existing family
/// tables instead. Appends are not deduplicated - re-loading the same period
/// duplicates its rows.
///
/// # Errors
/// Propagates the first materialization failure; the statements table must
/// already be loaded.
pub async fn create_indicators<S: TableStore + ?Sized>(
    store: &S,
    namespace: &Namespace,
    append: bool,
) -> Result<()> {
    for family in IndicatorFamily::ALL {
        let table = namespace.table(family.as_str());
        if append && store.table_exists(&table).await? {
            store
                .execute(&indicators::append_sql(namespace, family)?)
                .await?;
        } else {
            store.drop_table(&table).await?;
            store
                .execute(&indicators::create_table_sql(namespace, family)?)
                .await?;
        }
        info!(table = %table, "indicator table materialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_statements() -> DataFrame {
        DataFrame::new(vec![
            Column::new("date".into(), vec!["2023-01-03", "2022-01-03"]),
            Column::new("symbol".into(), vec!["AAPL", "AAPL"]),
            Column::new("netIncome".into(), vec![20.0, 18.0]),
            Column::new("totalEquity".into(), vec![200.0, 180.0]),
            Column::new("totalAssets".into(), vec![400.0, 360.0]),
            Column::new("totalDebt".into(), vec![100.0, 90.0]),
            Column::new("dividendsPaid".into(), vec![5.0, 4.0]),
            Column::new("grossProfit".into(), vec![40.0, 36.0]),
            Column::new("revenue".into(), vec![100.0, 90.0]),
            Column::new("operatingIncome".into(), vec![30.0, 27.0]),
            Column::new("totalCurrentAssets".into(), vec![120.0, 110.0]),
            Column::new("totalCurrentLiabilities".into(), vec![60.0, 0.0]),
            Column::new("cashAndCashEquivalents".into(), vec![30.0, 28.0]),
            Column::new("shortTermInvestments".into(), vec![10.0, 9.0]),
            Column::new("accountsReceivables".into(), vec![20.0, 19.0]),
            Column::new("operatingCashFlow".into(), vec![50.0, 45.0]),
            Column::new("capitalExpenditure".into(), vec![25.0, 0.0]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_and_read_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let frame = wide_statements();

        store
            .load_table("tech_statements", &frame, WriteMode::Replace)
            .await
            .unwrap();
        let read = store.read_table("tech_statements").await.unwrap();

        assert_eq!(read.height(), 2);
        assert_eq!(read.column("date").unwrap().dtype(), &DataType::Date);
        let revenue = read.column("revenue").unwrap().f64().unwrap();
        assert_eq!(revenue.get(0), Some(100.0));
    }

    #[tokio::test]
    async fn test_replace_and_append_modes() {
        let store = SqliteStore::in_memory().unwrap();
        let frame = wide_statements();

        store
            .load_table("tech_statements", &frame, WriteMode::Replace)
            .await
            .unwrap();
        store
            .load_table("tech_statements", &frame, WriteMode::Replace)
            .await
            .unwrap();
        let read = store.read_table("tech_statements").await.unwrap();
        assert_eq!(read.height(), 2);

        store
            .load_table("tech_statements", &frame, WriteMode::Append)
            .await
            .unwrap();
        let read = store.read_table("tech_statements").await.unwrap();
        assert_eq!(read.height(), 4);
    }

    #[tokio::test]
    async fn test_append_creates_missing_table() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .load_table("tech_stocks", &wide_statements(), WriteMode::Append)
            .await
            .unwrap();
        assert!(store.table_exists("tech_stocks").await.unwrap());
    }

    #[tokio::test]
    async fn test_identifier_validation_blocks_injection() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.read_table("x; DROP TABLE y").await.unwrap_err();
        assert!(matches!(err, EtlError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_indicator_values_and_null_denominator() {
        let store = SqliteStore::in_memory().unwrap();
        let ns = Namespace::new("tech").unwrap();

        store
            .load_table(&ns.table("statements"), &wide_statements(), WriteMode::Replace)
            .await
            .unwrap();
        create_indicators(&store, &ns, false).await.unwrap();

        let profitability = store.read_table("tech_profitability").await.unwrap();
        assert_eq!(profitability.height(), 2);
        let roe = profitability
            .column("return_on_equity")
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(roe.get(0), Some(0.10));

        let leverage = store.read_table("tech_leverage").await.unwrap();
        let dtc = leverage.column("debt_to_capital").unwrap().f64().unwrap();
        assert_eq!(dtc.get(0), Some(100.0 / 300.0));

        // 2022 has zero current liabilities and zero capex: NULL, not an error
        let liquidity = store.read_table("tech_liquidity").await.unwrap();
        let ocf = liquidity
            .column("operating_cash_flow_ratio")
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(ocf.get(0), Some(50.0 / 60.0));
        assert_eq!(ocf.get(1), None);
        let capex = liquidity
            .column("capex_to_operating_cash_ratio")
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(capex.get(0), Some(2.0));
        assert_eq!(capex.get(1), None);
    }

    #[tokio::test]
    async fn test_indicator_append_duplicates_periods() {
        let store = SqliteStore::in_memory().unwrap();
        let ns = Namespace::new("tech").unwrap();

        store
            .load_table(&ns.table("statements"), &wide_statements(), WriteMode::Replace)
            .await
            .unwrap();
        create_indicators(&store, &ns, false).await.unwrap();
        create_indicators(&store, &ns, true).await.unwrap();

        let profitability = store.read_table("tech_profitability").await.unwrap();
        assert_eq!(profitability.height(), 4);
    }
}
