//! Derived-indicator catalog and SQL generation.
//!
//! Three families of financial ratios are derived from the wide statement
//! table, each materialized in the persistent store as `<namespace>_<family>`
//! keyed by (date, symbol). The formulas live here as static data; the store
//! executes the generated statements.
//!
//! Every division goes through [`safe_ratio`], which maps a zero or NULL
//! denominator to NULL instead of raising. Identifiers spliced into the
//! generated SQL are validated, so a user-supplied namespace cannot smuggle
//! in extra statements.

use std::fmt;

use crate::error::Result;
use crate::types::{Namespace, validate_identifier};

/// A family of derived ratios, materialized as one table each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndicatorFamily {
    /// Margins and returns on capital.
    Profitability,
    /// Debt structure ratios.
    Leverage,
    /// Short-term obligation coverage.
    Liquidity,
}

impl IndicatorFamily {
    /// All indicator families, in materialization order.
    pub const ALL: [Self; 3] = [Self::Profitability, Self::Leverage, Self::Liquidity];

    /// Returns the family name used as the table-name suffix.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Profitability => "profitability",
            Self::Leverage => "leverage",
            Self::Liquidity => "liquidity",
        }
    }

    /// Returns the metrics of this family.
    #[must_use]
    pub const fn metrics(&self) -> &'static [Indicator] {
        match self {
            Self::Profitability => &PROFITABILITY,
            Self::Leverage => &LEVERAGE,
            Self::Liquidity => &LIQUIDITY,
        }
    }
}

impl fmt::Display for IndicatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One derived ratio: a named quotient of wide-table expressions.
#[derive(Clone, Copy, Debug)]
pub struct Indicator {
    /// Output column name.
    pub name: &'static str,
    /// SQL expression for the numerator.
    pub numerator: &'static str,
    /// SQL expression for the denominator.
    pub denominator: &'static str,
}

impl Indicator {
    const fn new(name: &'static str, numerator: &'static str, denominator: &'static str) -> Self {
        Self {
            name,
            numerator,
            denominator,
        }
    }
}

const PROFITABILITY: [Indicator; 6] = [
    Indicator::new("return_on_equity", r#""netIncome""#, r#""totalEquity""#),
    Indicator::new("return_on_assets", r#""netIncome""#, r#""totalAssets""#),
    Indicator::new(
        "simplified_roic",
        r#"("netIncome" - "dividendsPaid")"#,
        r#"("totalDebt" + "totalEquity")"#,
    ),
    Indicator::new("gross_profit_margin", r#""grossProfit""#, r#""revenue""#),
    Indicator::new("operating_margin", r#""operatingIncome""#, r#""revenue""#),
    Indicator::new("net_profit_margin", r#""netIncome""#, r#""revenue""#),
];

const LEVERAGE: [Indicator; 4] = [
    Indicator::new("debt_to_equity", r#""totalDebt""#, r#""totalEquity""#),
    Indicator::new("equity_ratio", r#""totalEquity""#, r#""totalAssets""#),
    Indicator::new("debt_ratio", r#""totalDebt""#, r#""totalAssets""#),
    Indicator::new(
        "debt_to_capital",
        r#""totalDebt""#,
        r#"("totalDebt" + "totalEquity")"#,
    ),
];

const LIQUIDITY: [Indicator; 5] = [
    Indicator::new(
        "current_ratio",
        r#""totalCurrentAssets""#,
        r#""totalCurrentLiabilities""#,
    ),
    Indicator::new(
        "quick_ratio",
        r#"("cashAndCashEquivalents" + "shortTermInvestments" + "accountsReceivables")"#,
        r#""totalCurrentLiabilities""#,
    ),
    Indicator::new(
        "cash_ratio",
        r#""cashAndCashEquivalents""#,
        r#""totalCurrentLiabilities""#,
    ),
    Indicator::new(
        "capex_to_operating_cash_ratio",
        r#"ABS("operatingCashFlow")"#,
        r#""capitalExpenditure""#,
    ),
    Indicator::new(
        "operating_cash_flow_ratio",
        r#""operatingCashFlow""#,
        r#""totalCurrentLiabilities""#,
    ),
];

/// A division that yields NULL on a zero or NULL denominator.
#[must_use]
pub fn safe_ratio(numerator: &str, denominator: &str) -> String {
    format!(
        "CASE WHEN {denominator} IS NULL OR {denominator} = 0 THEN NULL \
         ELSE CAST({numerator} AS REAL) / {denominator} END"
    )
}

/// The SELECT projecting one family's ratios from a source table.
///
/// # Errors
/// Returns [`crate::EtlError::InvalidIdentifier`] if the source table name is
/// not a valid identifier.
pub fn select_sql(family: IndicatorFamily, source_table: &str) -> Result<String> {
    validate_identifier(source_table)?;
    let projections: Vec<String> = family
        .metrics()
        .iter()
        .map(|m| format!("{} AS \"{}\"", safe_ratio(m.numerator, m.denominator), m.name))
        .collect();
    Ok(format!(
        "SELECT \"date\", \"symbol\", {} FROM \"{source_table}\"",
        projections.join(", ")
    ))
}

/// Statement materializing a family table from the namespace's wide
/// statements table.
///
/// # Errors
/// Returns an error if a generated identifier fails validation.
pub fn create_table_sql(namespace: &Namespace, family: IndicatorFamily) -> Result<String> {
    let select = select_sql(family, &namespace.table("statements"))?;
    Ok(format!(
        "CREATE TABLE \"{}\" AS {select}",
        namespace.table(family.as_str())
    ))
}

/// Statement appending a family's ratios to an existing family table.
///
/// Used on timestamped runs; appends are not deduplicated, so re-running the
/// same period inserts duplicate rows.
///
/// # Errors
/// Returns an error if a generated identifier fails validation.
pub fn append_sql(namespace: &Namespace, family: IndicatorFamily) -> Result<String> {
    let select = select_sql(family, &namespace.table("statements"))?;
    Ok(format!(
        "INSERT INTO \"{}\" {select}",
        namespace.table(family.as_str())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_sizes() {
        assert_eq!(IndicatorFamily::Profitability.metrics().len(), 6);
        assert_eq!(IndicatorFamily::Leverage.metrics().len(), 4);
        assert_eq!(IndicatorFamily::Liquidity.metrics().len(), 5);
    }

    #[test]
    fn test_safe_ratio_guards_denominator() {
        let sql = safe_ratio(r#""netIncome""#, r#""totalEquity""#);
        assert!(sql.contains(r#"WHEN "totalEquity" IS NULL OR "totalEquity" = 0 THEN NULL"#));
    }

    #[test]
    fn test_select_sql_projects_all_metrics() {
        let sql = select_sql(IndicatorFamily::Liquidity, "tech_statements").unwrap();
        assert!(sql.starts_with("SELECT \"date\", \"symbol\","));
        for metric in IndicatorFamily::Liquidity.metrics() {
            assert!(sql.contains(metric.name));
        }
        assert!(sql.ends_with("FROM \"tech_statements\""));
    }

    #[test]
    fn test_select_sql_rejects_bad_source() {
        assert!(select_sql(IndicatorFamily::Leverage, "tech; DROP TABLE x").is_err());
    }

    #[test]
    fn test_create_and_append_name_family_tables() {
        let ns = Namespace::new("tech").unwrap();
        let create = create_table_sql(&ns, IndicatorFamily::Profitability).unwrap();
        assert!(create.starts_with("CREATE TABLE \"tech_profitability\" AS SELECT"));

        let append = append_sql(&ns, IndicatorFamily::Profitability).unwrap();
        assert!(append.starts_with("INSERT INTO \"tech_profitability\" SELECT"));
    }
}
