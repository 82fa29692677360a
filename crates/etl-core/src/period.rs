//! Reporting period definitions.
//!
//! [`PeriodType`] selects between annual and quarterly statement data and
//! maps directly onto the API's `period` query parameter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EtlError;

/// Reporting period for fundamental financial data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarter,
}

impl PeriodType {
    /// Returns the query-parameter spelling of this period.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarter => "quarter",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annual" => Ok(Self::Annual),
            "quarter" => Ok(Self::Quarter),
            other => Err(EtlError::Config(format!(
                "Unknown period '{other}'. Options: 'annual' or 'quarter'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_round_trip() {
        assert_eq!("annual".parse::<PeriodType>().unwrap(), PeriodType::Annual);
        assert_eq!("quarter".parse::<PeriodType>().unwrap(), PeriodType::Quarter);
        assert!("monthly".parse::<PeriodType>().is_err());
    }

    #[test]
    fn test_default_is_annual() {
        assert_eq!(PeriodType::default(), PeriodType::Annual);
    }
}
