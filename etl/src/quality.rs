use common::config::QualityPolicy;
use common::{Error, Result};
use datafusion::dataframe::DataFrame;
use datafusion::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Key column has no nulls.
    NotNull,
    /// Key column has as many distinct values as the table has rows.
    Unique,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::NotNull => write!(f, "null check"),
            CheckKind::Unique => write!(f, "uniqueness check"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub column: String,
    /// Value the check expects to observe (0 nulls, or the row count).
    pub expected: u64,
    pub observed: u64,
    pub violations: u64,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.violations == 0
    }
}

/// Counts rows whose `column` is null.
pub async fn null_check(df: &DataFrame, column: &str) -> Result<CheckOutcome> {
    let null_count = df.clone().filter(ident(column).is_null())?.count().await? as u64;

    Ok(CheckOutcome {
        check: CheckKind::NotNull,
        column: column.to_string(),
        expected: 0,
        observed: null_count,
        violations: null_count,
    })
}

/// Compares the distinct count of `column` against the total row count.
pub async fn unique_check(df: &DataFrame, column: &str) -> Result<CheckOutcome> {
    let unique_count = df
        .clone()
        .select(vec![ident(column)])?
        .distinct()?
        .count()
        .await? as u64;
    let row_count = df.clone().count().await? as u64;

    Ok(CheckOutcome {
        check: CheckKind::Unique,
        column: column.to_string(),
        expected: row_count,
        observed: unique_count,
        violations: row_count.saturating_sub(unique_count),
    })
}

/// Runs both checks against the key column of a table.
pub async fn check_key_column(df: &DataFrame, column: &str) -> Result<Vec<CheckOutcome>> {
    Ok(vec![
        null_check(df, column).await?,
        unique_check(df, column).await?,
    ])
}

/// Reports every outcome and, under [`QualityPolicy::Enforce`], turns the
/// first failure into an error.
pub fn apply_policy(table: &str, outcomes: &[CheckOutcome], policy: QualityPolicy) -> Result<()> {
    for outcome in outcomes {
        if outcome.passed() {
            info!(
                table,
                column = %outcome.column,
                check = %outcome.check,
                "Data quality check passed"
            );
        } else {
            warn!(
                table,
                column = %outcome.column,
                check = %outcome.check,
                expected = outcome.expected,
                observed = outcome.observed,
                violations = outcome.violations,
                "Data quality check failed"
            );
        }
    }

    if policy == QualityPolicy::Enforce {
        if let Some(failed) = outcomes.iter().find(|o| !o.passed()) {
            return Err(Error::QualityCheck(format!(
                "{} on {}.{} found {} violation(s)",
                failed.check, table, failed.column, failed.violations
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn keyed_frame(ids: Vec<Option<&str>>) -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("immi_id", DataType::Utf8, true),
            Field::new("age", DataType::Int64, true),
        ]));
        let ages = Int64Array::from_iter_values(0..ids.len() as i64);
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(ids)), Arc::new(ages)],
        )
        .unwrap();

        SessionContext::new().read_batch(batch).unwrap()
    }

    #[tokio::test]
    async fn test_clean_key_passes_both_checks() {
        let df = keyed_frame(vec![Some("1"), Some("2"), Some("3")]);

        let outcomes = check_key_column(&df, "immi_id").await.unwrap();

        assert!(outcomes.iter().all(CheckOutcome::passed));
        assert_eq!(outcomes[1].expected, 3);
        assert!(apply_policy("immigration_table", &outcomes, QualityPolicy::Enforce).is_ok());
    }

    #[tokio::test]
    async fn test_injected_violations_are_advisory_by_default() {
        let df = keyed_frame(vec![Some("1"), None, Some("1"), Some("2")]);

        let nulls = null_check(&df, "immi_id").await.unwrap();
        assert_eq!(nulls.violations, 1);
        assert!(!nulls.passed());

        // distinct values are "1", "2" and null
        let unique = unique_check(&df, "immi_id").await.unwrap();
        assert_eq!(unique.expected, 4);
        assert_eq!(unique.observed, 3);
        assert_eq!(unique.violations, 1);

        assert!(apply_policy("immigration_table", &[nulls, unique], QualityPolicy::Advisory).is_ok());

        // the checked frame is untouched
        assert_eq!(df.clone().count().await.unwrap(), 4);
        assert_eq!(df.schema().fields().len(), 2);
    }

    #[tokio::test]
    async fn test_enforce_rejects_duplicates() {
        let df = keyed_frame(vec![Some("7"), Some("7")]);
        let outcomes = check_key_column(&df, "immi_id").await.unwrap();

        let err = apply_policy("immigration_table", &outcomes, QualityPolicy::Enforce).unwrap_err();
        assert!(matches!(err, Error::QualityCheck(_)));
        assert!(err.to_string().contains("uniqueness check"));
    }
}
