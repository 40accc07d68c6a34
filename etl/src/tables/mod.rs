//! The six warehouse tables. Each job reads its source, cleans and projects it
//! into the output layout, and hands the frame back to the pipeline for
//! checking and writing.

pub mod airport;
pub mod calendar;
pub mod country;
pub mod demographics;
pub mod immigration;
pub mod region;

pub use airport::AirportTable;
pub use calendar::CalendarTable;
pub use country::CountryTable;
pub use demographics::DemographicsTable;
pub use immigration::ImmigrationTable;
pub use region::RegionTable;

use crate::session::EtlSession;
use arrow::datatypes::{DataType, Schema};
use async_trait::async_trait;
use common::Result;
use datafusion::logical_expr::SortExpr;
use datafusion::prelude::*;

#[async_trait]
pub trait TableJob: Send + Sync {
    /// Directory name of the table under the output root.
    fn name(&self) -> &'static str;

    /// Column the quality checks run against.
    fn key_column(&self) -> &'static str;

    /// Hive-style partition columns, outermost first.
    fn partition_by(&self) -> &'static [&'static str];

    fn schema(&self) -> &'static Schema;

    async fn build(&self, session: &EtlSession) -> Result<DataFrame>;
}

/// Replaces nulls in `expr` with `default`.
pub(crate) fn fill_null(expr: Expr, default: Expr) -> Result<Expr> {
    Ok(when(expr.clone().is_null(), default).otherwise(expr)?)
}

/// Source column as `Utf8`, whatever encoding the reader produced.
pub(crate) fn text(column: &str) -> Expr {
    cast(ident(column), DataType::Utf8)
}

/// Source column as `Float64`; unparseable text becomes null.
pub(crate) fn float(column: &str) -> Expr {
    try_cast(ident(column), DataType::Float64)
}

/// Integral code stored as a float (or float text) in the source, as `Int64`.
pub(crate) fn whole_number(column: &str) -> Expr {
    cast(float(column), DataType::Int64)
}

pub(crate) fn ascending(expr: Expr) -> SortExpr {
    expr.sort(true, false)
}
