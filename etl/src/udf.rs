use chrono::{Days, NaiveDate};
use common::Result;
use datafusion::arrow::array::{Array, Date32Array, Float64Array};
use datafusion::arrow::datatypes::DataType;
use datafusion::common::DataFusionError;
use datafusion::execution::context::SessionContext;
use datafusion::logical_expr::{ColumnarValue, Volatility, create_udf};
use std::sync::Arc;

pub const SAS_DATE_UDF: &str = "sas_date";

/// Day zero of the immigration extract's date columns.
pub fn sas_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1960, 1, 1).unwrap_or_default()
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Registers all UDFs with the SessionContext
pub fn register_udfs(ctx: &SessionContext) -> Result<()> {
    let sas_date = create_udf(
        SAS_DATE_UDF,
        vec![DataType::Float64],
        DataType::Date32,
        Volatility::Immutable,
        Arc::new(|args| {
            decode_sas_dates(args).map_err(|e| DataFusionError::Internal(e.to_string()))
        }),
    );

    ctx.register_udf(sas_date);

    Ok(())
}

/// Decodes a day offset from 1960-01-01 into a calendar date.
///
/// Fractional offsets are truncated. Returns `None` for non-finite values and
/// results outside chrono's range.
pub fn sas_offset_to_date(offset: f64) -> Option<NaiveDate> {
    if !offset.is_finite() {
        return None;
    }

    let days = offset.trunc() as i64;
    let epoch = sas_epoch();
    if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Arrow `Date32` value (days since 1970-01-01) of a calendar date.
pub fn to_date32(date: NaiveDate) -> i32 {
    date.signed_duration_since(unix_epoch()).num_days() as i32
}

fn decode_sas_dates(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let input = match &args[0] {
        ColumnarValue::Array(array) => array.clone(),
        ColumnarValue::Scalar(scalar) => scalar.to_array()?,
    };
    let offsets = input
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| DataFusionError::Internal("Expected float64 array".to_string()))?;

    let result: Date32Array = offsets
        .iter()
        .map(|opt_offset| opt_offset.and_then(sas_offset_to_date).map(to_date32))
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}
