use super::TableJob;
use crate::schema::DATE_SCHEMA;
use crate::session::EtlSession;
use crate::udf::to_date32;
use arrow::array::{ArrayRef, Date32Array, Int32Array};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use common::{Error, Result};
use datafusion::prelude::*;
use std::sync::Arc;

/// One row per day of an inclusive date range. The only table without a
/// source file.
pub struct CalendarTable {
    start: NaiveDate,
    end: NaiveDate,
}

impl CalendarTable {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Builds the calendar rows for `start..=end`.
///
/// `week` is the ISO week number and `weekday` counts from Sunday = 1 to
/// Saturday = 7.
pub fn calendar_batch(start: NaiveDate, end: NaiveDate) -> Result<RecordBatch> {
    if start > end {
        return Err(Error::InvalidInput(format!(
            "calendar start {} is after end {}",
            start, end
        )));
    }

    let days: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();

    let date = Date32Array::from_iter_values(days.iter().map(|d| to_date32(*d)));
    let day = Int32Array::from_iter_values(days.iter().map(|d| d.day() as i32));
    let week = Int32Array::from_iter_values(days.iter().map(|d| d.iso_week().week() as i32));
    let month = Int32Array::from_iter_values(days.iter().map(|d| d.month() as i32));
    let year = Int32Array::from_iter_values(days.iter().map(|d| d.year()));
    let weekday =
        Int32Array::from_iter_values(days.iter().map(|d| d.weekday().number_from_sunday() as i32));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(date),
        Arc::new(day),
        Arc::new(week),
        Arc::new(month),
        Arc::new(year),
        Arc::new(weekday),
    ];

    Ok(RecordBatch::try_new(Arc::new(DATE_SCHEMA.clone()), columns)?)
}

#[async_trait]
impl TableJob for CalendarTable {
    fn name(&self) -> &'static str {
        "date_table"
    }

    fn key_column(&self) -> &'static str {
        "date"
    }

    fn partition_by(&self) -> &'static [&'static str] {
        &["month"]
    }

    fn schema(&self) -> &'static Schema {
        &DATE_SCHEMA
    }

    async fn build(&self, session: &EtlSession) -> Result<DataFrame> {
        let batch = calendar_batch(self.start, self.end)?;
        Ok(session.session_context().read_batch(batch)?)
    }
}
