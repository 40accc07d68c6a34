use super::{TableJob, ascending, fill_null, float, text};
use crate::schema::DEMOGRAPHICS_SCHEMA;
use crate::session::EtlSession;
use arrow::array::{ArrayRef, Int64Array};
use arrow::record_batch::RecordBatch;
use arrow::datatypes::{DataType, Field, Schema};
use async_trait::async_trait;
use common::Result;
use datafusion::datasource::MemTable;
use datafusion::logical_expr::SortExpr;
use datafusion::prelude::*;
use std::sync::Arc;
use tracing::debug;

const TEXT_DEFAULT: &str = "NA";
const NUMERIC_DEFAULT: f64 = 0.0;

/// US city demographics, one row per city and race.
pub struct DemographicsTable {
    source: String,
}

impl DemographicsTable {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

fn filled_text(source: &str, output: &str) -> Result<Expr> {
    Ok(fill_null(text(source), lit(TEXT_DEFAULT))?.alias(output))
}

fn filled_number(source: &str, output: &str) -> Result<Expr> {
    Ok(fill_null(float(source), lit(NUMERIC_DEFAULT))?.alias(output))
}

/// Prepends a 0-based `id` column following the frame's current row order.
async fn with_sequential_ids(session: &EtlSession, df: DataFrame) -> Result<DataFrame> {
    let mut fields = vec![Field::new("id", DataType::Int64, false)];
    fields.extend(df.schema().as_arrow().fields().iter().map(|f| f.as_ref().clone()));
    let schema = Arc::new(Schema::new(fields));

    let batches = df.collect().await?;

    let mut next_id = 0i64;
    let mut with_ids = Vec::with_capacity(batches.len());
    for batch in batches {
        let rows = batch.num_rows() as i64;
        let ids: ArrayRef = Arc::new(Int64Array::from_iter_values(next_id..next_id + rows));
        next_id += rows;

        let mut columns = vec![ids];
        columns.extend(batch.columns().iter().cloned());
        with_ids.push(RecordBatch::try_new(schema.clone(), columns)?);
    }
    debug!(rows = next_id, "Assigned demographics ids");

    let table = MemTable::try_new(schema, vec![with_ids])?;
    Ok(session.session_context().read_table(Arc::new(table))?)
}

#[async_trait]
impl TableJob for DemographicsTable {
    fn name(&self) -> &'static str {
        "demographics_table"
    }

    fn key_column(&self) -> &'static str {
        "id"
    }

    fn partition_by(&self) -> &'static [&'static str] {
        &["state_code"]
    }

    fn schema(&self) -> &'static Schema {
        &DEMOGRAPHICS_SCHEMA
    }

    async fn build(&self, session: &EtlSession) -> Result<DataFrame> {
        let df = session.read_csv(&self.source, b';').await?;

        let projection = vec![
            filled_text("City", "city_name")?,
            filled_text("State Code", "state_code")?,
            filled_number("Median Age", "median_age")?,
            filled_number("Male Population", "male_population")?,
            filled_number("Female Population", "female_population")?,
            filled_number("Total Population", "total_population")?,
            filled_number("Foreign-born", "foreign_born")?,
            filled_number("Average Household Size", "avg_household_size")?,
            filled_text("Race", "race")?,
            filled_number("Count", "race_population")?,
        ];

        let order: Vec<SortExpr> = DEMOGRAPHICS_SCHEMA
            .fields()
            .iter()
            .skip(1)
            .map(|f| ascending(ident(f.name())))
            .collect();

        // Ids are assigned after a total sort so they are stable across runs
        // of the same source.
        let df = df.select(projection)?.distinct()?.sort(order)?;

        with_sequential_ids(session, df).await
    }
}
