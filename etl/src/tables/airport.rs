use super::{TableJob, ascending, fill_null, text};
use crate::schema::AIRPORT_SCHEMA;
use crate::session::EtlSession;
use arrow::datatypes::{DataType, Schema};
use async_trait::async_trait;
use common::Result;
use datafusion::prelude::*;

/// US airports from the airport-codes listing, partitioned by ISO region.
pub struct AirportTable {
    source: String,
}

impl AirportTable {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// One half of the `"<x>, <y>"` coordinates pair; null when it does not parse.
fn coordinate(part: i64) -> Expr {
    try_cast(
        btrim(vec![split_part(text("coordinates"), lit(","), lit(part))]),
        DataType::Float64,
    )
}

#[async_trait]
impl TableJob for AirportTable {
    fn name(&self) -> &'static str {
        "airport_table"
    }

    fn key_column(&self) -> &'static str {
        "airport_id"
    }

    fn partition_by(&self) -> &'static [&'static str] {
        &["region"]
    }

    fn schema(&self) -> &'static Schema {
        &AIRPORT_SCHEMA
    }

    async fn build(&self, session: &EtlSession) -> Result<DataFrame> {
        let df = session.read_csv(&self.source, b',').await?;

        let df = df
            .filter(text("iso_country").eq(lit("US")))?
            .select(vec![
                text("ident").alias("airport_id"),
                text("name").alias("airport_name"),
                text("type").alias("airport_type"),
                text("iso_region").alias("region"),
                fill_null(text("municipality"), lit("NA"))?.alias("municipality"),
                coordinate(1).alias("coordinate_x"),
                coordinate(2).alias("coordinate_y"),
            ])?
            .distinct()?
            .sort(vec![ascending(col("region")), ascending(col("airport_id"))])?;

        Ok(df)
    }
}
