use super::{TableJob, ascending, text};
use crate::schema::REGION_SCHEMA;
use crate::session::EtlSession;
use arrow::datatypes::Schema;
use async_trait::async_trait;
use common::Result;
use datafusion::prelude::*;

/// US subdivisions keyed by their ISO 3166-2 code (`US-NY`).
pub struct RegionTable {
    source: String,
}

impl RegionTable {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl TableJob for RegionTable {
    fn name(&self) -> &'static str {
        "region_table"
    }

    fn key_column(&self) -> &'static str {
        "country_state"
    }

    fn partition_by(&self) -> &'static [&'static str] {
        &[]
    }

    fn schema(&self) -> &'static Schema {
        &REGION_SCHEMA
    }

    async fn build(&self, session: &EtlSession) -> Result<DataFrame> {
        let df = session.read_csv(&self.source, b',').await?;

        // "US-NY" -> "NY"; codes without a second part have no state code
        let state_code = nullif(split_part(text("code"), lit("-"), lit(2i64)), lit(""));

        let df = df
            .filter(text("country_code").eq(lit("US")))?
            .select(vec![
                text("subdivision_name").alias("state_name"),
                state_code.alias("state_code"),
                text("country_code").alias("country_code"),
                text("code").alias("country_state"),
            ])?
            .distinct()?
            .sort(vec![ascending(col("state_name")), ascending(col("country_state"))])?;

        Ok(df)
    }
}
