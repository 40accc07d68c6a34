use super::{TableJob, ascending, text};
use crate::schema::COUNTRY_SCHEMA;
use crate::session::EtlSession;
use arrow::datatypes::Schema;
use async_trait::async_trait;
use common::Result;
use datafusion::prelude::*;

/// Country name to ISO code lookup.
pub struct CountryTable {
    source: String,
}

impl CountryTable {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl TableJob for CountryTable {
    fn name(&self) -> &'static str {
        "country_table"
    }

    fn key_column(&self) -> &'static str {
        "country_name"
    }

    fn partition_by(&self) -> &'static [&'static str] {
        &[]
    }

    fn schema(&self) -> &'static Schema {
        &COUNTRY_SCHEMA
    }

    async fn build(&self, session: &EtlSession) -> Result<DataFrame> {
        let df = session.read_csv(&self.source, b',').await?;

        let df = df
            .select(vec![
                text("Name").alias("country_name"),
                text("Code").alias("country_code"),
            ])?
            .distinct()?
            .sort(vec![ascending(col("country_name")), ascending(col("country_code"))])?;

        Ok(df)
    }
}
