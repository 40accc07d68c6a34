use crate::storage::{S3Config, S3Manager};
use crate::udf::register_udfs;
use crate::utils::paths::s3_bucket;
use common::Result;
use common::config::{Settings, SourceFormat};
use datafusion::execution::context::SessionContext;
use datafusion::prelude::{CsvReadOptions, DataFrame, ParquetReadOptions};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Handle on the dataframe engine shared read-only by every table job.
pub struct EtlSession {
    ctx: SessionContext,
}

impl EtlSession {
    /// Builds the engine session and registers an S3 store for every bucket
    /// referenced by the configured source and output paths.
    pub async fn new(settings: &Settings) -> Result<Self> {
        let ctx = SessionContext::new();
        register_udfs(&ctx)?;

        let s3_manager = S3Manager::new(S3Config::from(&settings.aws));

        let buckets = referenced_buckets(settings)?;
        for bucket in &buckets {
            s3_manager.register_object_store(&ctx, bucket)?;
            if settings.aws.verify_buckets {
                s3_manager.verify_bucket_exists(bucket).await?;
            }
        }

        info!(buckets = buckets.len(), "ETL session ready");

        Ok(Self { ctx })
    }

    /// Session without any S3 registration, for local paths only.
    pub fn local() -> Result<Self> {
        let ctx = SessionContext::new();
        register_udfs(&ctx)?;
        Ok(Self { ctx })
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Reads delimited text with a header row. Every column comes back as
    /// text; the table jobs cast what they need.
    pub async fn read_csv(&self, path: &str, delimiter: u8) -> Result<DataFrame> {
        debug!(path, delimiter = %(delimiter as char), "Reading CSV source");
        let options = CsvReadOptions::new()
            .has_header(true)
            .delimiter(delimiter)
            .schema_infer_max_records(0);
        Ok(self.ctx.read_csv(path, options).await?)
    }

    pub async fn read_parquet(&self, path: &str) -> Result<DataFrame> {
        debug!(path, "Reading Parquet source");
        Ok(self
            .ctx
            .read_parquet(path, ParquetReadOptions::default())
            .await?)
    }

    pub async fn read_source(
        &self,
        path: &str,
        format: SourceFormat,
        delimiter: u8,
    ) -> Result<DataFrame> {
        match format {
            SourceFormat::Csv => self.read_csv(path, delimiter).await,
            SourceFormat::Parquet => self.read_parquet(path).await,
        }
    }
}

fn referenced_buckets(settings: &Settings) -> Result<BTreeSet<String>> {
    let paths = [
        &settings.s3.immi_data,
        &settings.s3.demo_data,
        &settings.s3.airport_data,
        &settings.s3.country_data,
        &settings.s3.region_data,
        &settings.output.output_path,
    ];

    let mut buckets = BTreeSet::new();
    for path in paths {
        if let Some(bucket) = s3_bucket(path)? {
            buckets.insert(bucket);
        }
    }
    Ok(buckets)
}
