use crate::session::EtlSession;
use crate::tables::fill_null;
use arrow::array::{Array, UInt64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use common::config::WriteConfig;
use common::{Error, Result};
use datafusion::common::config::TableParquetOptions;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::datasource::listing::ListingTableUrl;
use datafusion::prelude::*;
use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Directory value Hive-style readers map back to null.
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub overwrite: bool,
    pub compression: String,
}

impl From<&WriteConfig> for WriteOptions {
    fn from(config: &WriteConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            compression: config.compression.clone(),
        }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::from(&WriteConfig::default())
    }
}

/// Writes `df` as Parquet under `destination`, one Hive-style directory level
/// per partition column. Returns the number of rows written.
pub async fn write_table(
    session: &EtlSession,
    df: DataFrame,
    destination: &str,
    partition_by: &[&str],
    options: &WriteOptions,
) -> Result<u64> {
    if options.overwrite {
        clear_destination(session, destination).await?;
    }

    let df = render_partition_columns(df, partition_by)?;

    let mut parquet_options = TableParquetOptions::new();
    parquet_options.global.compression = Some(options.compression.clone());

    let write_options = DataFrameWriteOptions::new()
        .with_partition_by(partition_by.iter().map(|c| c.to_string()).collect());

    let result = df
        .write_parquet(destination, write_options, Some(parquet_options))
        .await?;
    let rows = written_rows(&result);

    if rows > 0 {
        verify_destination(session, destination).await?;
    }

    info!(destination, rows, partitions = ?partition_by, "Wrote table");
    Ok(rows)
}

/// Partition values become directory names, so partition columns are written
/// as text with nulls mapped to the Hive default partition.
fn render_partition_columns(df: DataFrame, partition_by: &[&str]) -> Result<DataFrame> {
    if partition_by.is_empty() {
        return Ok(df);
    }

    for column in partition_by {
        if df.schema().field_with_unqualified_name(column).is_err() {
            return Err(Error::InvalidInput(format!(
                "Partition column '{}' is not in the table",
                column
            )));
        }
    }

    let mut projection = Vec::with_capacity(df.schema().fields().len());
    for field in df.schema().fields() {
        let name = field.name();
        if partition_by.contains(&name.as_str()) {
            let rendered = cast(ident(name), DataType::Utf8);
            projection.push(fill_null(rendered, lit(HIVE_DEFAULT_PARTITION))?.alias(name));
        } else {
            projection.push(ident(name));
        }
    }

    Ok(df.select(projection)?)
}

fn written_rows(result: &[RecordBatch]) -> u64 {
    result
        .iter()
        .filter_map(|batch| batch.column_by_name("count"))
        .filter_map(|column| column.as_any().downcast_ref::<UInt64Array>())
        .flat_map(|counts| counts.iter().flatten())
        .sum()
}

fn destination_store(
    session: &EtlSession,
    destination: &str,
) -> Result<(Arc<dyn ObjectStore>, Path)> {
    let table_url = ListingTableUrl::parse(destination)?;
    let store = session
        .session_context()
        .runtime_env()
        .object_store(table_url.object_store())?;
    Ok((store, table_url.prefix().clone()))
}

async fn list_destination(store: &dyn ObjectStore, prefix: &Path) -> Result<Vec<Path>> {
    match store
        .list(Some(prefix))
        .map_ok(|meta| meta.location)
        .try_collect::<Vec<_>>()
        .await
    {
        Ok(locations) => Ok(locations),
        Err(object_store::Error::NotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Deletes everything under the destination prefix so reruns replace the
/// previous output instead of adding to it.
pub async fn clear_destination(session: &EtlSession, destination: &str) -> Result<usize> {
    let (store, prefix) = destination_store(session, destination)?;
    let existing = list_destination(store.as_ref(), &prefix).await?;

    for location in &existing {
        store.delete(location).await?;
    }

    if !existing.is_empty() {
        debug!(destination, objects = existing.len(), "Cleared previous output");
    }
    Ok(existing.len())
}

async fn verify_destination(session: &EtlSession, destination: &str) -> Result<()> {
    let (store, prefix) = destination_store(session, destination)?;
    let written = list_destination(store.as_ref(), &prefix).await?;

    if written.iter().any(|location| location.as_ref().ends_with(".parquet")) {
        Ok(())
    } else {
        Err(Error::Storage(format!(
            "No parquet files found after writing: {}",
            destination
        )))
    }
}
