pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod session;
pub mod storage;
pub mod tables;
pub mod udf;
pub mod utils;
pub mod writer;

use common::Result;
use common::config::Settings;
use pipeline::{Pipeline, RunReport};

/// Loads the settings at `config_path` and runs all six tables.
pub async fn run_etl_pipeline(config_path: &str) -> Result<RunReport> {
    let settings = Settings::new(config_path)?;
    let pipeline = Pipeline::new(&settings).await?;
    pipeline.run(&[]).await
}
