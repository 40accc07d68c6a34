use chrono::NaiveDate;
use config::{Config, ConfigError, FileFormat, Map, Source, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub aws: AwsConfig,
    pub s3: SourcePaths,
    #[serde(rename = "s3-output")]
    pub output: OutputConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub write: WriteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AwsConfig {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default = "default_true")]
    pub verify_buckets: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcePaths {
    pub immi_data: String,
    pub demo_data: String,
    pub airport_data: String,
    pub country_data: String,
    pub region_data: String,
    #[serde(default)]
    pub immi_format: SourceFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Parquet,
    Csv,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub output_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPolicy {
    /// Report failures and keep going.
    #[default]
    Advisory,
    /// Fail the table before it is written.
    Enforce,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QualityConfig {
    #[serde(default)]
    pub policy: QualityPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_start")]
    pub start: NaiveDate,
    #[serde(default = "default_calendar_end")]
    pub end: NaiveDate,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            start: default_calendar_start(),
            end: default_calendar_end(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WriteConfig {
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default = "default_compression")]
    pub compression: String,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            overwrite: true,
            compression: default_compression(),
        }
    }
}

fn default_s3_region() -> String {
    "us-west-2".to_string()
}

fn default_true() -> bool {
    true
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_calendar_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 12, 1).unwrap_or_default()
}

fn default_calendar_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
}

/// INI sources keep section and key case (`[S3-OUTPUT]`, `OUTPUT_PATH`);
/// settings fields are lowercase.
#[derive(Debug, Clone)]
struct LowercaseKeys<S>(S);

fn lowercase_table(table: Map<String, Value>) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(key, mut value)| {
            if let ValueKind::Table(nested) = &mut value.kind {
                *nested = lowercase_table(std::mem::take(nested));
            }
            (key.to_lowercase(), value)
        })
        .collect()
}

impl<S> Source for LowercaseKeys<S>
where
    S: Source + Clone + Send + Sync + 'static,
{
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(lowercase_table(self.0.collect()?))
    }
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        // `.cfg` is not a registered extension; everything else is resolved
        // by extension.
        let is_ini = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cfg") || ext.eq_ignore_ascii_case("ini"));

        let builder = if is_ini {
            Config::builder().add_source(LowercaseKeys(config::File::new(path, FileFormat::Ini)))
        } else {
            Config::builder().add_source(config::File::with_name(path))
        };
        let builder =
            builder.add_source(config::Environment::with_prefix("ETL").separator("__"));

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        debug!(
            output = %settings.output.output_path,
            region = %settings.aws.region,
            policy = ?settings.quality.policy,
            "Loaded ETL settings"
        );

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("s3.immi_data", &self.s3.immi_data),
            ("s3.demo_data", &self.s3.demo_data),
            ("s3.airport_data", &self.s3.airport_data),
            ("s3.country_data", &self.s3.country_data),
            ("s3.region_data", &self.s3.region_data),
            ("s3-output.output_path", &self.output.output_path),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", key)));
            }
        }

        if self.calendar.start > self.calendar.end {
            return Err(ConfigError::Message(format!(
                "calendar.start ({}) is after calendar.end ({})",
                self.calendar.start, self.calendar.end
            )));
        }

        Ok(())
    }
}
