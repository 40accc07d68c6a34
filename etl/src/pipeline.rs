use crate::quality::{CheckOutcome, apply_policy, check_key_column};
use crate::schema::validate_schema;
use crate::session::EtlSession;
use crate::tables::{
    AirportTable, CalendarTable, CountryTable, DemographicsTable, ImmigrationTable, RegionTable,
    TableJob,
};
use crate::utils::paths::table_destination;
use crate::writer::{WriteOptions, write_table};
use common::config::{QualityPolicy, Settings};
use common::{Error, Result};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub destination: String,
    pub rows_written: u64,
    pub checks: Vec<CheckOutcome>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn failed_checks(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| &t.checks)
            .filter(|c| !c.passed())
            .count()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// The fixed job sequence in run order.
pub fn table_jobs(settings: &Settings) -> Vec<Box<dyn TableJob>> {
    let sources = &settings.s3;
    vec![
        Box::new(AirportTable::new(&sources.airport_data)),
        Box::new(CountryTable::new(&sources.country_data)),
        Box::new(RegionTable::new(&sources.region_data)),
        Box::new(DemographicsTable::new(&sources.demo_data)),
        Box::new(ImmigrationTable::new(&sources.immi_data, sources.immi_format)),
        Box::new(CalendarTable::new(settings.calendar.start, settings.calendar.end)),
    ]
}

pub struct Pipeline {
    session: EtlSession,
    jobs: Vec<Box<dyn TableJob>>,
    output_root: String,
    policy: QualityPolicy,
    write_options: WriteOptions,
}

impl Pipeline {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let session = EtlSession::new(settings).await?;
        Ok(Self::with_session(session, settings))
    }

    pub fn with_session(session: EtlSession, settings: &Settings) -> Self {
        Self {
            session,
            jobs: table_jobs(settings),
            output_root: settings.output.output_path.clone(),
            policy: settings.quality.policy,
            write_options: WriteOptions::from(&settings.write),
        }
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// Runs every table, or only those named in `only`, in the fixed order.
    /// The first error stops the run.
    pub async fn run(&self, only: &[String]) -> Result<RunReport> {
        let known = self.table_names();
        if let Some(unknown) = only.iter().find(|name| !known.contains(&name.as_str())) {
            return Err(Error::InvalidInput(format!(
                "Unknown table '{}', expected one of: {}",
                unknown,
                known.join(", ")
            )));
        }

        let mut report = RunReport::default();
        for job in &self.jobs {
            if !only.is_empty() && !only.iter().any(|name| name == job.name()) {
                continue;
            }
            let span = info_span!("table", name = job.name());
            let table_report = self.run_table(job.as_ref()).instrument(span).await?;
            report.tables.push(table_report);
        }

        info!(
            tables = report.tables.len(),
            failed_checks = report.failed_checks(),
            "ETL run finished"
        );
        Ok(report)
    }

    async fn run_table(&self, job: &dyn TableJob) -> Result<TableReport> {
        let started = Instant::now();
        let destination = table_destination(&self.output_root, job.name());
        info!(%destination, "Building table");

        let df = job.build(&self.session).await?;
        validate_schema(job.name(), df.schema(), job.schema())?;

        let checks = check_key_column(&df, job.key_column()).await?;
        apply_policy(job.name(), &checks, self.policy)?;

        let rows_written = write_table(
            &self.session,
            df,
            &destination,
            job.partition_by(),
            &self.write_options,
        )
        .await?;

        Ok(TableReport {
            table: job.name().to_string(),
            destination,
            rows_written,
            checks,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}
