use clap::{Arg, ArgAction, ArgMatches, Command};
use common::Result;
use common::config::Settings;
use etl::pipeline::{Pipeline, table_jobs};
use etl::utils::paths::table_destination;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/etl.toml";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Sets a custom config file [default: config/etl.toml]")
}

fn config_path(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG)
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config_path = config_path(matches);
    let only: Vec<String> = matches
        .get_many::<String>("table")
        .map(|names| names.cloned().collect())
        .unwrap_or_default();

    info!(config = config_path, "Starting ETL pipeline");
    let settings = Settings::new(config_path)?;
    let pipeline = Pipeline::new(&settings).await?;
    let report = pipeline.run(&only).await?;

    for table in &report.tables {
        println!(
            "{:<20} {:>10} rows  {}",
            table.table, table.rows_written, table.destination
        );
    }

    if let Some(path) = matches.get_one::<String>("report") {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &report)?;
        info!(path = %path, "Wrote run report");
    }
    Ok(())
}

fn list_tables(matches: &ArgMatches) -> Result<()> {
    let config_path = config_path(matches);
    let settings = Settings::new(config_path)?;

    for job in table_jobs(&settings) {
        println!(
            "{:<20} key={:<14} partitions=[{}]  {}",
            job.name(),
            job.key_column(),
            job.partition_by().join(", "),
            table_destination(&settings.output.output_path, job.name())
        );
    }
    Ok(())
}

fn cli() -> Command {
    Command::new("ETL Pipeline Manager")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds the immigration warehouse tables as partitioned Parquet")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run the ETL pipeline")
                .arg(config_arg())
                .arg(
                    Arg::new("table")
                        .long("table")
                        .value_name("NAME")
                        .action(ArgAction::Append)
                        .help("Only build this table (repeatable)"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_name("FILE")
                        .help("Write a JSON run report"),
                ),
        )
        .subcommand(
            Command::new("tables")
                .about("List the output tables")
                .arg(config_arg()),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    init_logging(matches.get_flag("json-logs"));

    let result = match matches.subcommand() {
        Some(("run", run_matches)) => run(run_matches).await,
        Some(("tables", tables_matches)) => list_tables(tables_matches),
        _ => {
            eprintln!("Please specify a valid subcommand");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("ETL pipeline error: {}", e);
        process::exit(1);
    }
}
