use super::{TableJob, ascending, fill_null, float, text, whole_number};
use crate::schema::IMMIGRATION_SCHEMA;
use crate::session::EtlSession;
use crate::udf::{SAS_DATE_UDF, sas_epoch};
use arrow::datatypes::Schema;
use async_trait::async_trait;
use common::Result;
use common::config::SourceFormat;
use datafusion::prelude::*;
use tracing::{Level, warn};

/// I94 arrivals, partitioned by country of residency and arrival state.
pub struct ImmigrationTable {
    source: String,
    format: SourceFormat,
}

impl ImmigrationTable {
    pub fn new(source: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            source: source.into(),
            format,
        }
    }
}

/// Source rows whose departure offset is missing or unparseable. They are
/// decoded as offset 0, i.e. the epoch itself.
pub(crate) async fn missing_departures(df: &DataFrame) -> Result<usize> {
    Ok(df.clone().filter(float("depdate").is_null())?.count().await?)
}

#[async_trait]
impl TableJob for ImmigrationTable {
    fn name(&self) -> &'static str {
        "immigration_table"
    }

    fn key_column(&self) -> &'static str {
        "immi_id"
    }

    fn partition_by(&self) -> &'static [&'static str] {
        &["residency", "arrival_state"]
    }

    fn schema(&self) -> &'static Schema {
        &IMMIGRATION_SCHEMA
    }

    async fn build(&self, session: &EtlSession) -> Result<DataFrame> {
        let df = session.read_source(&self.source, self.format, b',').await?;

        // The count is a separate scan of the source, only taken when the
        // warning can be emitted.
        if tracing::enabled!(Level::WARN) {
            let missing = missing_departures(&df).await?;
            if missing > 0 {
                warn!(
                    rows = missing,
                    epoch = %sas_epoch(),
                    "Missing departure dates decoded as the epoch date"
                );
            }
        }

        let sas_date = df.registry().udf(SAS_DATE_UDF)?;
        let departure_offset = fill_null(float("depdate"), lit(0.0))?;

        let df = df
            .select(vec![
                whole_number("cicid").alias("immi_id"),
                whole_number("i94res").alias("residency"),
                text("i94port").alias("entry_port"),
                sas_date.call(vec![float("arrdate")]).alias("arrival_date"),
                whole_number("i94mode").alias("transportation"),
                text("i94addr").alias("arrival_state"),
                sas_date.call(vec![departure_offset]).alias("departure_date"),
                whole_number("i94bir").alias("age"),
                whole_number("i94visa").alias("travel_purpose"),
                whole_number("biryear").alias("birth_year"),
                text("gender").alias("gender"),
                text("airline").alias("airline"),
                text("fltno").alias("flight_number"),
                text("visatype").alias("visa_type"),
            ])?
            .distinct()?
            .sort(vec![ascending(col("immi_id"))])?;

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::test_support::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::path::Path;
    use std::sync::Arc;

    const FLOAT_COLUMNS: [&str; 8] = [
        "cicid", "i94res", "arrdate", "i94mode", "depdate", "i94bir", "i94visa", "biryear",
    ];
    const TEXT_COLUMNS: [&str; 6] = ["i94port", "i94addr", "gender", "airline", "fltno", "visatype"];

    /// Two arrivals, the first one repeated; the second never departed.
    fn write_extract(path: &Path) {
        let mut fields = Vec::new();
        let mut columns: Vec<ArrayRef> = Vec::new();

        let floats: [[Option<f64>; 3]; 8] = [
            [Some(1.0), Some(2.0), Some(1.0)],
            [Some(101.0), Some(438.0), Some(101.0)],
            [Some(20545.0), Some(20546.0), Some(20545.0)],
            [Some(1.0), Some(1.0), Some(1.0)],
            [Some(20550.0), None, Some(20550.0)],
            [Some(30.0), Some(45.0), Some(30.0)],
            [Some(2.0), Some(1.0), Some(2.0)],
            [Some(1986.0), Some(1971.0), Some(1986.0)],
        ];
        for (name, values) in FLOAT_COLUMNS.iter().zip(floats) {
            fields.push(Field::new(*name, DataType::Float64, true));
            columns.push(Arc::new(Float64Array::from(values.to_vec())));
        }

        let texts: [[Option<&str>; 3]; 6] = [
            [Some("NYC"), Some("LOS"), Some("NYC")],
            [Some("NY"), None, Some("NY")],
            [Some("F"), Some("M"), Some("F")],
            [Some("AA"), Some("QF"), Some("AA")],
            [Some("00100"), Some("00011"), Some("00100")],
            [Some("B2"), Some("WT"), Some("B2")],
        ];
        for (name, values) in TEXT_COLUMNS.iter().zip(texts) {
            fields.push(Field::new(*name, DataType::Utf8, true));
            columns.push(Arc::new(StringArray::from(values.to_vec())));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[tokio::test]
    async fn test_decodes_dates_from_parquet_extract() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("i94_apr16_sub.parquet");
        write_extract(&source);
        let session = EtlSession::local().unwrap();

        let raw = session.read_parquet(source.to_str().unwrap()).await.unwrap();
        assert_eq!(missing_departures(&raw).await.unwrap(), 1);

        let table = ImmigrationTable::new(source.to_str().unwrap(), SourceFormat::Parquet);
        let df = table.build(&session).await.unwrap();
        crate::schema::validate_schema(table.name(), df.schema(), table.schema()).unwrap();
        let batches = collect(df).await;

        assert_eq!(column_values(&batches, "immi_id"), strings(&["1", "2"]));
        assert_eq!(column_values(&batches, "residency"), strings(&["101", "438"]));
        assert_eq!(
            column_values(&batches, "arrival_date"),
            strings(&["2016-04-01", "2016-04-02"])
        );
        // the missing departure maps to the epoch
        assert_eq!(
            column_values(&batches, "departure_date"),
            strings(&["2016-04-06", "1960-01-01"])
        );
        assert_eq!(
            column_values(&batches, "arrival_state"),
            vec![Some("NY".to_string()), None]
        );
        assert_eq!(column_values(&batches, "flight_number"), strings(&["00100", "00011"]));
        assert_eq!(column_values(&batches, "birth_year"), strings(&["1986", "1971"]));
    }

    #[tokio::test]
    async fn test_reads_csv_extract() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(
            dir.path(),
            "immigration.csv",
            "\
cicid,i94yr,i94mon,i94res,i94port,arrdate,i94mode,i94addr,depdate,i94bir,i94visa,biryear,gender,airline,fltno,visatype
5748517.0,2016.0,4.0,245.0,LOS,20574.0,1.0,CA,20582.0,40.0,1.0,1976.0,F,QF,00011,B1
5748518.0,2016.0,4.0,245.0,LOS,20574.0,1.0,NV,,32.0,1.0,1984.0,F,VA,00007,B1
",
        );
        let session = EtlSession::local().unwrap();

        let raw = session.read_csv(source.to_str().unwrap(), b',').await.unwrap();
        assert_eq!(missing_departures(&raw).await.unwrap(), 1);

        let table = ImmigrationTable::new(source.to_str().unwrap(), SourceFormat::Csv);
        let batches = collect(table.build(&session).await.unwrap()).await;

        assert_eq!(column_values(&batches, "immi_id"), strings(&["5748517", "5748518"]));
        assert_eq!(
            column_values(&batches, "departure_date"),
            strings(&["2016-05-08", "1960-01-01"])
        );
        assert_eq!(column_values(&batches, "arrival_state"), strings(&["CA", "NV"]));
        // codes stay text, leading zeros included
        assert_eq!(column_values(&batches, "flight_number"), strings(&["00011", "00007"]));
    }
}
