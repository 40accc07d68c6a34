use arrow::datatypes::{DataType, Field, Schema};
use common::{Error, Result};
use datafusion::common::DFSchema;
use lazy_static::lazy_static;

pub fn airport_schema() -> Schema {
    Schema::new(vec![
        Field::new("airport_id", DataType::Utf8, true),
        Field::new("airport_name", DataType::Utf8, true),
        Field::new("airport_type", DataType::Utf8, true),
        Field::new("region", DataType::Utf8, true),
        Field::new("municipality", DataType::Utf8, true),
        Field::new("coordinate_x", DataType::Float64, true),
        Field::new("coordinate_y", DataType::Float64, true),
    ])
}

pub fn country_schema() -> Schema {
    Schema::new(vec![
        Field::new("country_name", DataType::Utf8, true),
        Field::new("country_code", DataType::Utf8, true),
    ])
}

pub fn region_schema() -> Schema {
    Schema::new(vec![
        Field::new("state_name", DataType::Utf8, true),
        Field::new("state_code", DataType::Utf8, true),
        Field::new("country_code", DataType::Utf8, true),
        Field::new("country_state", DataType::Utf8, true),
    ])
}

pub fn demographics_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("city_name", DataType::Utf8, true),
        Field::new("state_code", DataType::Utf8, true),
        Field::new("median_age", DataType::Float64, true),
        Field::new("male_population", DataType::Float64, true),
        Field::new("female_population", DataType::Float64, true),
        Field::new("total_population", DataType::Float64, true),
        Field::new("foreign_born", DataType::Float64, true),
        Field::new("avg_household_size", DataType::Float64, true),
        Field::new("race", DataType::Utf8, true),
        Field::new("race_population", DataType::Float64, true),
    ])
}

pub fn immigration_schema() -> Schema {
    Schema::new(vec![
        Field::new("immi_id", DataType::Int64, true),
        Field::new("residency", DataType::Int64, true),
        Field::new("entry_port", DataType::Utf8, true),
        Field::new("arrival_date", DataType::Date32, true),
        Field::new("transportation", DataType::Int64, true),
        Field::new("arrival_state", DataType::Utf8, true),
        Field::new("departure_date", DataType::Date32, true),
        Field::new("age", DataType::Int64, true),
        Field::new("travel_purpose", DataType::Int64, true),
        Field::new("birth_year", DataType::Int64, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("airline", DataType::Utf8, true),
        Field::new("flight_number", DataType::Utf8, true),
        Field::new("visa_type", DataType::Utf8, true),
    ])
}

pub fn date_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ])
}

lazy_static! {
    pub static ref AIRPORT_SCHEMA: Schema = airport_schema();
    pub static ref COUNTRY_SCHEMA: Schema = country_schema();
    pub static ref REGION_SCHEMA: Schema = region_schema();
    pub static ref DEMOGRAPHICS_SCHEMA: Schema = demographics_schema();
    pub static ref IMMIGRATION_SCHEMA: Schema = immigration_schema();
    pub static ref DATE_SCHEMA: Schema = date_schema();
}

/// Checks that a built table has exactly the declared columns, in order.
///
/// String columns may come back as `Utf8View` from Parquet sources, so the
/// string encodings are treated as interchangeable. Nullability is not compared.
pub fn validate_schema(table: &str, actual: &DFSchema, expected: &Schema) -> Result<()> {
    if actual.fields().len() != expected.fields().len() {
        return Err(Error::SchemaMismatch(format!(
            "{}: expected {} columns, found {}",
            table,
            expected.fields().len(),
            actual.fields().len()
        )));
    }

    for (expected_field, actual_field) in expected.fields().iter().zip(actual.fields().iter()) {
        if expected_field.name() != actual_field.name() {
            return Err(Error::SchemaMismatch(format!(
                "{}: field name mismatch. Expected: {}, Found: {}",
                table,
                expected_field.name(),
                actual_field.name()
            )));
        }

        if !types_compatible(expected_field.data_type(), actual_field.data_type()) {
            return Err(Error::SchemaMismatch(format!(
                "{}: type mismatch for field {}. Expected: {:?}, Found: {:?}",
                table,
                expected_field.name(),
                expected_field.data_type(),
                actual_field.data_type()
            )));
        }
    }

    Ok(())
}

fn is_string(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Utf8 | DataType::Utf8View | DataType::LargeUtf8)
}

fn types_compatible(expected: &DataType, actual: &DataType) -> bool {
    expected == actual || (is_string(expected) && is_string(actual))
}
