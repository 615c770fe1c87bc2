//! Bulk CSV ingestion.
//!
//! An uploaded file has a header row naming the columns `PatientID`, `Gender` (1 = male,
//! 0 = female), `Ethnicity` (`B` black, `W` white, `A` asian, anything else other), `Age`,
//! `Creatinine` (µmol/L) and optionally `Height` (cm). Column order is free and unknown columns
//! are ignored.
//!
//! A `Gender` code other than 0 or 1 rejects the row rather than defaulting to female, so a
//! miscoded sex never silently changes an adult estimate.
//!
//! Ingestion is two steps. [`parse_csv`] turns the file into loosely-typed [`RawRow`]s, failing
//! only if the file itself is unreadable. [`run_batch`] then validates every row independently,
//! computes the accepted ones and reports the rejected ones with a reason. Output keeps input
//! order.

use crate::constants::MAX_BATCH_AGE;
use crate::engine::{self, EgfrEstimate};
use crate::measurement::{
    Creatinine, CreatinineUnit, Ethnicity, Gender, MeasurementRecord, PatientMeasurement,
};
use crate::{loose, EgfrResult};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// One data row as it appears in the file, before validation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawRow {
    #[serde(rename = "PatientID", default, deserialize_with = "loose::string_opt")]
    pub patient_id: Option<String>,
    #[serde(rename = "Gender", default, deserialize_with = "loose::f64_opt")]
    pub gender: Option<f64>,
    #[serde(rename = "Ethnicity", default, deserialize_with = "loose::string_opt")]
    pub ethnicity: Option<String>,
    #[serde(rename = "Age", default, deserialize_with = "loose::f64_opt")]
    pub age: Option<f64>,
    #[serde(rename = "Creatinine", default, deserialize_with = "loose::f64_opt")]
    pub creatinine: Option<f64>,
    #[serde(rename = "Height", default, deserialize_with = "loose::f64_opt")]
    pub height: Option<f64>,
}

/// A raw row tagged with its line number in the source file.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedRow {
    pub line: u64,
    pub row: RawRow,
}

/// Why a row was left out of the batch.
#[derive(Clone, Debug, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RowRejection {
    #[error("missing {field}")]
    MissingField { field: &'static str },
    #[error("gender code {code} is not 0 or 1")]
    UnknownGenderCode { code: f64 },
    #[error("age {age} is outside 0 to 110")]
    AgeOutOfRange { age: f64 },
    #[error("creatinine {creatinine} is not positive")]
    NonPositiveCreatinine { creatinine: f64 },
    #[error("patients under 18 need a height")]
    MissingHeight,
    #[error("height {height} is not positive")]
    InvalidHeight { height: f64 },
    #[error("{message}")]
    Calculation { message: String },
}

/// A validated row ready for calculation.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchCandidate {
    pub patient_id: String,
    pub measurement: PatientMeasurement,
}

/// A computed row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchEntry {
    pub line: u64,
    pub patient_id: String,
    pub measurement: MeasurementRecord,
    pub estimate: EgfrEstimate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedRow {
    pub line: u64,
    #[serde(flatten)]
    pub rejection: RowRejection,
}

/// Result of running a batch: accepted rows in input order plus every rejection.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub entries: Vec<BatchEntry>,
    pub skipped: Vec<SkippedRow>,
}

impl BatchOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Reads every data row of a CSV file.
///
/// Fields are trimmed. Short rows are padded with blank cells and cells past the last header are
/// dropped, so a ragged row is judged by [`validate_row`] like any other.
///
/// # Errors
///
/// Returns [`crate::EgfrError::Csv`] if the file cannot be read as CSV (invalid UTF-8, I/O
/// failure).
pub fn parse_csv<R: Read>(reader: R) -> EgfrResult<Vec<ParsedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let mut record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);
        record.truncate(headers.len());
        while record.len() < headers.len() {
            record.push_field("");
        }
        let row: RawRow = record.deserialize(Some(&headers))?;
        rows.push(ParsedRow { line, row });
    }
    Ok(rows)
}

fn gender_from_code(code: f64) -> Result<Gender, RowRejection> {
    if code == 1.0 {
        Ok(Gender::Male)
    } else if code == 0.0 {
        Ok(Gender::Female)
    } else {
        Err(RowRejection::UnknownGenderCode { code })
    }
}

fn ethnicity_from_code(code: &str) -> Ethnicity {
    match code.trim().to_ascii_uppercase().as_str() {
        "B" | "BLACK" => Ethnicity::Black,
        "W" | "WHITE" => Ethnicity::White,
        "A" | "ASIAN" => Ethnicity::Asian,
        _ => Ethnicity::Other,
    }
}

/// Checks one row and builds its measurement.
///
/// # Errors
///
/// Returns the first [`RowRejection`] that applies: a missing required column, an unknown gender
/// code, age outside [0, 110], non-positive creatinine, or a patient under 18 with no usable
/// height.
pub fn validate_row(row: &RawRow) -> Result<BatchCandidate, RowRejection> {
    let patient_id = row
        .patient_id
        .clone()
        .ok_or(RowRejection::MissingField { field: "PatientID" })?;
    let gender_code = row
        .gender
        .ok_or(RowRejection::MissingField { field: "Gender" })?;
    let ethnicity = row
        .ethnicity
        .as_deref()
        .ok_or(RowRejection::MissingField { field: "Ethnicity" })?;
    let age = row.age.ok_or(RowRejection::MissingField { field: "Age" })?;
    let creatinine = row
        .creatinine
        .ok_or(RowRejection::MissingField {
            field: "Creatinine",
        })?;

    let gender = gender_from_code(gender_code)?;
    if !(0.0..=MAX_BATCH_AGE).contains(&age) {
        return Err(RowRejection::AgeOutOfRange { age });
    }
    if creatinine <= 0.0 {
        return Err(RowRejection::NonPositiveCreatinine { creatinine });
    }
    if let Some(height) = row.height {
        if height <= 0.0 {
            return Err(RowRejection::InvalidHeight { height });
        }
    }
    if engine::select_formula(age) == engine::Formula::Pediatric && row.height.is_none() {
        return Err(RowRejection::MissingHeight);
    }

    let calculation = |e: crate::EgfrError| RowRejection::Calculation {
        message: e.to_string(),
    };
    let creatinine =
        Creatinine::new(creatinine, CreatinineUnit::MicromolPerLitre).map_err(calculation)?;
    let measurement = PatientMeasurement::new(age, creatinine)
        .map_err(calculation)?
        .with_gender(Some(gender))
        .with_ethnicity(Some(ethnicity_from_code(ethnicity)))
        .with_height(row.height)
        .map_err(calculation)?;

    Ok(BatchCandidate {
        patient_id,
        measurement,
    })
}

/// Validates and computes every row independently, preserving input order.
pub fn run_batch<I>(rows: I) -> BatchOutcome
where
    I: IntoIterator<Item = ParsedRow>,
{
    let mut outcome = BatchOutcome::default();

    for ParsedRow { line, row } in rows {
        let computed = validate_row(&row).and_then(|candidate| {
            engine::calculate(&candidate.measurement)
                .map(|estimate| BatchEntry {
                    line,
                    patient_id: candidate.patient_id,
                    measurement: candidate.measurement.record(),
                    estimate,
                })
                .map_err(|e| RowRejection::Calculation {
                    message: e.to_string(),
                })
        });

        match computed {
            Ok(entry) => outcome.entries.push(entry),
            Err(rejection) => {
                tracing::debug!(line, %rejection, "skipping CSV row");
                outcome.skipped.push(SkippedRow { line, rejection });
            }
        }
    }

    outcome
}

/// [`parse_csv`] followed by [`run_batch`].
pub fn ingest_csv<R: Read>(reader: R) -> EgfrResult<BatchOutcome> {
    Ok(run_batch(parse_csv(reader)?))
}
