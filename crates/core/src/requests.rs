//! Immutable calculation requests.
//!
//! Each request is built once from a form or API body, evaluated, and dropped. Required fields
//! are `Option`s so that a missing value is reported as insufficient input rather than rejected
//! by the decoder.

use crate::engine::{self, EgfrEstimate};
use crate::measurement::{
    Creatinine, CreatinineUnit, Ethnicity, Gender, MeasurementInput, MeasurementRecord,
};
use crate::{loose, EgfrError, EgfrResult};
use serde::Deserialize;

/// The adult calculator form.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdultRequest {
    #[serde(default, deserialize_with = "loose::f64_opt")]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub ethnicity: Option<Ethnicity>,
    #[serde(default, deserialize_with = "loose::f64_opt")]
    pub creatinine: Option<f64>,
    #[serde(default)]
    pub creatinine_unit: CreatinineUnit,
}

/// The pediatric calculator form. Age is not asked for.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PediatricRequest {
    #[serde(default, deserialize_with = "loose::f64_opt")]
    pub height_cm: Option<f64>,
    #[serde(default, deserialize_with = "loose::f64_opt")]
    pub creatinine: Option<f64>,
    #[serde(default)]
    pub creatinine_unit: CreatinineUnit,
}

/// Any calculation, tagged by which formula the caller asked for.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "formula", rename_all = "lowercase")]
pub enum CalculationRequest {
    Adult(AdultRequest),
    Pediatric(PediatricRequest),
    /// Formula chosen from the patient's age.
    Auto(MeasurementInput),
}

/// A computed estimate plus the measurement fields that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub estimate: EgfrEstimate,
    pub measurement: MeasurementRecord,
}

impl AdultRequest {
    /// # Errors
    ///
    /// [`EgfrError::InsufficientInput`] for a missing age or creatinine,
    /// [`EgfrError::PediatricFormulaRequired`] for a patient under 18.
    pub fn evaluate(&self) -> EgfrResult<Evaluation> {
        let measurement = MeasurementInput {
            age: self.age,
            gender: self.gender,
            ethnicity: self.ethnicity,
            creatinine: self.creatinine,
            creatinine_unit: self.creatinine_unit,
            height_cm: None,
        }
        .into_measurement()?;

        let estimate = engine::calculate_adult(&measurement)?;
        Ok(Evaluation {
            estimate,
            measurement: measurement.record(),
        })
    }
}

impl PediatricRequest {
    /// # Errors
    ///
    /// [`EgfrError::InsufficientInput`] for a missing height or creatinine.
    pub fn evaluate(&self) -> EgfrResult<Evaluation> {
        let height = self
            .height_cm
            .ok_or(EgfrError::InsufficientInput { field: "height" })?;
        let creatinine = self
            .creatinine
            .ok_or(EgfrError::InsufficientInput {
                field: "creatinine",
            })?;
        let creatinine = Creatinine::new(creatinine, self.creatinine_unit)?;

        let estimate = engine::calculate_pediatric(height, creatinine.mg_per_dl())?;
        Ok(Evaluation {
            estimate,
            measurement: MeasurementRecord {
                age: None,
                gender: None,
                ethnicity: None,
                creatinine_umol_per_l: creatinine.umol_per_l(),
                height_cm: Some(height),
            },
        })
    }
}

impl CalculationRequest {
    pub fn evaluate(&self) -> EgfrResult<Evaluation> {
        match self {
            CalculationRequest::Adult(req) => req.evaluate(),
            CalculationRequest::Pediatric(req) => req.evaluate(),
            CalculationRequest::Auto(input) => {
                let measurement = input.into_measurement()?;
                let estimate = engine::calculate(&measurement)?;
                Ok(Evaluation {
                    estimate,
                    measurement: measurement.record(),
                })
            }
        }
    }
}
