//! eGFR estimation and CKD staging.
//!
//! Pure, synchronous functions: no I/O, no shared state, safe to call from any thread. Every
//! value returned is rounded to one decimal place with [`round_one_decimal`].
//!
//! - Adult (age 18 and over): `186 × (creatinine_µmol/L / 88.4)^-1.154 × age^-0.203`, × 0.742
//!   for female patients, × 1.21 for black patients.
//! - Pediatric (under 18): `0.413 × height_cm / creatinine_mg/dL`.

use crate::measurement::{
    require_positive, Ethnicity, Gender, PatientMeasurement, CREATININE_UMOL_PER_MG_DL,
};
use crate::{EgfrError, EgfrResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const ADULT_COEFFICIENT: f64 = 186.0;
const ADULT_CREATININE_EXPONENT: f64 = -1.154;
const ADULT_AGE_EXPONENT: f64 = -0.203;
const FEMALE_FACTOR: f64 = 0.742;
const BLACK_ETHNICITY_FACTOR: f64 = 1.21;
const PEDIATRIC_K: f64 = 0.413;

/// Patients younger than this use the pediatric formula.
pub const ADULT_AGE_YEARS: f64 = 18.0;

/// Which estimator produced a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formula {
    Adult,
    Pediatric,
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Adult => f.write_str("adult"),
            Formula::Pediatric => f.write_str("pediatric"),
        }
    }
}

/// Chronic kidney disease stage, mildest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CkdStage {
    #[serde(rename = "Stage 1")]
    Stage1,
    #[serde(rename = "Stage 2")]
    Stage2,
    #[serde(rename = "Stage 3a")]
    Stage3a,
    #[serde(rename = "Stage 3b")]
    Stage3b,
    #[serde(rename = "Stage 4")]
    Stage4,
    #[serde(rename = "Stage 5")]
    Stage5,
}

impl CkdStage {
    pub const ALL: [CkdStage; 6] = [
        CkdStage::Stage1,
        CkdStage::Stage2,
        CkdStage::Stage3a,
        CkdStage::Stage3b,
        CkdStage::Stage4,
        CkdStage::Stage5,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CkdStage::Stage1 => "Stage 1",
            CkdStage::Stage2 => "Stage 2",
            CkdStage::Stage3a => "Stage 3a",
            CkdStage::Stage3b => "Stage 3b",
            CkdStage::Stage4 => "Stage 4",
            CkdStage::Stage5 => "Stage 5",
        }
    }

    /// KDIGO wording for the GFR category.
    pub fn description(&self) -> &'static str {
        match self {
            CkdStage::Stage1 => "Normal or high",
            CkdStage::Stage2 => "Mildly decreased",
            CkdStage::Stage3a => "Mildly to moderately decreased",
            CkdStage::Stage3b => "Moderately to severely decreased",
            CkdStage::Stage4 => "Severely decreased",
            CkdStage::Stage5 => "Kidney failure",
        }
    }

    /// Inclusive lower eGFR bound of the stage; `None` for Stage 5.
    pub fn lower_bound(&self) -> Option<f64> {
        match self {
            CkdStage::Stage1 => Some(90.0),
            CkdStage::Stage2 => Some(60.0),
            CkdStage::Stage3a => Some(45.0),
            CkdStage::Stage3b => Some(30.0),
            CkdStage::Stage4 => Some(15.0),
            CkdStage::Stage5 => None,
        }
    }
}

impl fmt::Display for CkdStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A computed, rounded and staged eGFR value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EgfrEstimate {
    /// mL/min/1.73m², one decimal place.
    pub value: f64,
    pub stage: CkdStage,
    pub formula: Formula,
}

impl EgfrEstimate {
    fn new(value: f64, formula: Formula) -> Self {
        Self {
            value,
            stage: classify_ckd_stage(value),
            formula,
        }
    }
}

/// Rounds half away from zero to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Adult estimate from creatinine in µmol/L.
///
/// Absent or `other` gender and ethnicity apply no correction.
///
/// # Errors
///
/// [`EgfrError::InsufficientInput`] when `age` or `creatinine_umol_per_l` is not a finite number;
/// [`EgfrError::InvalidInput`] when either is not strictly positive.
pub fn compute_adult_egfr(
    age: f64,
    gender: Option<Gender>,
    ethnicity: Option<Ethnicity>,
    creatinine_umol_per_l: f64,
) -> EgfrResult<f64> {
    let age = require_positive(age, "age")?;
    let creatinine = require_positive(creatinine_umol_per_l, "creatinine")?;
    Ok(round_one_decimal(adult_unrounded(
        age, gender, ethnicity, creatinine,
    )))
}

fn adult_unrounded(
    age: f64,
    gender: Option<Gender>,
    ethnicity: Option<Ethnicity>,
    creatinine_umol_per_l: f64,
) -> f64 {
    let mut egfr = ADULT_COEFFICIENT
        * (creatinine_umol_per_l / CREATININE_UMOL_PER_MG_DL).powf(ADULT_CREATININE_EXPONENT)
        * age.powf(ADULT_AGE_EXPONENT);

    if gender == Some(Gender::Female) {
        egfr *= FEMALE_FACTOR;
    }
    if ethnicity == Some(Ethnicity::Black) {
        egfr *= BLACK_ETHNICITY_FACTOR;
    }
    egfr
}

/// Pediatric estimate from height in cm and creatinine in mg/dL.
///
/// # Errors
///
/// As for [`compute_adult_egfr`], for `height_cm` and `creatinine_mg_per_dl`.
pub fn compute_pediatric_egfr(height_cm: f64, creatinine_mg_per_dl: f64) -> EgfrResult<f64> {
    let height = require_positive(height_cm, "height")?;
    let creatinine = require_positive(creatinine_mg_per_dl, "creatinine")?;
    Ok(round_one_decimal(PEDIATRIC_K * height / creatinine))
}

/// Maps an eGFR value to its CKD stage. Each threshold is an inclusive lower bound; anything
/// below 15, NaN included, is Stage 5.
pub fn classify_ckd_stage(egfr: f64) -> CkdStage {
    if egfr >= 90.0 {
        CkdStage::Stage1
    } else if egfr >= 60.0 {
        CkdStage::Stage2
    } else if egfr >= 45.0 {
        CkdStage::Stage3a
    } else if egfr >= 30.0 {
        CkdStage::Stage3b
    } else if egfr >= 15.0 {
        CkdStage::Stage4
    } else {
        CkdStage::Stage5
    }
}

pub fn select_formula(age: f64) -> Formula {
    if age < ADULT_AGE_YEARS {
        Formula::Pediatric
    } else {
        Formula::Adult
    }
}

/// Selects the formula for the patient's age and computes the staged estimate.
///
/// # Errors
///
/// [`EgfrError::InsufficientInput`] with field `height` for a pediatric patient without a
/// height, or any error of the underlying formula.
pub fn calculate(measurement: &PatientMeasurement) -> EgfrResult<EgfrEstimate> {
    match select_formula(measurement.age()) {
        Formula::Adult => calculate_adult(measurement),
        Formula::Pediatric => {
            let height = measurement
                .height_cm()
                .ok_or(EgfrError::InsufficientInput { field: "height" })?;
            calculate_pediatric(height, measurement.creatinine().mg_per_dl())
        }
    }
}

/// Adult estimate for a measurement, refusing patients under 18.
///
/// # Errors
///
/// [`EgfrError::PediatricFormulaRequired`] if the patient is under 18.
pub fn calculate_adult(measurement: &PatientMeasurement) -> EgfrResult<EgfrEstimate> {
    if select_formula(measurement.age()) == Formula::Pediatric {
        return Err(EgfrError::PediatricFormulaRequired {
            age: measurement.age(),
        });
    }
    let value = compute_adult_egfr(
        measurement.age(),
        measurement.gender(),
        measurement.ethnicity(),
        measurement.creatinine().umol_per_l(),
    )?;
    Ok(EgfrEstimate::new(value, Formula::Adult))
}

/// Pediatric estimate; age only gates the choice of formula and is not an input here.
pub fn calculate_pediatric(height_cm: f64, creatinine_mg_per_dl: f64) -> EgfrResult<EgfrEstimate> {
    let value = compute_pediatric_egfr(height_cm, creatinine_mg_per_dl)?;
    Ok(EgfrEstimate::new(value, Formula::Pediatric))
}
