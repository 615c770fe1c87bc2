//! Patient measurement types.
//!
//! A [`PatientMeasurement`] is built fresh for every calculation from a loosely-typed
//! [`MeasurementInput`] and is never mutated. Creatinine always carries its unit; see
//! [`Creatinine`].

use crate::{loose, EgfrError, EgfrResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Micromoles per litre of creatinine equivalent to 1 mg/dL.
pub const CREATININE_UMOL_PER_MG_DL: f64 = 88.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = EgfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(EgfrError::InvalidInput(format!("unknown gender '{other}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ethnicity {
    White,
    Black,
    Asian,
    Other,
}

impl Ethnicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ethnicity::White => "white",
            Ethnicity::Black => "black",
            Ethnicity::Asian => "asian",
            Ethnicity::Other => "other",
        }
    }
}

impl fmt::Display for Ethnicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ethnicity {
    type Err = EgfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Ethnicity::White),
            "black" => Ok(Ethnicity::Black),
            "asian" => Ok(Ethnicity::Asian),
            "other" => Ok(Ethnicity::Other),
            other => Err(EgfrError::InvalidInput(format!(
                "unknown ethnicity '{other}'"
            ))),
        }
    }
}

/// Unit a creatinine value was reported in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatinineUnit {
    #[default]
    #[serde(rename = "umol/L", alias = "umol_per_l")]
    MicromolPerLitre,
    #[serde(rename = "mg/dL", alias = "mg_per_dl")]
    MilligramPerDecilitre,
}

impl FromStr for CreatinineUnit {
    type Err = EgfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "umol/l" | "µmol/l" | "umol" => Ok(CreatinineUnit::MicromolPerLitre),
            "mg/dl" | "mg" => Ok(CreatinineUnit::MilligramPerDecilitre),
            other => Err(EgfrError::InvalidInput(format!(
                "unknown creatinine unit '{other}' (expected umol/L or mg/dL)"
            ))),
        }
    }
}

/// A positive serum creatinine concentration.
///
/// Stored internally in µmol/L; the adult formula consumes µmol/L and the pediatric formula
/// consumes mg/dL, so each path asks for the unit it needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Creatinine {
    umol_per_l: f64,
}

impl Creatinine {
    /// # Errors
    ///
    /// [`EgfrError::InsufficientInput`] for a non-finite value, [`EgfrError::InvalidInput`] for
    /// a value that is not strictly positive.
    pub fn new(value: f64, unit: CreatinineUnit) -> EgfrResult<Self> {
        let value = require_positive(value, "creatinine")?;
        let umol_per_l = match unit {
            CreatinineUnit::MicromolPerLitre => value,
            CreatinineUnit::MilligramPerDecilitre => value * CREATININE_UMOL_PER_MG_DL,
        };
        Ok(Self { umol_per_l })
    }

    pub fn umol_per_l(&self) -> f64 {
        self.umol_per_l
    }

    pub fn mg_per_dl(&self) -> f64 {
        self.umol_per_l / CREATININE_UMOL_PER_MG_DL
    }
}

/// Rejects missing/non-finite values as insufficient input and non-positive ones as invalid.
pub(crate) fn require_positive(value: f64, field: &'static str) -> EgfrResult<f64> {
    if !value.is_finite() {
        return Err(EgfrError::InsufficientInput { field });
    }
    if value <= 0.0 {
        return Err(EgfrError::InvalidInput(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(value)
}

/// Validated attributes of one patient at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct PatientMeasurement {
    age: f64,
    gender: Option<Gender>,
    ethnicity: Option<Ethnicity>,
    creatinine: Creatinine,
    height_cm: Option<f64>,
}

impl PatientMeasurement {
    /// # Errors
    ///
    /// [`EgfrError::InsufficientInput`] if `age` is not finite, [`EgfrError::InvalidInput`] if it
    /// is negative.
    pub fn new(age: f64, creatinine: Creatinine) -> EgfrResult<Self> {
        if !age.is_finite() {
            return Err(EgfrError::InsufficientInput { field: "age" });
        }
        if age < 0.0 {
            return Err(EgfrError::InvalidInput("age cannot be negative".into()));
        }
        Ok(Self {
            age,
            gender: None,
            ethnicity: None,
            creatinine,
            height_cm: None,
        })
    }

    pub fn with_gender(self, gender: Option<Gender>) -> Self {
        Self { gender, ..self }
    }

    pub fn with_ethnicity(self, ethnicity: Option<Ethnicity>) -> Self {
        Self { ethnicity, ..self }
    }

    /// # Errors
    ///
    /// Returns an error if `height_cm` is present but not a positive finite number.
    pub fn with_height(self, height_cm: Option<f64>) -> EgfrResult<Self> {
        let height_cm = height_cm
            .map(|h| require_positive(h, "height"))
            .transpose()?;
        Ok(Self { height_cm, ..self })
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender
    }

    pub fn ethnicity(&self) -> Option<Ethnicity> {
        self.ethnicity
    }

    pub fn creatinine(&self) -> Creatinine {
        self.creatinine
    }

    pub fn height_cm(&self) -> Option<f64> {
        self.height_cm
    }

    /// The persisted copy of this measurement.
    pub fn record(&self) -> MeasurementRecord {
        MeasurementRecord {
            age: Some(self.age),
            gender: self.gender,
            ethnicity: self.ethnicity,
            creatinine_umol_per_l: self.creatinine.umol_per_l(),
            height_cm: self.height_cm,
        }
    }
}

/// The measurement fields stored alongside a saved result.
///
/// Fields a formula never asked for (age on the direct pediatric path, for instance) are absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub ethnicity: Option<Ethnicity>,
    pub creatinine_umol_per_l: f64,
    #[serde(default)]
    pub height_cm: Option<f64>,
}

/// Loosely-typed measurement fields as submitted by a form or API client.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MeasurementInput {
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
    #[serde(default, deserialize_with = "loose::f64_opt")]
    pub height_cm: Option<f64>,
}

impl MeasurementInput {
    /// Validates the submitted fields into a [`PatientMeasurement`].
    ///
    /// # Errors
    ///
    /// Returns [`EgfrError::InsufficientInput`] naming the first missing required field (age,
    /// then creatinine), or [`EgfrError::InvalidInput`] for out-of-range values.
    pub fn into_measurement(&self) -> EgfrResult<PatientMeasurement> {
        let age = self
            .age
            .ok_or(EgfrError::InsufficientInput { field: "age" })?;
        let creatinine = self
            .creatinine
            .ok_or(EgfrError::InsufficientInput {
                field: "creatinine",
            })?;
        let creatinine = Creatinine::new(creatinine, self.creatinine_unit)?;

        PatientMeasurement::new(age, creatinine)?
            .with_gender(self.gender)
            .with_ethnicity(self.ethnicity)
            .with_height(self.height_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creatinine_unit_conversion() {
        let from_umol = Creatinine::new(88.4, CreatinineUnit::MicromolPerLitre).unwrap();
        assert!((from_umol.mg_per_dl() - 1.0).abs() < 1e-12);

        let from_mg = Creatinine::new(0.5, CreatinineUnit::MilligramPerDecilitre).unwrap();
        assert!((from_mg.umol_per_l() - 44.2).abs() < 1e-9);
        assert!((from_mg.mg_per_dl() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_creatinine_rejects_non_positive_and_nan() {
        assert!(matches!(
            Creatinine::new(0.0, CreatinineUnit::MicromolPerLitre),
            Err(EgfrError::InvalidInput(_))
        ));
        assert!(matches!(
            Creatinine::new(f64::NAN, CreatinineUnit::MicromolPerLitre),
            Err(EgfrError::InsufficientInput { field: "creatinine" })
        ));
    }

    #[test]
    fn test_input_missing_age_is_insufficient() {
        let input = MeasurementInput {
            creatinine: Some(80.0),
            ..Default::default()
        };
        assert!(matches!(
            input.into_measurement(),
            Err(EgfrError::InsufficientInput { field: "age" })
        ));
    }

    #[test]
    fn test_input_decodes_form_strings() {
        let input: MeasurementInput = serde_json::from_str(
            r#"{"age": "52", "gender": "female", "ethnicity": "asian", "creatinine": "97.2"}"#,
        )
        .unwrap();
        let m = input.into_measurement().unwrap();
        assert_eq!(m.age(), 52.0);
        assert_eq!(m.gender(), Some(Gender::Female));
        assert_eq!(m.ethnicity(), Some(Ethnicity::Asian));
        assert_eq!(m.creatinine().umol_per_l(), 97.2);
        assert_eq!(m.height_cm(), None);
    }

    #[test]
    fn test_input_accepts_mg_per_dl_unit() {
        let input: MeasurementInput = serde_json::from_str(
            r#"{"age": 9, "creatinine": 0.5, "creatinine_unit": "mg/dL", "height_cm": 130}"#,
        )
        .unwrap();
        let m = input.into_measurement().unwrap();
        assert!((m.creatinine().mg_per_dl() - 0.5).abs() < 1e-12);
        assert_eq!(m.height_cm(), Some(130.0));
    }

    #[test]
    fn test_negative_height_is_invalid() {
        let input = MeasurementInput {
            age: Some(10.0),
            creatinine: Some(40.0),
            height_cm: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            input.into_measurement(),
            Err(EgfrError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_categories_case_insensitively() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(" BLACK ".parse::<Ethnicity>().unwrap(), Ethnicity::Black);
        assert!("martian".parse::<Ethnicity>().is_err());
        assert_eq!(
            "mg/dL".parse::<CreatinineUnit>().unwrap(),
            CreatinineUnit::MilligramPerDecilitre
        );
    }
}
