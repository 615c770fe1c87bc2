//! JSON bodies of the REST API.
//!
//! Response types are built from core types with `From` conversions. Calculation request bodies
//! are decoded straight into the core request types, which treat a non-numeric value in a
//! numeric field as missing; the `*Req` structs here describe those bodies for OpenAPI.

use egfr_core::dashboard::{Dashboard, RecentPatient};
use egfr_core::ingest::SkippedRow;
use egfr_core::report::RiskBand;
use egfr_core::requests::CalculationRequest;
use egfr_core::{CkdStage, EgfrEstimate, ResultSummary, StoredResult, UserAccount};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of `POST /egfr/adult`.
#[derive(Debug, ToSchema)]
pub struct AdultReq {
    /// Years; must be 18 or over.
    pub age: Option<f64>,
    /// `male`, `female` or `other`.
    pub gender: Option<String>,
    /// `black`, `white`, `asian` or `other`.
    pub ethnicity: Option<String>,
    pub creatinine: Option<f64>,
    /// `umol/L` (default) or `mg/dL`.
    pub creatinine_unit: Option<String>,
}

/// Body of `POST /egfr/pediatric`.
#[derive(Debug, ToSchema)]
pub struct PediatricReq {
    pub height_cm: Option<f64>,
    pub creatinine: Option<f64>,
    /// `umol/L` (default) or `mg/dL`.
    pub creatinine_unit: Option<String>,
}

/// Body of `POST /egfr`; the formula is chosen from the age.
#[derive(Debug, ToSchema)]
pub struct AutoReq {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub creatinine: Option<f64>,
    pub creatinine_unit: Option<String>,
    /// Required under 18.
    pub height_cm: Option<f64>,
}

/// Body of `POST /users/{id}/results`: the fields of an adult, pediatric or auto calculation
/// tagged by `formula`, plus an optional external patient reference.
#[derive(Debug, Deserialize)]
pub struct SaveResultReq {
    #[serde(flatten)]
    pub calculation: CalculationRequest,
    #[serde(default)]
    pub patient_ref: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EstimateRes {
    /// mL/min/1.73m², one decimal place.
    pub egfr: f64,
    pub stage: String,
    pub stage_description: String,
    pub formula: String,
    pub risk: String,
    pub flagged: bool,
}

impl From<EgfrEstimate> for EstimateRes {
    fn from(estimate: EgfrEstimate) -> Self {
        let risk = RiskBand::for_value(estimate.value);
        Self {
            egfr: estimate.value,
            stage: estimate.stage.to_string(),
            stage_description: estimate.stage.description().into(),
            formula: estimate.formula.to_string(),
            risk: risk.to_string(),
            flagged: risk.is_flagged(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StageRes {
    pub egfr: f64,
    pub stage: String,
    pub description: String,
}

impl StageRes {
    pub fn new(egfr: f64, stage: CkdStage) -> Self {
        Self {
            egfr,
            stage: stage.to_string(),
            description: stage.description().into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterReq {
    /// NHS number for patients, HCP ID for clinicians.
    pub identifier: String,
    /// `patient` or `clinician`.
    pub role: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountRes {
    pub id: String,
    pub identifier: String,
    pub role: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: String,
}

impl From<&UserAccount> for AccountRes {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id.to_string(),
            identifier: account.identifier.to_string(),
            role: account.role.to_string(),
            display_name: account.display_name(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListUsersRes {
    pub users: Vec<AccountRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResultRes {
    pub id: String,
    pub egfr: f64,
    pub stage: String,
    pub formula: String,
    pub created_at: String,
    pub patient_ref: Option<String>,
}

impl From<&ResultSummary> for ResultRes {
    fn from(summary: &ResultSummary) -> Self {
        Self {
            id: summary.id.to_string(),
            egfr: summary.value,
            stage: summary.stage.to_string(),
            formula: summary.formula.to_string(),
            created_at: summary.created_at.to_rfc3339(),
            patient_ref: summary.patient_ref.clone(),
        }
    }
}

impl From<&StoredResult> for ResultRes {
    fn from(record: &StoredResult) -> Self {
        Self::from(&ResultSummary::from(record))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListResultsRes {
    pub results: Vec<ResultRes>,
}

/// A saved result ready to be sent by email.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailRes {
    pub subject: String,
    pub body: String,
    /// `mailto:` link with the subject and body percent-encoded and no recipient.
    pub mailto: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RecentPatientRes {
    pub label: String,
    pub result_id: String,
    pub patient_ref: Option<String>,
    pub last_calculated: String,
    pub egfr: f64,
    pub stage: String,
    pub risk: String,
}

impl From<&RecentPatient> for RecentPatientRes {
    fn from(row: &RecentPatient) -> Self {
        Self {
            label: row.label.clone(),
            result_id: row.result_id.to_string(),
            patient_ref: row.patient_ref.clone(),
            last_calculated: row.last_calculated.to_rfc3339(),
            egfr: row.egfr,
            stage: row.stage.to_string(),
            risk: row.risk.to_string(),
        }
    }
}

/// Patients get `latest`; clinicians get `recent`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardRes {
    pub role: String,
    pub account: AccountRes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<ResultRes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent: Option<Vec<RecentPatientRes>>,
}

impl From<&Dashboard> for DashboardRes {
    fn from(dashboard: &Dashboard) -> Self {
        let account = AccountRes::from(dashboard.account());
        match dashboard {
            Dashboard::Patient { latest, .. } => Self {
                role: account.role.clone(),
                account,
                latest: latest.as_ref().map(ResultRes::from),
                recent: None,
            },
            Dashboard::Clinician { recent, .. } => Self {
                role: account.role.clone(),
                account,
                latest: None,
                recent: Some(recent.iter().map(RecentPatientRes::from).collect()),
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchRowRes {
    /// 1-based line in the uploaded file.
    pub line: u64,
    pub patient_id: String,
    pub result_id: String,
    pub egfr: f64,
    pub stage: String,
    pub formula: String,
    pub risk: String,
    pub flagged: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SkippedRowRes {
    pub line: u64,
    pub reason: String,
}

impl From<&SkippedRow> for SkippedRowRes {
    fn from(row: &SkippedRow) -> Self {
        Self {
            line: row.line,
            reason: row.rejection.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchRes {
    pub results: Vec<BatchRowRes>,
    pub skipped: Vec<SkippedRowRes>,
    pub skipped_count: usize,
}
