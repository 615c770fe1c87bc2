//! Role-specific dashboards.
//!
//! A patient sees their own latest result. A clinician sees the most recent results saved to
//! their account (typically from CSV uploads), labelled `Patient 1..N` newest first.

use crate::engine::CkdStage;
use crate::report::RiskBand;
use crate::repositories::accounts::{AccountService, Registered, Role, UserAccount};
use crate::repositories::results::ResultSummary;
use crate::{EgfrResult, ShardableUuid};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the clinician's recent-patients table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecentPatient {
    pub result_id: ShardableUuid,
    /// `Patient N`, numbered from 1 in newest-first order.
    pub label: String,
    pub patient_ref: Option<String>,
    pub last_calculated: DateTime<Utc>,
    pub egfr: f64,
    pub stage: CkdStage,
    pub risk: RiskBand,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Patient {
        account: UserAccount,
        latest: Option<ResultSummary>,
    },
    Clinician {
        account: UserAccount,
        recent: Vec<RecentPatient>,
    },
}

impl Dashboard {
    pub fn account(&self) -> &UserAccount {
        match self {
            Dashboard::Patient { account, .. } | Dashboard::Clinician { account, .. } => account,
        }
    }
}

/// Builds the dashboard for the account's role.
///
/// The clinician list length comes from [`crate::CoreConfig::recent_limit`].
///
/// # Errors
///
/// Returns a storage error if the account's results cannot be listed.
pub fn dashboard_for(account: &AccountService<Registered>) -> EgfrResult<Dashboard> {
    let results = account.results();

    match account.account().role {
        Role::Patient => {
            let latest = results.latest()?;
            Ok(Dashboard::Patient {
                account: account.account().clone(),
                latest: latest.as_ref().map(ResultSummary::from),
            })
        }
        Role::Clinician => {
            let recent = results
                .recent(account.config().recent_limit())?
                .iter()
                .enumerate()
                .map(|(i, record)| RecentPatient {
                    result_id: record.id.clone(),
                    label: format!("Patient {}", i + 1),
                    patient_ref: record.patient_ref.clone(),
                    last_calculated: record.created_at,
                    egfr: record.value,
                    stage: record.stage(),
                    risk: RiskBand::for_value(record.value),
                })
                .collect();
            Ok(Dashboard::Clinician {
                account: account.account().clone(),
                recent,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::AdultRequest;
    use crate::CoreConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn adult(age: f64, creatinine: f64) -> crate::requests::Evaluation {
        AdultRequest {
            age: Some(age),
            creatinine: Some(creatinine),
            ..Default::default()
        }
        .evaluate()
        .unwrap()
    }

    #[test]
    fn test_patient_dashboard_without_results() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = Arc::new(CoreConfig::new(temp_dir.path().to_path_buf(), 5).unwrap());
        let patient = AccountService::new(cfg)
            .register("9434765919", Role::Patient, Some("Ada".into()), None)
            .unwrap();

        match dashboard_for(&patient).unwrap() {
            Dashboard::Patient { account, latest } => {
                assert_eq!(account.display_name(), "Ada");
                assert!(latest.is_none());
            }
            other => panic!("expected patient dashboard, got {other:?}"),
        }
    }

    #[test]
    fn test_patient_dashboard_shows_latest() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = Arc::new(CoreConfig::new(temp_dir.path().to_path_buf(), 5).unwrap());
        let patient = AccountService::new(cfg)
            .register("9434765919", Role::Patient, None, None)
            .unwrap();

        patient.results().save(&adult(40.0, 88.4), None).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let newest = patient.results().save(&adult(25.0, 70.0), None).unwrap();

        let Dashboard::Patient { latest, .. } = dashboard_for(&patient).unwrap() else {
            panic!("expected patient dashboard");
        };
        let latest = latest.unwrap();
        assert_eq!(latest.id, newest.id);
        assert_eq!(latest.stage, CkdStage::Stage1);
    }

    #[test]
    fn test_clinician_dashboard_labels_newest_first_and_limits() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = Arc::new(CoreConfig::new(temp_dir.path().to_path_buf(), 3).unwrap());
        let clinician = AccountService::new(cfg)
            .register("HCP-77", Role::Clinician, None, None)
            .unwrap();

        for (i, creatinine) in [80.0, 150.0, 300.0, 600.0].into_iter().enumerate() {
            let patient_ref = format!("P{i}");
            clinician
                .results()
                .save(&adult(50.0, creatinine), Some(patient_ref))
                .unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }

        let dashboard = dashboard_for(&clinician).unwrap();
        assert_eq!(dashboard.account().identifier.as_str(), "HCP-77");
        let Dashboard::Clinician { recent, .. } = dashboard else {
            panic!("expected clinician dashboard");
        };

        assert_eq!(recent.len(), 3);
        let labels: Vec<&str> = recent.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["Patient 1", "Patient 2", "Patient 3"]);
        let refs: Vec<_> = recent.iter().map(|r| r.patient_ref.as_deref()).collect();
        assert_eq!(refs, [Some("P3"), Some("P2"), Some("P1")]);
        assert_eq!(recent[0].risk, RiskBand::Critical);
    }
}
