//! Saved eGFR results.
//!
//! Each result is one immutable JSON file in the owning account's `results/` directory, named
//! by its canonical id. Listing reads every file and orders newest first by `created_at`, with
//! the id as a tie-breaker so the order is stable.

use crate::constants::RESULTS_DIR_NAME;
use crate::engine::{classify_ckd_stage, CkdStage, EgfrEstimate, Formula};
use crate::error::{EgfrError, EgfrResult};
use crate::measurement::MeasurementRecord;
use crate::repositories::helpers::{read_json, write_new_json};
use crate::requests::Evaluation;
use crate::ShardableUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A persisted result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: ShardableUuid,
    pub value: f64,
    /// Stage as written at save time. Older records may lack it; use [`StoredResult::stage`].
    #[serde(rename = "stage", default)]
    pub stored_stage: Option<CkdStage>,
    pub formula: Formula,
    pub created_at: DateTime<Utc>,
    /// External patient reference, e.g. the `PatientID` column of an uploaded CSV.
    #[serde(default)]
    pub patient_ref: Option<String>,
    pub measurement: MeasurementRecord,
}

impl StoredResult {
    /// The stored stage, or the stage recomputed from the value if none was stored.
    pub fn stage(&self) -> CkdStage {
        self.stored_stage
            .unwrap_or_else(|| classify_ckd_stage(self.value))
    }

    pub fn estimate(&self) -> EgfrEstimate {
        EgfrEstimate {
            value: self.value,
            stage: self.stage(),
            formula: self.formula,
        }
    }
}

/// A stored result with its stage resolved, as shown to users.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultSummary {
    pub id: ShardableUuid,
    pub value: f64,
    pub stage: CkdStage,
    pub formula: Formula,
    pub created_at: DateTime<Utc>,
    pub patient_ref: Option<String>,
}

impl From<&StoredResult> for ResultSummary {
    fn from(record: &StoredResult) -> Self {
        Self {
            id: record.id.clone(),
            value: record.value,
            stage: record.stage(),
            formula: record.formula,
            created_at: record.created_at,
            patient_ref: record.patient_ref.clone(),
        }
    }
}

/// Result storage for one account.
///
/// Obtain one from [`crate::AccountService::results`], which guarantees the account exists.
#[derive(Clone, Debug)]
pub struct ResultsService {
    results_dir: PathBuf,
}

impl ResultsService {
    pub(crate) fn new(account_dir: PathBuf) -> Self {
        Self {
            results_dir: account_dir.join(RESULTS_DIR_NAME),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Persists an evaluation and returns the stored record.
    ///
    /// # Arguments
    ///
    /// * `evaluation` - The estimate and the measurement fields that produced it
    /// * `patient_ref` - Optional external patient reference
    ///
    /// # Errors
    ///
    /// Returns a storage error (see [`EgfrError::is_storage_unavailable`]) if the directory or
    /// the record file cannot be written. Nothing is retried.
    pub fn save(
        &self,
        evaluation: &Evaluation,
        patient_ref: Option<String>,
    ) -> EgfrResult<StoredResult> {
        fs::create_dir_all(&self.results_dir).map_err(EgfrError::StorageDirCreation)?;

        let record = StoredResult {
            id: ShardableUuid::new(),
            value: evaluation.estimate.value,
            stored_stage: Some(evaluation.estimate.stage),
            formula: evaluation.estimate.formula,
            created_at: Utc::now(),
            patient_ref,
            measurement: evaluation.measurement.clone(),
        };

        write_new_json(&self.record_path(&record.id), &record)?;
        tracing::debug!(result_id = %record.id, value = record.value, "saved result");
        Ok(record)
    }

    /// The `limit` newest results, newest first.
    ///
    /// Unreadable files are logged and skipped.
    pub fn recent(&self, limit: usize) -> EgfrResult<Vec<StoredResult>> {
        let mut records = self.load_all()?;
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.to_string().cmp(&a.id.to_string()))
        });
        records.truncate(limit);
        Ok(records)
    }

    pub fn latest(&self) -> EgfrResult<Option<StoredResult>> {
        Ok(self.recent(1)?.into_iter().next())
    }

    /// Loads one result by id.
    ///
    /// # Errors
    ///
    /// [`EgfrError::InvalidInput`] for a non-canonical id, [`EgfrError::NotFound`] if this
    /// account has no such result.
    pub fn get(&self, result_id: &str) -> EgfrResult<StoredResult> {
        let id = ShardableUuid::parse(result_id)?;
        let path = self.record_path(&id);
        if !path.is_file() {
            return Err(EgfrError::NotFound(format!("result {id}")));
        }
        read_json(&path)
    }

    fn record_path(&self, id: &ShardableUuid) -> PathBuf {
        self.results_dir.join(format!("{id}.json"))
    }

    fn load_all(&self) -> EgfrResult<Vec<StoredResult>> {
        let entries = match fs::read_dir(&self.results_dir) {
            Ok(it) => it,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EgfrError::FileRead(e)),
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<StoredResult>(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("failed to parse result {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::PediatricRequest;
    use tempfile::TempDir;

    fn evaluation(value: f64) -> Evaluation {
        Evaluation {
            estimate: EgfrEstimate {
                value,
                stage: classify_ckd_stage(value),
                formula: Formula::Adult,
            },
            measurement: MeasurementRecord {
                age: Some(50.0),
                gender: None,
                ethnicity: None,
                creatinine_umol_per_l: 90.0,
                height_cm: None,
            },
        }
    }

    #[test]
    fn test_save_writes_record_and_get_reads_it() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = ResultsService::new(temp_dir.path().to_path_buf());

        let saved = service
            .save(&evaluation(72.4), Some("P001".into()))
            .expect("save should succeed");
        assert_eq!(saved.stage(), CkdStage::Stage2);
        assert!(service
            .results_dir()
            .join(format!("{}.json", saved.id))
            .is_file());

        let loaded = service.get(&saved.id.to_string()).unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.patient_ref.as_deref(), Some("P001"));
    }

    #[test]
    fn test_recent_orders_newest_first_and_limits() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = ResultsService::new(temp_dir.path().to_path_buf());

        let values = [95.0, 61.0, 40.0, 22.0, 12.0, 88.0];
        for value in values {
            service.save(&evaluation(value), None).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let recent = service.recent(5).unwrap();
        let got: Vec<f64> = recent.iter().map(|r| r.value).collect();
        assert_eq!(got, [88.0, 12.0, 22.0, 40.0, 61.0]);

        assert_eq!(service.latest().unwrap().unwrap().value, 88.0);
    }

    #[test]
    fn test_empty_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = ResultsService::new(temp_dir.path().join("nobody"));
        assert!(service.recent(5).unwrap().is_empty());
        assert!(service.latest().unwrap().is_none());
    }

    #[test]
    fn test_get_unknown_and_malformed_ids() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = ResultsService::new(temp_dir.path().to_path_buf());
        assert!(matches!(
            service.get("0123456789abcdef0123456789abcdef"),
            Err(EgfrError::NotFound(_))
        ));
        assert!(matches!(
            service.get("../../etc/passwd"),
            Err(EgfrError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stage_is_recomputed_when_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = ResultsService::new(temp_dir.path().to_path_buf());
        fs::create_dir_all(service.results_dir()).unwrap();

        let id = "00000000000000000000000000000001";
        let legacy = serde_json::json!({
            "id": id,
            "value": 27.5,
            "formula": "adult",
            "created_at": "2025-01-01T00:00:00Z",
            "measurement": {"creatinine_umol_per_l": 300.0}
        });
        fs::write(
            service.results_dir().join(format!("{id}.json")),
            legacy.to_string(),
        )
        .unwrap();

        let record = service.get(id).unwrap();
        assert_eq!(record.stored_stage, None);
        assert_eq!(record.stage(), CkdStage::Stage4);
    }

    #[test]
    fn test_pediatric_measurement_is_persisted() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = ResultsService::new(temp_dir.path().to_path_buf());

        let eval = PediatricRequest {
            height_cm: Some(120.0),
            creatinine: Some(44.2),
            ..Default::default()
        }
        .evaluate()
        .unwrap();
        let saved = service.save(&eval, None).unwrap();
        let loaded = service.get(&saved.id.to_string()).unwrap();
        assert_eq!(loaded.formula, Formula::Pediatric);
        assert_eq!(loaded.measurement.height_cm, Some(120.0));
        assert_eq!(loaded.value, 99.1);
    }
}
