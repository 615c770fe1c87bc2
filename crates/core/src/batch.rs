//! Clinician bulk upload: parse, compute, persist.

use crate::ingest::{self, BatchOutcome};
use crate::repositories::accounts::{AccountService, Registered, Role};
use crate::repositories::results::StoredResult;
use crate::requests::Evaluation;
use crate::EgfrResult;
use std::io::Read;

/// What an upload produced: the batch outcome and the records written for it, in row order.
#[derive(Debug)]
pub struct BatchIngestion {
    pub outcome: BatchOutcome,
    pub saved: Vec<StoredResult>,
}

/// Runs an uploaded CSV through the batch and saves every accepted row to the clinician's
/// account, using the row's `PatientID` as the patient reference.
///
/// # Errors
///
/// Returns `EgfrError` if:
/// - the account is not a clinician ([`crate::EgfrError::Forbidden`]),
/// - the file is not readable CSV ([`crate::EgfrError::Csv`]),
/// - a save fails; rows saved before the failure stay saved.
pub fn ingest_and_save<R: Read>(
    account: &AccountService<Registered>,
    reader: R,
) -> EgfrResult<BatchIngestion> {
    account.require_role(Role::Clinician)?;

    let outcome = ingest::ingest_csv(reader)?;
    let results = account.results();

    let mut saved = Vec::with_capacity(outcome.entries.len());
    for entry in &outcome.entries {
        let evaluation = Evaluation {
            estimate: entry.estimate,
            measurement: entry.measurement.clone(),
        };
        saved.push(results.save(&evaluation, Some(entry.patient_id.clone()))?);
    }

    tracing::info!(
        account_id = %account.account_id(),
        saved = saved.len(),
        skipped = outcome.skipped_count(),
        "ingested CSV upload"
    );

    Ok(BatchIngestion { outcome, saved })
}
