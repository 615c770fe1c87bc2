//! # eGFR Core
//!
//! Core logic for the eGFR calculator service.
//!
//! This crate contains the calculation engine and the data operations around it:
//! - Adult (MDRD) and pediatric (bedside Schwartz) eGFR formulas and CKD staging
//! - Batch CSV ingestion with per-row validation
//! - Account and result storage as sharded JSON files under the configured data directory
//! - Role-specific dashboards and plain-text reports
//!
//! **No API concerns**: HTTP servers, API keys and command-line parsing belong in `api-rest`
//! and `egfr-cli`.

pub mod batch;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod ingest;
mod loose;
pub mod measurement;
pub mod report;
pub mod repositories;
pub mod requests;
pub mod text;
pub mod uuid;

pub use config::CoreConfig;
pub use engine::{CkdStage, EgfrEstimate, Formula};
pub use error::{EgfrError, EgfrResult};
pub use measurement::{CreatinineUnit, Ethnicity, Gender, PatientMeasurement};
pub use repositories::accounts::{AccountService, Registered, Role, Unregistered, UserAccount};
pub use repositories::results::{ResultSummary, ResultsService, StoredResult};
pub use uuid::ShardableUuid;
