//! Result presentation helpers shared by the REST API and the CLI.

use crate::engine::{CkdStage, EgfrEstimate};
use chrono::{DateTime, NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::fmt;

/// Subject line of an emailed result.
pub const EMAIL_SUBJECT: &str = "Your eGFR Calculator Results";

/// Bytes kept literal in a `mailto:` header value; the set URI components leave unreserved.
const MAILTO_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Highlight level for a result row in a batch listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    None,
    Moderate,
    Severe,
    Critical,
}

impl RiskBand {
    /// Below 15 is critical, below 30 severe, below 45 moderate.
    pub fn for_value(egfr: f64) -> Self {
        if egfr < 15.0 {
            RiskBand::Critical
        } else if egfr < 30.0 {
            RiskBand::Severe
        } else if egfr < 45.0 {
            RiskBand::Moderate
        } else {
            RiskBand::None
        }
    }

    /// Whether the row should be emphasised.
    pub fn is_flagged(&self) -> bool {
        *self != RiskBand::None
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::None => "none",
            RiskBand::Moderate => "moderate",
            RiskBand::Severe => "severe",
            RiskBand::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Suggested download filename, e.g. `eGFR-Results-2026-10-16.txt`.
pub fn report_filename(date: NaiveDate) -> String {
    format!("eGFR-Results-{}.txt", date.format("%Y-%m-%d"))
}

/// Plain-text summary of one result.
pub fn render_text_report(estimate: &EgfrEstimate, calculated_at: DateTime<Utc>) -> String {
    format!(
        "eGFR Results\n\
         ===========\n\
         Date: {date}\n\
         \n\
         Patient Results:\n\
         - eGFR: {value}mL/min/1.73m²\n\
         - CKD Stage: {stage} ({description})\n\
         - Formula: {formula}\n\
         \n\
         This is an automated result from the eGFR Calculator.\n\
         Please consult with your healthcare provider for interpretation.\n",
        date = calculated_at.format("%Y-%m-%d"),
        value = estimate.value,
        stage = estimate.stage,
        description = estimate.stage.description(),
        formula = estimate.formula,
    )
}

/// `mailto:` link with no recipient whose body is the text report.
pub fn mailto_link(estimate: &EgfrEstimate, calculated_at: DateTime<Utc>) -> String {
    let body = render_text_report(estimate, calculated_at);
    format!(
        "mailto:?subject={}&body={}",
        utf8_percent_encode(EMAIL_SUBJECT, MAILTO_VALUE),
        utf8_percent_encode(body.trim_end(), MAILTO_VALUE)
    )
}

/// One-line legend for a stage, used by listings.
pub fn stage_legend(stage: CkdStage) -> String {
    match stage.lower_bound() {
        Some(bound) => format!("{stage}: eGFR >= {bound} ({})", stage.description()),
        None => format!("{stage}: eGFR < 15 ({})", stage.description()),
    }
}
