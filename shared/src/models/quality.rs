//! Quality control requirements and receipt inspection evaluation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Per-category QC evidence requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcRequirement {
    /// `None` applies to every category without a specific entry
    pub category: Option<String>,
    pub min_photos: u32,
    pub required_checkpoints: Vec<String>,
}

impl QcRequirement {
    pub fn none() -> Self {
        Self {
            category: None,
            min_photos: 0,
            required_checkpoints: Vec::new(),
        }
    }

    /// Combine the requirements of every category in a receipt into the
    /// strictest one: the highest photo minimum and the union of checkpoints.
    pub fn strictest<'a, I>(requirements: I) -> Self
    where
        I: IntoIterator<Item = &'a QcRequirement>,
    {
        let mut min_photos = 0;
        let mut checkpoints = BTreeSet::new();
        for requirement in requirements {
            min_photos = min_photos.max(requirement.min_photos);
            checkpoints.extend(
                requirement
                    .required_checkpoints
                    .iter()
                    .map(|c| normalize_checkpoint(c)),
            );
        }
        Self {
            category: None,
            min_photos,
            required_checkpoints: checkpoints.into_iter().collect(),
        }
    }
}

/// One checklist answer submitted by the inspector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcChecklistEntry {
    pub checkpoint: String,
    pub passed: bool,
    pub notes: Option<String>,
}

/// Photo references and checklist attached to a receipt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcSubmission {
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub checklist: Vec<QcChecklistEntry>,
    pub inspector_notes: Option<String>,
}

impl QcSubmission {
    /// Distinct, non-blank photo references
    pub fn photo_count(&self) -> usize {
        self.photos
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// A single unmet QC requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QcViolation {
    #[error("At least {required} QC photos are required, {provided} provided")]
    InsufficientPhotos { required: u32, provided: u32 },

    #[error("Required checkpoint '{checkpoint}' is missing")]
    MissingCheckpoint { checkpoint: String },

    #[error("Required checkpoint '{checkpoint}' failed")]
    FailedCheckpoint { checkpoint: String },
}

/// Overall inspection outcome stored on the QC record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcResult {
    Passed,
    Conditional,
}

impl QcResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcResult::Passed => "PASSED",
            QcResult::Conditional => "CONDITIONAL",
        }
    }
}

/// Summary of a submission that cleared the QC gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcSummary {
    pub photo_count: u32,
    pub total_checkpoints: u32,
    pub passed_checkpoints: u32,
    /// Percentage of checkpoints passed, 100 when no checklist was submitted
    pub score: Decimal,
    pub failed_optional: Vec<String>,
}

impl QcSummary {
    /// Final result once the per-line acceptance is known
    pub fn result(&self, any_line_rejected: bool) -> QcResult {
        if any_line_rejected || !self.failed_optional.is_empty() {
            QcResult::Conditional
        } else {
            QcResult::Passed
        }
    }
}

fn normalize_checkpoint(checkpoint: &str) -> String {
    checkpoint.trim().to_lowercase()
}

/// Validate a submission against a requirement. Every violation is reported.
pub fn validate_qc(
    requirement: &QcRequirement,
    submission: &QcSubmission,
) -> Result<QcSummary, Vec<QcViolation>> {
    let mut violations = Vec::new();

    let provided = u32::try_from(submission.photo_count()).unwrap_or(u32::MAX);
    if provided < requirement.min_photos {
        violations.push(QcViolation::InsufficientPhotos {
            required: requirement.min_photos,
            provided,
        });
    }

    let required: BTreeSet<String> = requirement
        .required_checkpoints
        .iter()
        .map(|c| normalize_checkpoint(c))
        .collect();

    for checkpoint in &required {
        let answer = submission
            .checklist
            .iter()
            .find(|entry| normalize_checkpoint(&entry.checkpoint) == *checkpoint);
        match answer {
            None => violations.push(QcViolation::MissingCheckpoint {
                checkpoint: checkpoint.clone(),
            }),
            Some(entry) if !entry.passed => violations.push(QcViolation::FailedCheckpoint {
                checkpoint: checkpoint.clone(),
            }),
            Some(_) => {}
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    let total = u32::try_from(submission.checklist.len()).unwrap_or(u32::MAX);
    let passed = u32::try_from(submission.checklist.iter().filter(|e| e.passed).count())
        .unwrap_or(u32::MAX);
    let score = if total == 0 {
        Decimal::ONE_HUNDRED
    } else {
        (Decimal::from(passed) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
    };
    let failed_optional = submission
        .checklist
        .iter()
        .filter(|e| !e.passed && !required.contains(&normalize_checkpoint(&e.checkpoint)))
        .map(|e| e.checkpoint.clone())
        .collect();

    Ok(QcSummary {
        photo_count: provided,
        total_checkpoints: total,
        passed_checkpoints: passed,
        score,
        failed_optional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(checkpoint: &str, passed: bool) -> QcChecklistEntry {
        QcChecklistEntry {
            checkpoint: checkpoint.to_string(),
            passed,
            notes: None,
        }
    }

    #[test]
    fn test_duplicate_and_blank_photos_not_counted() {
        let submission = QcSubmission {
            photos: vec!["a.jpg".into(), "a.jpg".into(), "  ".into(), "b.jpg".into()],
            ..Default::default()
        };
        assert_eq!(submission.photo_count(), 2);
    }

    #[test]
    fn test_checkpoint_match_is_case_insensitive() {
        let requirement = QcRequirement {
            category: Some("PROTEIN".into()),
            min_photos: 0,
            required_checkpoints: vec!["Suhu Penyimpanan".into()],
        };
        let submission = QcSubmission {
            checklist: vec![entry("suhu penyimpanan", true)],
            ..Default::default()
        };
        assert!(validate_qc(&requirement, &submission).is_ok());
    }

    #[test]
    fn test_all_violations_reported() {
        let requirement = QcRequirement {
            category: None,
            min_photos: 2,
            required_checkpoints: vec!["kemasan".into(), "kesegaran".into()],
        };
        let submission = QcSubmission {
            photos: vec!["a.jpg".into()],
            checklist: vec![entry("kemasan", false)],
            inspector_notes: None,
        };
        let violations = validate_qc(&requirement, &submission).unwrap_err();
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_optional_failure_makes_result_conditional() {
        let requirement = QcRequirement::none();
        let submission = QcSubmission {
            checklist: vec![entry("kemasan", true), entry("label", false)],
            ..Default::default()
        };
        let summary = validate_qc(&requirement, &submission).unwrap();
        assert_eq!(summary.score, Decimal::from(50));
        assert_eq!(summary.result(false), QcResult::Conditional);
    }

    #[test]
    fn test_strictest_requirement() {
        let a = QcRequirement {
            category: Some("PROTEIN".into()),
            min_photos: 3,
            required_checkpoints: vec!["Suhu".into()],
        };
        let b = QcRequirement {
            category: Some("SAYURAN".into()),
            min_photos: 1,
            required_checkpoints: vec!["kesegaran".into(), "suhu".into()],
        };
        let merged = QcRequirement::strictest([&a, &b]);
        assert_eq!(merged.min_photos, 3);
        assert_eq!(merged.required_checkpoints, vec!["kesegaran".to_string(), "suhu".to_string()]);
    }
}
