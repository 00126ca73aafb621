//! Submissions, similarity reports, and review views over them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::FlagPolicy;

/// A hackathon submission as supplied by the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Stable submission identifier.
    pub id: String,
    /// Repository to compare; submissions without one cannot be scanned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Submission {
    /// Submission with a repository URL and no title.
    #[must_use]
    pub fn new(id: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_url: Some(repo_url.into()),
            title: None,
        }
    }

    /// Trimmed repository URL, if a non-blank one is present.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        self.repo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// File form of an event's submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventManifest {
    /// Event identifier.
    pub event_id: String,
    /// Submissions taking part in the event.
    pub submissions: Vec<Submission>,
}

/// Lifecycle of a similarity report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Scan requested, results still arriving.
    Pending,
    /// Every comparison involving the submission succeeded.
    Completed,
    /// At least one comparison failed irrecoverably.
    Failed,
}

/// Similarity to one other submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityEntry {
    /// The other submission.
    pub other_submission_id: String,
    /// Score in `[0, 1]`.
    pub similarity: f64,
    /// Whether the score met the review threshold.
    pub flagged: bool,
}

/// A comparison that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairFailure {
    /// The other submission, when the failure concerns a pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_submission_id: Option<String>,
    /// Caller-safe description.
    pub message: String,
}

/// Per-submission similarity results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityReport {
    /// Submission the report belongs to.
    pub submission_id: String,
    /// Event the scan ran for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Scores against other submissions, highest first once finished.
    #[serde(default)]
    pub similarities: Vec<SimilarityEntry>,
    /// Comparisons that failed.
    #[serde(default)]
    pub failures: Vec<PairFailure>,
    /// Lifecycle state.
    pub status: ReportStatus,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl SimilarityReport {
    /// Fresh `PENDING` report.
    #[must_use]
    pub fn pending(submission_id: impl Into<String>, event_id: Option<&str>) -> Self {
        Self {
            submission_id: submission_id.into(),
            event_id: event_id.map(str::to_string),
            similarities: Vec::new(),
            failures: Vec::new(),
            status: ReportStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    /// Insert or replace the entry for `entry.other_submission_id`.
    ///
    /// Any failure previously recorded against the same submission is dropped.
    pub fn upsert_similarity(&mut self, entry: SimilarityEntry) {
        self.failures
            .retain(|failure| failure.other_submission_id.as_ref() != Some(&entry.other_submission_id));
        match self
            .similarities
            .iter_mut()
            .find(|existing| existing.other_submission_id == entry.other_submission_id)
        {
            Some(existing) => *existing = entry,
            None => self.similarities.push(entry),
        }
        self.touch();
    }

    /// Record a failed comparison, replacing any earlier outcome against the same submission.
    pub fn record_failure(&mut self, other_submission_id: Option<&str>, message: impl Into<String>) {
        if let Some(other) = other_submission_id {
            self.similarities
                .retain(|entry| entry.other_submission_id != other);
            self.failures
                .retain(|failure| failure.other_submission_id.as_deref() != Some(other));
        }
        self.failures.push(PairFailure {
            other_submission_id: other_submission_id.map(str::to_string),
            message: message.into(),
        });
        self.touch();
    }

    /// Move to a terminal state and order similarities by descending score.
    pub fn finish(&mut self, failed: bool) {
        self.status = if failed {
            ReportStatus::Failed
        } else {
            ReportStatus::Completed
        };
        self.sort_similarities();
        self.touch();
    }

    /// Order similarities by descending score, then by submission id.
    pub fn sort_similarities(&mut self) {
        self.similarities.sort_by(|left, right| {
            right
                .similarity
                .partial_cmp(&left.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.other_submission_id.cmp(&right.other_submission_id))
        });
    }

    /// Entries at or above the policy threshold.
    pub fn flagged<'a>(&'a self, policy: &'a FlagPolicy) -> impl Iterator<Item = &'a SimilarityEntry> {
        self.similarities
            .iter()
            .filter(|entry| policy.is_flagged(entry.similarity))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An unordered pair of submissions that needs review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedPair {
    /// Lexicographically smaller submission id.
    pub submission_a: String,
    /// Lexicographically larger submission id.
    pub submission_b: String,
    /// Highest recorded score for the pair.
    pub similarity: f64,
}

/// Deduplicated flagged pairs across `reports`, highest score first.
///
/// A pair recorded in both directions appears once, with the higher score.
#[must_use]
pub fn flagged_pairs(reports: &[SimilarityReport], policy: &FlagPolicy) -> Vec<FlaggedPair> {
    let mut pairs: BTreeMap<(String, String), f64> = BTreeMap::new();
    for report in reports {
        for entry in report.flagged(policy) {
            let key = if report.submission_id <= entry.other_submission_id {
                (report.submission_id.clone(), entry.other_submission_id.clone())
            } else {
                (entry.other_submission_id.clone(), report.submission_id.clone())
            };
            pairs
                .entry(key)
                .and_modify(|score| *score = score.max(entry.similarity))
                .or_insert(entry.similarity);
        }
    }
    let mut flagged: Vec<FlaggedPair> = pairs
        .into_iter()
        .map(|((submission_a, submission_b), similarity)| FlaggedPair {
            submission_a,
            submission_b,
            similarity,
        })
        .collect();
    flagged.sort_by(|left, right| {
        right
            .similarity
            .partial_cmp(&left.similarity)
            .unwrap_or(Ordering::Equal)
    });
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(other: &str, similarity: f64) -> SimilarityEntry {
        SimilarityEntry {
            other_submission_id: other.to_string(),
            similarity,
            flagged: FlagPolicy::default().is_flagged(similarity),
        }
    }

    #[test]
    fn report_wire_format_is_camel_case_with_upper_status() {
        let mut report = SimilarityReport::pending("s1", Some("hack-2024"));
        report.upsert_similarity(entry("s2", 0.9));
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["submissionId"], "s1");
        assert_eq!(value["eventId"], "hack-2024");
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["similarities"][0]["otherSubmissionId"], "s2");
        assert_eq!(value["similarities"][0]["flagged"], true);
        assert!(value.get("updatedAt").is_some());
    }

    #[test]
    fn upsert_replaces_existing_entry_and_clears_failure() {
        let mut report = SimilarityReport::pending("s1", None);
        report.record_failure(Some("s2"), "timed out");
        report.upsert_similarity(entry("s2", 0.2));
        report.upsert_similarity(entry("s2", 0.4));
        assert_eq!(report.similarities, vec![entry("s2", 0.4)]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn finish_sorts_descending() {
        let mut report = SimilarityReport::pending("s1", None);
        report.upsert_similarity(entry("s2", 0.1));
        report.upsert_similarity(entry("s3", 0.95));
        report.upsert_similarity(entry("s4", 0.5));
        report.finish(false);
        let order: Vec<_> = report
            .similarities
            .iter()
            .map(|entry| entry.other_submission_id.as_str())
            .collect();
        assert_eq!(order, ["s3", "s4", "s2"]);
        assert_eq!(report.status, ReportStatus::Completed);
    }

    #[test]
    fn flagged_pairs_are_deduplicated() {
        let mut a = SimilarityReport::pending("a", None);
        a.upsert_similarity(entry("b", 0.9));
        a.upsert_similarity(entry("c", 0.1));
        let mut b = SimilarityReport::pending("b", None);
        b.upsert_similarity(entry("a", 0.9));

        let pairs = flagged_pairs(&[a, b], &FlagPolicy::default());
        assert_eq!(
            pairs,
            vec![FlaggedPair {
                submission_a: "a".to_string(),
                submission_b: "b".to_string(),
                similarity: 0.9,
            }]
        );
    }

    #[test]
    fn manifest_accepts_missing_optional_fields() {
        let manifest: EventManifest = serde_json::from_value(json!({
            "eventId": "e1",
            "submissions": [
                {"id": "s1", "repoUrl": "https://example.com/a.git", "title": "Alpha"},
                {"id": "s2"},
                {"id": "s3", "repoUrl": "   "}
            ]
        }))
        .expect("manifest parses");
        assert_eq!(manifest.submissions.len(), 3);
        assert_eq!(manifest.submissions[0].repository(), Some("https://example.com/a.git"));
        assert_eq!(manifest.submissions[1].repository(), None);
        assert_eq!(manifest.submissions[2].repository(), None);
    }
}
