//! Score ingestion.
//!
//! A finished run's output archive must contain `scores.txt` with one
//! `label: value` pair per line. Each label is matched against the
//! competition's score definitions; matching values become score records.

use std::collections::HashSet;

use scoreq_state::{ScoreRecord, SubmissionId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::archive::read_member;
use crate::error::{ArchiveError, IngestionError, Result};
use crate::tasks::Lifecycle;

/// Member of the output archive holding the scores.
pub const SCORES_FILE: &str = "scores.txt";

/// One parsed `label: value` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub label: String,
    pub value: f64,
}

/// Parsed contents of `scores.txt`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScores {
    pub entries: Vec<ParsedScore>,
    /// Non-blank lines without a colon, with an empty label or with a value
    /// that is not a number
    pub malformed: usize,
}

/// Parse `scores.txt`. Each line is split on its first `:`; label and value
/// are trimmed. Blank lines are ignored.
pub fn parse_scores(text: &str) -> ParsedScores {
    let mut parsed = ParsedScores::default();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((label, value)) = line.split_once(':') else {
            warn!(line, "Score line has no label separator");
            parsed.malformed += 1;
            continue;
        };
        let label = label.trim();
        match value.trim().parse::<f64>() {
            Ok(value) if !label.is_empty() => parsed.entries.push(ParsedScore {
                label: label.to_string(),
                value,
            }),
            _ => {
                warn!(line, "Malformed score line");
                parsed.malformed += 1;
            }
        }
    }
    parsed
}

/// Counts from one ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Score records created
    pub recorded: usize,
    /// Lines whose label has no score definition
    pub skipped: usize,
    /// Lines that could not be parsed
    pub malformed: usize,
}

impl Lifecycle {
    /// Read the output archive of a finished submission and record its
    /// scores.
    pub async fn ingest(&self, submission_id: SubmissionId) -> Result<IngestReport> {
        let stores = &self.stores;
        let mut submission = stores.submissions.get_submission(submission_id).await?;
        let phase = stores.submissions.get_phase(submission.phase_id).await?;

        let output_name = submission.output_name();
        submission.output_file = Some(output_name.clone());
        submission.stderr_file = Some(submission.stderr_name());
        stores.submissions.save_submission(&submission).await?;

        let bytes = stores
            .artifacts
            .read(&output_name)
            .await
            .map_err(|source| IngestionError::OutputUnavailable {
                name: output_name.to_string(),
                source,
            })?;
        let scores = read_member(&bytes, SCORES_FILE).map_err(|e| match e {
            ArchiveError::MissingMember { .. } => IngestionError::ScoresMissing {
                name: output_name.to_string(),
            },
            source => IngestionError::UnreadableArchive {
                name: output_name.to_string(),
                source,
            },
        })?;

        let parsed = parse_scores(&String::from_utf8_lossy(&scores));
        let mut report = IngestReport {
            malformed: parsed.malformed,
            ..IngestReport::default()
        };
        let mut seen = HashSet::new();

        for entry in parsed.entries {
            if !seen.insert(entry.label.clone()) {
                info!(
                    submission_id = %submission_id,
                    label = %entry.label,
                    "Duplicate score label, recording it again"
                );
            }
            match stores
                .scores
                .find_definition(phase.competition_id, &entry.label)
                .await?
            {
                Some(definition) => {
                    stores
                        .scores
                        .create_score(ScoreRecord::new(submission_id, &definition, entry.value))
                        .await?;
                    report.recorded += 1;
                }
                None => {
                    warn!(
                        submission_id = %submission_id,
                        label = %entry.label,
                        competition_id = %phase.competition_id,
                        "No score definition for label, skipping"
                    );
                    report.skipped += 1;
                }
            }
        }

        info!(
            submission_id = %submission_id,
            recorded = report.recorded,
            skipped = report.skipped,
            malformed = report.malformed,
            "Scores ingested"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_lines() {
        let parsed = parse_scores("accuracy: 0.95\nf1: 0.80\n");
        assert_eq!(
            parsed.entries,
            vec![
                ParsedScore {
                    label: "accuracy".to_string(),
                    value: 0.95
                },
                ParsedScore {
                    label: "f1".to_string(),
                    value: 0.80
                },
            ]
        );
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn test_parse_splits_on_first_colon_and_trims() {
        let parsed = parse_scores("  set:1 accuracy :  0.5  \n");
        assert_eq!(parsed.entries.len(), 0);
        assert_eq!(parsed.malformed, 1);

        let parsed = parse_scores("  loss  :  -1.25e-2\r\n");
        assert_eq!(parsed.entries[0].label, "loss");
        assert_eq!(parsed.entries[0].value, -0.0125);
    }

    #[test]
    fn test_parse_counts_malformed_lines() {
        let parsed = parse_scores("no separator\n: 1.0\nrecall: n/a\n\n   \nprecision: 1\n");
        assert_eq!(parsed.malformed, 3);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].label, "precision");
    }

    #[test]
    fn test_parse_keeps_duplicates() {
        let parsed = parse_scores("accuracy: 0.1\naccuracy: 0.2\n");
        assert_eq!(parsed.entries.len(), 2);
    }
}
