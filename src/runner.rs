//! Grading run orchestration.
//!
//! A run walks the gold corpus, pairs each case with its prediction file,
//! and drives turns through parsing, matching, and aggregation. Binning is
//! two-pass: the first pass over the selected cases collects every
//! action-space size, the second scores turns against the fixed bucket set.

use crate::aggregate::Aggregator;
use crate::case::{discover_case_ids, CaseError, GoldCase};
use crate::config::RunConfig;
use crate::matcher::match_action;
use crate::parser::{parse_response, token_count, Parsed};
use crate::report::{CaseDetail, Report, ReportBuilder, TurnDetail};
use crate::stratify::{ActionSpaceBins, StratifyError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a grading run
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Case data error: {0}")]
    Case(#[from] CaseError),

    #[error("Stratification error: {0}")]
    Stratify(#[from] StratifyError),

    #[error("No cases selected by filter '{0}'")]
    NoCasesSelected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One case paired with its parsed predictions, ready to score
struct ScoredCase {
    gold: GoldCase,
    predictions: Vec<Parsed>,
}

/// Drives one grading run from gold corpus to finished report
pub struct EvalRunner<'a> {
    config: &'a RunConfig,
}

impl<'a> EvalRunner<'a> {
    #[must_use]
    pub const fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Path of the prediction file for a case: one raw response per line
    fn prediction_path(&self, case_id: &str) -> PathBuf {
        self.config.output_dir().join(format!("{case_id}.jsonl"))
    }

    /// Load and parse a case's predictions, or explain why the case must be
    /// skipped. Skips never abort the run; gold-side errors do.
    fn load_case(
        &self,
        case_id: &str,
        builder: &mut ReportBuilder,
    ) -> Result<Option<ScoredCase>, RunnerError> {
        let gold = GoldCase::load(self.config.data_dir.join(format!("{case_id}.json")))?;

        let path = self.prediction_path(case_id);
        if !path.exists() {
            warn!(case = case_id, path = %path.display(), "prediction file missing, skipping case");
            builder.add_skipped_case(case_id);
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        // Every line is one turn's response, empty lines included: an empty
        // line parses to the sentinel, keeping positional alignment intact.
        let predictions: Vec<Parsed> = content
            .lines()
            .map(|line| {
                // Prediction lines are JSON-encoded raw response strings;
                // fall back to the line itself for plain-text files.
                let raw: String = serde_json::from_str(line).unwrap_or_else(|_| line.to_string());
                parse_response(&raw)
            })
            .collect();

        if predictions.len() != gold.len() {
            warn!(
                case = case_id,
                predicted = predictions.len(),
                expected = gold.len(),
                "prediction/turn count mismatch, skipping case"
            );
            builder.add_skipped_case(case_id);
            return Ok(None);
        }

        Ok(Some(ScoredCase { gold, predictions }))
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the gold corpus is unreadable or internally
    /// inconsistent, or if the case filter selects nothing. Per-case
    /// prediction problems are demoted to skips, never run failures.
    pub fn run(&self) -> Result<Report, RunnerError> {
        let ids = discover_case_ids(&self.config.data_dir)?;
        let selected = self.config.case_filter.select(&ids);
        if selected.is_empty() {
            return Err(RunnerError::NoCasesSelected(self.config.case_filter.label()));
        }

        info!(
            cases = selected.len(),
            model = %self.config.model,
            prompt = %self.config.prompt,
            "starting grading run"
        );

        let mut builder = ReportBuilder::new(self.config);

        // Pass 1: load everything and collect the action-space population.
        let mut cases = Vec::new();
        let mut sizes = Vec::new();
        for case_id in &selected {
            if let Some(scored) = self.load_case(case_id, &mut builder)? {
                sizes.extend(scored.gold.turns.iter().map(|t| t.action_space_size));
                cases.push(scored);
            }
        }

        let bins = ActionSpaceBins::from_population(&sizes, self.config.profile.action_space_bins);
        debug!(buckets = bins.len(), turns = sizes.len(), "action-space buckets built");

        // Pass 2: score every turn against the fixed bucket set.
        let mut aggregator = Aggregator::new(bins);
        for scored in &cases {
            let mut turn_details = Vec::with_capacity(scored.gold.turns.len());

            for (turn, parsed) in scored.gold.turns.iter().zip(&scored.predictions) {
                if parsed.parse_failed {
                    builder.record_parse_failure();
                }
                // The token average is over responses that carried a
                // chain-of-thought prefix; single-line answers stay out of
                // the denominator.
                if let Some(cot) = &parsed.chain_of_thought {
                    builder.record_reasoning_tokens(token_count(cot));
                }

                let outcome = match_action(turn, &parsed.action);
                aggregator.record(turn, outcome)?;
                turn_details.push(TurnDetail::resolve(&scored.gold, turn, &parsed.action, outcome));
            }

            builder.add_case(&scored.gold.id, CaseDetail::new(turn_details));
        }

        let overall = aggregator.overall();
        info!(
            total = overall.total,
            correct = overall.correct,
            parse_failures = builder.parse_failures(),
            "grading run complete"
        );

        Ok(builder.build(aggregator.finish()))
    }
}
