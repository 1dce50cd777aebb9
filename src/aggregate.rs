//! Running counters per stratum and overall.
//!
//! Category and reasoning-length buckets are created lazily the first time a
//! turn maps to them. Action-space buckets are pre-built from the fixed
//! [`ActionSpaceBins`] because their identity depends on population quantiles,
//! not on any single turn.

use crate::case::GradedTurn;
use crate::matcher::MatchOutcome;
use crate::stratify::{ActionSpaceBins, BinRange, StratifyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for one stratum (or the overall population)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketStats {
    pub correct: usize,
    pub evidence_correct: usize,
    pub testimony_correct: usize,
    pub total: usize,
    pub accuracy: f64,
    pub evidence_accuracy: f64,
    pub testimony_accuracy: f64,
    /// `<caseid>_<turn>` ids of turns answered incorrectly
    pub bad_cases: Vec<String>,
}

impl BucketStats {
    fn record(&mut self, outcome: MatchOutcome, turn_id: &str) {
        self.total += 1;
        if outcome.full {
            self.correct += 1;
        } else {
            self.bad_cases.push(turn_id.to_string());
        }
        if outcome.evidence {
            self.evidence_correct += 1;
        }
        if outcome.testimony {
            self.testimony_correct += 1;
        }
    }

    fn finalize(&mut self) {
        if self.total > 0 {
            self.accuracy = round4(self.correct, self.total);
            self.evidence_accuracy = round4(self.evidence_correct, self.total);
            self.testimony_accuracy = round4(self.testimony_correct, self.total);
        }
    }
}

/// Ratio rounded to four decimal places, matching the report precision
#[allow(clippy::cast_precision_loss)]
fn round4(numerator: usize, denominator: usize) -> f64 {
    let ratio = numerator as f64 / denominator as f64;
    (ratio * 10_000.0).round() / 10_000.0
}

/// Finalize a lazily-built stratum map, dropping empty buckets
fn finalize_map<K: Ord>(map: BTreeMap<K, BucketStats>) -> BTreeMap<K, BucketStats> {
    map.into_iter()
        .filter(|(_, stats)| stats.total > 0)
        .map(|(key, mut stats)| {
            stats.finalize();
            (key, stats)
        })
        .collect()
}

/// Accumulates outcomes across all scored turns of a run
#[derive(Debug)]
pub struct Aggregator {
    overall: BucketStats,
    categories: BTreeMap<String, BucketStats>,
    reasoning: BTreeMap<usize, BucketStats>,
    action_space: Vec<(BinRange, BucketStats)>,
    bins: ActionSpaceBins,
}

/// Finalized per-stratum statistics; zero-total buckets are omitted
#[derive(Debug, Clone)]
pub struct AggregateSummary {
    pub overall: BucketStats,
    pub categories: BTreeMap<String, BucketStats>,
    pub reasoning: BTreeMap<usize, BucketStats>,
    /// Label/stats pairs in ascending range order
    pub action_space: Vec<(String, BucketStats)>,
}

impl Aggregator {
    /// Create an aggregator over a fixed action-space bucket set
    #[must_use]
    pub fn new(bins: ActionSpaceBins) -> Self {
        let action_space = bins
            .ranges()
            .iter()
            .map(|&range| (range, BucketStats::default()))
            .collect();
        Self {
            overall: BucketStats::default(),
            categories: BTreeMap::new(),
            reasoning: BTreeMap::new(),
            action_space,
            bins,
        }
    }

    /// Record one scored turn into every stratum it belongs to.
    ///
    /// Each turn contributes at most once per axis to any bucket. Turns with
    /// reasoning length 0 skip the reasoning stratification but still count
    /// toward categories, action space, and the overall total.
    ///
    /// # Errors
    ///
    /// Returns an error if the turn's action-space size falls outside every
    /// bucket, which means the binning construction is broken.
    pub fn record(&mut self, turn: &GradedTurn, outcome: MatchOutcome) -> Result<(), StratifyError> {
        let bin = self.bins.assign(turn.action_space_size)?;
        let turn_id = turn.turn_id();

        self.overall.record(outcome, &turn_id);

        for label in &turn.labels {
            self.categories
                .entry(label.clone())
                .or_default()
                .record(outcome, &turn_id);
        }

        if turn.reasoning_length > 0 {
            self.reasoning
                .entry(turn.reasoning_length)
                .or_default()
                .record(outcome, &turn_id);
        }

        self.action_space[bin].1.record(outcome, &turn_id);
        Ok(())
    }

    /// Overall totals seen so far
    #[must_use]
    pub const fn overall(&self) -> &BucketStats {
        &self.overall
    }

    /// Derive accuracies and drop empty buckets
    #[must_use]
    pub fn finish(mut self) -> AggregateSummary {
        self.overall.finalize();

        let action_space = self
            .action_space
            .into_iter()
            .filter(|(_, stats)| stats.total > 0)
            .map(|(range, mut stats)| {
                stats.finalize();
                (range.label(), stats)
            })
            .collect();

        AggregateSummary {
            overall: self.overall,
            categories: finalize_map(self.categories),
            reasoning: finalize_map(self.reasoning),
            action_space,
        }
    }
}
