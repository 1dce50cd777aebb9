//! # Turnabout Eval
//!
//! Grading engine for contradiction-detection benchmarks: models read a
//! courtroom cross-examination and must present the piece of evidence (or the
//! character profile) that contradicts a specific testimony line.
//!
//! ## Architecture
//!
//! ```text
//! Gold case files (court record + annotated turns)
//!        ↓
//! Prediction files (one raw model response per turn)
//!        ↓
//! Parsing (ordered fallback strategies, sentinel on failure)
//!        ↓
//! Matching (full / evidence / testimony correctness axes)
//!        ↓
//! Stratification (category | reasoning length | action-space quantiles)
//!        ↓
//! Report (per-stratum stats + per-turn gold/predicted detail)
//! ```
//!
//! Scoring is deterministic: the same gold data and predictions always
//! produce the same report, modulo the generation timestamp.

pub mod aggregate;
pub mod batch;
pub mod case;
pub mod config;
pub mod matcher;
pub mod parser;
pub mod report;
pub mod runner;
pub mod stratify;

pub use aggregate::{AggregateSummary, Aggregator, BucketStats};
pub use batch::{wait_until_complete, BatchError, BatchState, PollPolicy};
pub use case::{
    discover_case_ids, CaseError, ContradictionPair, GoldCase, GradedTurn, TargetKind,
};
pub use config::{CaseFilter, ConfigError, ContextMode, GradingProfile, RunConfig};
pub use matcher::{match_action, MatchOutcome};
pub use parser::{parse_response, token_count, Action, Parsed};
pub use report::{reports_to_csv, CaseDetail, Report, ReportBuilder, TurnDetail};
pub use runner::{EvalRunner, RunnerError};
pub use stratify::{ActionSpaceBins, BinRange, StratifyError};
