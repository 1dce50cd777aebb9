//! Report assembly and emission.
//!
//! The report is the terminal artifact of a run: overall counters, one stats
//! block per stratum, and per-case, per-turn gold/predicted detail with
//! indices resolved back to human-readable names. A hallucinated out-of-range
//! index resolves to `"N/A"`, never a panic.

use crate::aggregate::{AggregateSummary, BucketStats};
use crate::case::{ContradictionPair, GoldCase, GradedTurn, TargetKind};
use crate::config::RunConfig;
use crate::matcher::MatchOutcome;
use crate::parser::Action;
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use tabled::{Table, Tabled};

/// Bucket map that serializes in insertion (ascending-range) order
#[derive(Debug, Clone, Default)]
pub struct OrderedStatsMap(pub Vec<(String, BucketStats)>);

impl Serialize for OrderedStatsMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, stats) in &self.0 {
            map.serialize_entry(key, stats)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedStatsMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedStatsMap;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of bucket labels to stats")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, BucketStats>()? {
                    entries.push(entry);
                }
                Ok(OrderedStatsMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// One resolved answer, gold or predicted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    pub testimony_id: i64,
    pub testimony: String,
}

const NOT_AVAILABLE: &str = "N/A";

impl AnswerDetail {
    fn evidence(id: i64, name: String, testimony_id: i64, testimony: String) -> Self {
        Self {
            evidence_id: Some(id),
            evidence: Some(name),
            character_id: None,
            character: None,
            testimony_id,
            testimony,
        }
    }

    fn character(id: i64, name: String, testimony_id: i64, testimony: String) -> Self {
        Self {
            evidence_id: None,
            evidence: None,
            character_id: Some(id),
            character: Some(name),
            testimony_id,
            testimony,
        }
    }

    fn absent() -> Self {
        Self::evidence(-1, NOT_AVAILABLE.to_string(), -1, NOT_AVAILABLE.to_string())
    }
}

/// Predicted answer plus its three correctness flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredDetail {
    #[serde(flatten)]
    pub answer: AnswerDetail,
    pub correct: bool,
    pub evidence_correct: bool,
    pub testimony_correct: bool,
}

/// Gold vs. predicted record for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetail {
    pub gold: Vec<AnswerDetail>,
    pub pred: PredDetail,
}

impl TurnDetail {
    /// Resolve one scored turn into its report record
    #[must_use]
    pub fn resolve(
        case: &GoldCase,
        turn: &GradedTurn,
        action: &Action,
        outcome: MatchOutcome,
    ) -> Self {
        let gold = turn
            .acceptable
            .iter()
            .map(|pair| gold_answer(case, turn, pair))
            .collect();

        Self {
            gold,
            pred: PredDetail {
                answer: predicted_answer(case, turn, action),
                correct: outcome.full,
                evidence_correct: outcome.evidence,
                testimony_correct: outcome.testimony,
            },
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn gold_answer(case: &GoldCase, turn: &GradedTurn, pair: &ContradictionPair) -> AnswerDetail {
    let name = case
        .target_name(pair.kind, pair.target)
        .unwrap_or(NOT_AVAILABLE)
        .to_string();
    let testimony = turn
        .testimonies
        .get(pair.testimony)
        .map_or(NOT_AVAILABLE, String::as_str)
        .to_string();

    match pair.kind {
        TargetKind::Evidence => {
            AnswerDetail::evidence(pair.target as i64, name, pair.testimony as i64, testimony)
        }
        TargetKind::Character => {
            AnswerDetail::character(pair.target as i64, name, pair.testimony as i64, testimony)
        }
    }
}

fn predicted_answer(case: &GoldCase, turn: &GradedTurn, action: &Action) -> AnswerDetail {
    let resolve_target = |kind, index: i64| {
        usize::try_from(index)
            .ok()
            .and_then(|i| case.target_name(kind, i))
            .unwrap_or(NOT_AVAILABLE)
            .to_string()
    };
    let resolve_testimony = |index: i64| {
        usize::try_from(index)
            .ok()
            .and_then(|i| turn.testimonies.get(i))
            .map_or(NOT_AVAILABLE, String::as_str)
            .to_string()
    };

    match *action {
        Action::Evidence {
            evidence,
            testimony,
        } => AnswerDetail::evidence(
            evidence,
            resolve_target(TargetKind::Evidence, evidence),
            testimony,
            resolve_testimony(testimony),
        ),
        Action::Character {
            character,
            testimony,
        } => AnswerDetail::character(
            character,
            resolve_target(TargetKind::Character, character),
            testimony,
            resolve_testimony(testimony),
        ),
        Action::Absent => AnswerDetail::absent(),
    }
}

/// Per-case section of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDetail {
    pub case_accuracy: f64,
    pub turns: Vec<TurnDetail>,
}

impl CaseDetail {
    /// Build from resolved turn records, deriving the case accuracy
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(turns: Vec<TurnDetail>) -> Self {
        let correct = turns.iter().filter(|t| t.pred.correct).count();
        let case_accuracy = if turns.is_empty() {
            0.0
        } else {
            let ratio = correct as f64 / turns.len() as f64;
            (ratio * 10_000.0).round() / 10_000.0
        };
        Self {
            case_accuracy,
            turns,
        }
    }
}

/// The run's terminal report artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub model: String,
    pub prompt: String,
    pub case: String,
    pub context: Option<String>,
    pub no_description: bool,
    pub generated_at: DateTime<Utc>,
    pub overall_total: usize,
    pub overall_correct: usize,
    pub overall_accuracy: f64,
    pub overall_evidence_accuracy: f64,
    pub overall_testimony_accuracy: f64,
    /// Responses from which no action could be extracted
    pub parse_failures: usize,
    /// Cases excluded for prediction/turn-count mismatch or missing output
    pub skipped_cases: Vec<String>,
    pub average_reasoning_tokens: f64,
    pub categories_accuracy: BTreeMap<String, BucketStats>,
    pub reasoning_steps_accuracy: BTreeMap<usize, BucketStats>,
    pub action_space_accuracy: OrderedStatsMap,
    pub case_details: BTreeMap<String, CaseDetail>,
}

/// Accumulates run state into a [`Report`]
pub struct ReportBuilder {
    model: String,
    prompt: String,
    case_label: String,
    context: Option<String>,
    no_description: bool,
    case_details: BTreeMap<String, CaseDetail>,
    parse_failures: usize,
    skipped_cases: Vec<String>,
    cot_tokens: Vec<usize>,
}

impl ReportBuilder {
    #[must_use]
    pub fn new(config: &RunConfig) -> Self {
        Self {
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            case_label: config.case_filter.label(),
            context: config.context.map(|c| c.as_str().to_string()),
            no_description: config.no_description,
            case_details: BTreeMap::new(),
            parse_failures: 0,
            skipped_cases: Vec::new(),
            cot_tokens: Vec::new(),
        }
    }

    pub fn record_parse_failure(&mut self) {
        self.parse_failures += 1;
    }

    pub fn record_reasoning_tokens(&mut self, count: usize) {
        self.cot_tokens.push(count);
    }

    pub fn add_skipped_case(&mut self, case_id: &str) {
        self.skipped_cases.push(case_id.to_string());
    }

    pub fn add_case(&mut self, case_id: &str, detail: CaseDetail) {
        self.case_details.insert(case_id.to_string(), detail);
    }

    /// Number of parse failures recorded so far
    #[must_use]
    pub const fn parse_failures(&self) -> usize {
        self.parse_failures
    }

    /// Finalize into the report artifact
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(self, summary: AggregateSummary) -> Report {
        let average_reasoning_tokens = if self.cot_tokens.is_empty() {
            0.0
        } else {
            let mean =
                self.cot_tokens.iter().sum::<usize>() as f64 / self.cot_tokens.len() as f64;
            (mean * 100.0).round() / 100.0
        };

        Report {
            model: self.model,
            prompt: self.prompt,
            case: self.case_label,
            context: self.context,
            no_description: self.no_description,
            generated_at: Utc::now(),
            overall_total: summary.overall.total,
            overall_correct: summary.overall.correct,
            overall_accuracy: summary.overall.accuracy,
            overall_evidence_accuracy: summary.overall.evidence_accuracy,
            overall_testimony_accuracy: summary.overall.testimony_accuracy,
            parse_failures: self.parse_failures,
            skipped_cases: self.skipped_cases,
            average_reasoning_tokens,
            categories_accuracy: summary.categories,
            reasoning_steps_accuracy: summary.reasoning,
            action_space_accuracy: OrderedStatsMap(summary.action_space),
            case_details: self.case_details,
        }
    }
}

/// Table row for markdown/text output
#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Bucket")]
    bucket: String,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
    #[tabled(rename = "Evidence")]
    evidence: String,
    #[tabled(rename = "Testimony")]
    testimony: String,
}

impl BucketRow {
    fn new(bucket: &str, stats: &BucketStats) -> Self {
        Self {
            bucket: bucket.to_string(),
            total: stats.total,
            accuracy: format!("{:.2}%", stats.accuracy * 100.0),
            evidence: format!("{:.2}%", stats.evidence_accuracy * 100.0),
            testimony: format!("{:.2}%", stats.testimony_accuracy * 100.0),
        }
    }
}

impl Report {
    /// Render the report as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn bucket_table<'a, I>(rows: I) -> String
    where
        I: Iterator<Item = (&'a str, &'a BucketStats)>,
    {
        let rows: Vec<BucketRow> = rows.map(|(name, stats)| BucketRow::new(name, stats)).collect();
        Table::new(rows).to_string()
    }

    /// Render the report as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        writeln!(output, "# Grading Report: {} / {}", self.model, self.prompt).ok();
        writeln!(output).ok();
        writeln!(
            output,
            "**Generated:** {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(output, "**Cases:** {}", self.case).ok();
        if let Some(context) = &self.context {
            writeln!(output, "**Context:** {context}").ok();
        }
        writeln!(output).ok();

        writeln!(output, "## Overall").ok();
        writeln!(output).ok();
        writeln!(output, "| Metric | Value |").ok();
        writeln!(output, "|--------|-------|").ok();
        writeln!(output, "| Turns scored | {} |", self.overall_total).ok();
        writeln!(output, "| Correct | {} |", self.overall_correct).ok();
        writeln!(
            output,
            "| Accuracy | {:.2}% |",
            self.overall_accuracy * 100.0
        )
        .ok();
        writeln!(
            output,
            "| Evidence accuracy | {:.2}% |",
            self.overall_evidence_accuracy * 100.0
        )
        .ok();
        writeln!(
            output,
            "| Testimony accuracy | {:.2}% |",
            self.overall_testimony_accuracy * 100.0
        )
        .ok();
        writeln!(output, "| Parse failures | {} |", self.parse_failures).ok();
        writeln!(
            output,
            "| Skipped cases | {} |",
            self.skipped_cases.len()
        )
        .ok();
        writeln!(
            output,
            "| Avg. reasoning tokens | {:.1} |",
            self.average_reasoning_tokens
        )
        .ok();
        writeln!(output).ok();

        if !self.categories_accuracy.is_empty() {
            writeln!(output, "## Accuracy by Category").ok();
            writeln!(output).ok();
            let table = Self::bucket_table(
                self.categories_accuracy
                    .iter()
                    .map(|(k, v)| (k.as_str(), v)),
            );
            writeln!(output, "{table}").ok();
            writeln!(output).ok();
        }

        if !self.reasoning_steps_accuracy.is_empty() {
            writeln!(output, "## Accuracy by Reasoning-Chain Length").ok();
            writeln!(output).ok();
            let keys: Vec<(String, &BucketStats)> = self
                .reasoning_steps_accuracy
                .iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            let table = Self::bucket_table(keys.iter().map(|(k, v)| (k.as_str(), *v)));
            writeln!(output, "{table}").ok();
            writeln!(output).ok();
        }

        if !self.action_space_accuracy.0.is_empty() {
            writeln!(output, "## Accuracy by Action-Space Size").ok();
            writeln!(output).ok();
            let table = Self::bucket_table(
                self.action_space_accuracy
                    .0
                    .iter()
                    .map(|(k, v)| (k.as_str(), v)),
            );
            writeln!(output, "{table}").ok();
            writeln!(output).ok();
        }

        output
    }

    /// Render a plain-text summary
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        writeln!(output, "GRADING SUMMARY: {} / {}", self.model, self.prompt).ok();
        writeln!(output, "  Turns scored:       {}", self.overall_total).ok();
        writeln!(
            output,
            "  Accuracy:           {:.2}%",
            self.overall_accuracy * 100.0
        )
        .ok();
        writeln!(
            output,
            "  Evidence accuracy:  {:.2}%",
            self.overall_evidence_accuracy * 100.0
        )
        .ok();
        writeln!(
            output,
            "  Testimony accuracy: {:.2}%",
            self.overall_testimony_accuracy * 100.0
        )
        .ok();
        writeln!(output, "  Parse failures:     {}", self.parse_failures).ok();
        if !self.skipped_cases.is_empty() {
            writeln!(
                output,
                "  Skipped cases:      {}",
                self.skipped_cases.join(", ")
            )
            .ok();
        }

        output
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Flatten one or more reports into a CSV, one row per run.
///
/// Bucket columns are taken from the first report; runs missing a bucket get
/// `N/A` in its columns.
#[must_use]
pub fn reports_to_csv(reports: &[Report]) -> String {
    let mut output = String::new();
    let Some(first) = reports.first() else {
        return output;
    };

    let category_keys: Vec<String> = first.categories_accuracy.keys().cloned().collect();
    let reasoning_keys: Vec<usize> = first.reasoning_steps_accuracy.keys().copied().collect();
    let action_keys: Vec<String> = first
        .action_space_accuracy
        .0
        .iter()
        .map(|(k, _)| k.clone())
        .collect();

    let mut header = vec![
        "model".to_string(),
        "prompt".to_string(),
        "overall_total".to_string(),
        "overall_accuracy".to_string(),
        "overall_evidence_accuracy".to_string(),
        "overall_testimony_accuracy".to_string(),
        "average_reasoning_tokens".to_string(),
    ];
    for key in &category_keys {
        header.push(format!("{key}_total"));
        header.push(format!("{key}_accuracy"));
    }
    for key in &reasoning_keys {
        header.push(format!("{key}_total"));
        header.push(format!("{key}_accuracy"));
    }
    for key in &action_keys {
        header.push(format!("{key}_total"));
        header.push(format!("{key}_accuracy"));
    }
    let header: Vec<String> = header.iter().map(|h| csv_escape(h)).collect();
    writeln!(output, "{}", header.join(",")).ok();

    for report in reports {
        let mut row = vec![
            csv_escape(&report.model),
            csv_escape(&report.prompt),
            report.overall_total.to_string(),
            report.overall_accuracy.to_string(),
            report.overall_evidence_accuracy.to_string(),
            report.overall_testimony_accuracy.to_string(),
            report.average_reasoning_tokens.to_string(),
        ];

        let push_stats = |row: &mut Vec<String>, stats: Option<&BucketStats>| match stats {
            Some(stats) => {
                row.push(stats.total.to_string());
                row.push(stats.accuracy.to_string());
            }
            None => {
                row.push(NOT_AVAILABLE.to_string());
                row.push(NOT_AVAILABLE.to_string());
            }
        };

        for key in &category_keys {
            push_stats(&mut row, report.categories_accuracy.get(key));
        }
        for key in &reasoning_keys {
            push_stats(&mut row, report.reasoning_steps_accuracy.get(key));
        }
        for key in &action_keys {
            let stats = report
                .action_space_accuracy
                .0
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v);
            push_stats(&mut row, stats);
        }

        writeln!(output, "{}", row.join(",")).ok();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseFilter, GradingProfile};
    use std::path::PathBuf;

    fn test_config() -> RunConfig {
        RunConfig {
            model: "gpt-4o".to_string(),
            prompt: "harry_v1".to_string(),
            context: None,
            no_description: false,
            case_filter: CaseFilter::All,
            data_dir: PathBuf::from("data"),
            output_root: PathBuf::from("output"),
            profile: GradingProfile::default(),
        }
    }

    fn test_case() -> GoldCase {
        GoldCase {
            id: "1-1_1".to_string(),
            evidence_names: vec!["Autopsy Report".to_string(), "Statue".to_string()],
            character_names: vec!["Witness".to_string()],
            turns: vec![],
        }
    }

    fn test_turn() -> GradedTurn {
        GradedTurn {
            case_id: "1-1_1".to_string(),
            index: 0,
            acceptable: vec![ContradictionPair {
                kind: TargetKind::Evidence,
                target: 0,
                testimony: 1,
            }],
            labels: vec![],
            reasoning_length: 0,
            testimonies: vec!["First line.".to_string(), "Second line.".to_string()],
            action_space_size: 4,
        }
    }

    fn stats(correct: usize, total: usize) -> BucketStats {
        BucketStats {
            correct,
            evidence_correct: correct,
            testimony_correct: correct,
            total,
            accuracy: correct as f64 / total as f64,
            evidence_accuracy: correct as f64 / total as f64,
            testimony_accuracy: correct as f64 / total as f64,
            bad_cases: vec![],
        }
    }

    fn empty_summary() -> AggregateSummary {
        AggregateSummary {
            overall: stats(1, 2),
            categories: BTreeMap::new(),
            reasoning: BTreeMap::new(),
            action_space: vec![],
        }
    }

    #[test]
    fn test_turn_detail_resolves_names() {
        let case = test_case();
        let turn = test_turn();
        let action = Action::Evidence {
            evidence: 0,
            testimony: 1,
        };
        let outcome = MatchOutcome {
            full: true,
            evidence: true,
            testimony: true,
        };

        let detail = TurnDetail::resolve(&case, &turn, &action, outcome);
        assert_eq!(detail.gold.len(), 1);
        assert_eq!(detail.gold[0].evidence.as_deref(), Some("Autopsy Report"));
        assert_eq!(detail.gold[0].testimony, "Second line.");
        assert_eq!(detail.pred.answer.evidence.as_deref(), Some("Autopsy Report"));
        assert!(detail.pred.correct);
    }

    #[test]
    fn test_out_of_range_prediction_resolves_to_na() {
        let case = test_case();
        let turn = test_turn();
        let action = Action::Evidence {
            evidence: 99,
            testimony: -1,
        };

        let detail = TurnDetail::resolve(&case, &turn, &action, MatchOutcome::default());
        assert_eq!(detail.pred.answer.evidence.as_deref(), Some("N/A"));
        assert_eq!(detail.pred.answer.testimony, "N/A");
        assert!(!detail.pred.correct);
    }

    #[test]
    fn test_absent_prediction_detail() {
        let case = test_case();
        let turn = test_turn();

        let detail = TurnDetail::resolve(&case, &turn, &Action::Absent, MatchOutcome::default());
        assert_eq!(detail.pred.answer.evidence_id, Some(-1));
        assert_eq!(detail.pred.answer.testimony_id, -1);
        assert_eq!(detail.pred.answer.evidence.as_deref(), Some("N/A"));
    }

    #[test]
    fn test_character_prediction_detail() {
        let case = test_case();
        let turn = test_turn();
        let action = Action::Character {
            character: 0,
            testimony: 0,
        };

        let detail = TurnDetail::resolve(&case, &turn, &action, MatchOutcome::default());
        assert_eq!(detail.pred.answer.character.as_deref(), Some("Witness"));
        assert!(detail.pred.answer.evidence.is_none());
    }

    #[test]
    fn test_case_detail_accuracy() {
        let case = test_case();
        let turn = test_turn();
        let correct = TurnDetail::resolve(
            &case,
            &turn,
            &Action::Evidence {
                evidence: 0,
                testimony: 1,
            },
            MatchOutcome {
                full: true,
                evidence: true,
                testimony: true,
            },
        );
        let wrong = TurnDetail::resolve(&case, &turn, &Action::Absent, MatchOutcome::default());

        let detail = CaseDetail::new(vec![correct, wrong]);
        assert!((detail.case_accuracy - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_json_shape() {
        let mut builder = ReportBuilder::new(&test_config());
        builder.record_parse_failure();
        builder.add_skipped_case("1-2_1");
        builder.record_reasoning_tokens(100);
        builder.record_reasoning_tokens(200);

        let mut summary = empty_summary();
        summary.categories.insert("temporal".to_string(), stats(1, 2));
        summary.reasoning.insert(3, stats(1, 1));
        summary
            .action_space
            .push(("10-24".to_string(), stats(1, 2)));

        let report = builder.build(summary);
        let json = report.to_json().unwrap();

        assert!(json.contains("\"overall_accuracy\": 0.5"));
        assert!(json.contains("\"temporal\""));
        assert!(json.contains("\"10-24\""));
        assert!(json.contains("\"parse_failures\": 1"));
        assert!(json.contains("\"average_reasoning_tokens\": 150.0"));
        assert!(json.contains("1-2_1"));
    }

    #[test]
    fn test_action_space_map_preserves_order() {
        let mut summary = empty_summary();
        summary
            .action_space
            .push(("9-15".to_string(), stats(1, 1)));
        summary
            .action_space
            .push(("16-120".to_string(), stats(0, 1)));

        let report = ReportBuilder::new(&test_config()).build(summary);
        let json = report.to_json().unwrap();

        let first = json.find("\"9-15\"").unwrap();
        let second = json.find("\"16-120\"").unwrap();
        assert!(first < second, "numeric range order must survive serialization");
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let mut summary = empty_summary();
        summary
            .action_space
            .push(("9-15".to_string(), stats(1, 1)));
        summary
            .action_space
            .push(("16-120".to_string(), stats(0, 1)));

        let report = ReportBuilder::new(&test_config()).build(summary);
        let json = report.to_json().unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.model, report.model);
        assert_eq!(parsed.overall_total, report.overall_total);
        let labels: Vec<&String> = parsed.action_space_accuracy.0.iter().map(|(k, _)| k).collect();
        assert_eq!(labels, vec!["9-15", "16-120"]);
    }

    #[test]
    fn test_markdown_rendering() {
        let mut summary = empty_summary();
        summary.categories.insert("temporal".to_string(), stats(1, 2));

        let report = ReportBuilder::new(&test_config()).build(summary);
        let markdown = report.to_markdown();

        assert!(markdown.contains("# Grading Report: gpt-4o / harry_v1"));
        assert!(markdown.contains("## Overall"));
        assert!(markdown.contains("## Accuracy by Category"));
        assert!(markdown.contains("temporal"));
    }

    #[test]
    fn test_text_rendering() {
        let report = ReportBuilder::new(&test_config()).build(empty_summary());
        let text = report.to_text();
        assert!(text.contains("GRADING SUMMARY"));
        assert!(text.contains("50.00%"));
    }

    #[test]
    fn test_reports_to_csv() {
        let mut summary = empty_summary();
        summary.categories.insert("temporal".to_string(), stats(1, 2));
        summary.reasoning.insert(2, stats(1, 1));
        summary
            .action_space
            .push(("4-9".to_string(), stats(1, 2)));

        let report = ReportBuilder::new(&test_config()).build(summary);
        let csv = reports_to_csv(&[report]);

        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("model,prompt,overall_total"));
        assert!(header.contains("temporal_total"));
        assert!(header.contains("2_accuracy"));
        assert!(header.contains("4-9_total"));

        let row = lines.next().unwrap();
        assert!(row.starts_with("gpt-4o,harry_v1,2,0.5"));
    }

    #[test]
    fn test_reports_to_csv_empty() {
        assert!(reports_to_csv(&[]).is_empty());
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
