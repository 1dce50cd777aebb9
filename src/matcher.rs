//! Correctness matching between a prediction and a graded turn.
//!
//! Three independent axes are evaluated: full pair match, evidence-only
//! match, and testimony-only match. A wrong pairing that still names the
//! right evidence (or the right testimony) is not a correct answer, but it is
//! diagnostically useful for error analysis, so the partial axes are tracked
//! separately.

use crate::case::{GradedTurn, TargetKind};
use crate::parser::Action;

/// Outcome of matching one prediction against one graded turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// The (target, testimony) pair is a member of the acceptable set
    pub full: bool,
    /// The target index matches some acceptable pair of the same kind
    pub evidence: bool,
    /// The testimony index matches some acceptable pair
    pub testimony: bool,
}

/// Match one action against a turn's acceptable answers.
///
/// An absent prediction is incorrect on all three axes, never an error.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn match_action(turn: &GradedTurn, action: &Action) -> MatchOutcome {
    let (kind, target, testimony) = match *action {
        Action::Evidence {
            evidence,
            testimony,
        } => (TargetKind::Evidence, evidence, testimony),
        Action::Character {
            character,
            testimony,
        } => (TargetKind::Character, character, testimony),
        Action::Absent => return MatchOutcome::default(),
    };

    let mut outcome = MatchOutcome::default();
    for pair in &turn.acceptable {
        let target_matches = pair.kind == kind && pair.target as i64 == target;
        let testimony_matches = pair.testimony as i64 == testimony;

        outcome.full |= target_matches && testimony_matches;
        outcome.evidence |= target_matches;
        outcome.testimony |= testimony_matches;
    }
    outcome
}
