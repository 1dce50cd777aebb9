//! Prediction parsing for raw model responses.
//!
//! Models are asked to end their response with a one-line JSON action such as
//! `{"evidence": 2, "testimony": 3}`. In practice the answer line is preceded
//! by free-form chain-of-thought, sometimes followed by a closing remark, and
//! sometimes wrapped in extra prose on the same line. Extraction therefore
//! runs an ordered chain of strategies, each a pure `&str -> Option<Action>`
//! function tried only if the previous one failed.

use serde_json::Value;

/// A structured action decoded from one model response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Present an evidence item against a testimony line
    Evidence { evidence: i64, testimony: i64 },
    /// Present a character profile against a testimony line
    Character { character: i64, testimony: i64 },
    /// Sentinel for an absent or unparseable prediction
    Absent,
}

impl Action {
    /// Testimony index, if the action carries one
    #[must_use]
    pub const fn testimony(&self) -> Option<i64> {
        match self {
            Self::Evidence { testimony, .. } | Self::Character { testimony, .. } => {
                Some(*testimony)
            }
            Self::Absent => None,
        }
    }
}

/// Result of parsing one model response
#[derive(Debug, Clone)]
pub struct Parsed {
    pub action: Action,
    /// Free text preceding the answer line, when any exists
    pub chain_of_thought: Option<String>,
    /// True when every extraction strategy failed
    pub parse_failed: bool,
}

/// Decode a candidate string as a JSON action object.
///
/// Returns `None` unless the string is a JSON object carrying a testimony
/// index plus either an evidence or a character index.
fn decode_action(candidate: &str) -> Option<Action> {
    let value: Value = serde_json::from_str(candidate.trim()).ok()?;
    let obj = value.as_object()?;
    let testimony = obj.get("testimony")?.as_i64()?;

    if let Some(evidence) = obj.get("evidence").and_then(Value::as_i64) {
        return Some(Action::Evidence { evidence, testimony });
    }
    if let Some(character) = obj.get("character").and_then(Value::as_i64) {
        return Some(Action::Character { character, testimony });
    }
    None
}

/// Strategy 1: the final line is the action object.
fn from_last_line(text: &str) -> Option<Action> {
    decode_action(text.lines().last()?)
}

/// Strategy 2: the second-to-last line is the action object (the model added
/// a trailing blank line or closing remark).
fn from_second_last_line(text: &str) -> Option<Action> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return None;
    }
    decode_action(lines[lines.len() - 2])
}

/// Decode the substring between a line's first and last brace, for answer
/// objects embedded in extra prose.
fn braced_substring(line: &str) -> Option<Action> {
    let start = line.find('{')?;
    let end = line.rfind('}')?;
    if end <= start {
        return None;
    }
    decode_action(&line[start..=end])
}

/// Strategy 3: the action object is embedded in extra prose on the final line.
fn from_braced_last_line(text: &str) -> Option<Action> {
    braced_substring(text.lines().last()?)
}

/// Strategy 4: a closing remark follows a prose-wrapped answer line; try the
/// brace substring of the second-to-last line.
fn from_braced_second_last_line(text: &str) -> Option<Action> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return None;
    }
    braced_substring(lines[lines.len() - 2])
}

/// Ordered extraction strategies, tried front to back
const STRATEGIES: &[fn(&str) -> Option<Action>] = &[
    from_last_line,
    from_second_last_line,
    from_braced_last_line,
    from_braced_second_last_line,
];

/// Parse one raw model response into an action plus chain-of-thought prefix.
///
/// Never fails: when every strategy comes up empty the sentinel
/// [`Action::Absent`] is returned with `parse_failed` set, so a single
/// unparseable turn cannot abort a run.
#[must_use]
pub fn parse_response(text: &str) -> Parsed {
    for strategy in STRATEGIES {
        if let Some(action) = strategy(text) {
            return Parsed {
                action,
                chain_of_thought: leading_text(text),
                parse_failed: false,
            };
        }
    }

    Parsed {
        action: Action::Absent,
        chain_of_thought: None,
        parse_failed: true,
    }
}

/// Everything before the final line, treated as chain-of-thought.
fn leading_text(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return None;
    }
    let prefix = lines[..lines.len() - 1].join("\n").trim().to_string();
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

/// Whitespace token count of a chain-of-thought prefix
#[must_use]
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
