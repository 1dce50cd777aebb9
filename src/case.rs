//! Gold case loading for contradiction grading.
//!
//! A case file carries the court record (evidence and character lists) and an
//! ordered list of turns. Turns marked `noPresent` expect no contradiction
//! presentation and are excluded from the grading population entirely.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading gold case data
#[derive(Error, Debug)]
pub enum CaseError {
    #[error("Case file not found: {0}")]
    NotFound(String),

    #[error("Malformed case file {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },

    #[error("Case {case}, turn {turn}: correct answer '{name}' is neither an evidence nor a character")]
    UnresolvedName {
        case: String,
        turn: usize,
        name: String,
    },

    #[error("No case files found in {0}")]
    Empty(String),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One evidence item in the court record
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceEntry {
    /// Display name, used to resolve gold annotations
    pub name: String,
    #[serde(default)]
    pub description1: Option<String>,
    #[serde(default)]
    pub description2: Option<String>,
}

/// One character profile in the court record
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One testimony line within a turn
#[derive(Debug, Clone, Deserialize)]
pub struct TestimonyEntry {
    /// Testimony text
    pub testimony: String,
    /// Speaking character
    #[serde(default)]
    pub person: Option<String>,
    /// Names of evidence/characters that contradict this line (may be empty)
    #[serde(default)]
    pub present: Vec<String>,
}

/// One turn as stored in the case file
#[derive(Debug, Clone, Deserialize)]
pub struct TurnEntry {
    #[serde(default)]
    pub category: String,
    /// True when nothing is to be presented this turn (turn is not gradable)
    #[serde(rename = "noPresent")]
    pub no_present: bool,
    pub testimonies: Vec<TestimonyEntry>,
    /// Semantic category tags, possibly absent
    #[serde(default)]
    pub labels: Vec<String>,
    /// Annotated reasoning-chain steps, possibly absent
    #[serde(default)]
    pub reasoning: Vec<String>,
}

/// Raw case file schema
#[derive(Debug, Clone, Deserialize)]
pub struct CaseFile {
    pub evidences: Vec<EvidenceEntry>,
    #[serde(default)]
    pub characters: Vec<CharacterEntry>,
    pub turns: Vec<TurnEntry>,
}

/// Whether a contradiction target is an evidence item or a character profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Evidence,
    Character,
}

/// One acceptable (target, testimony) answer for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContradictionPair {
    pub kind: TargetKind,
    /// Index into the case's evidence or character list, per `kind`
    pub target: usize,
    /// Index into the turn's testimony list
    pub testimony: usize,
}

/// One gradable turn with its resolved acceptable answers
#[derive(Debug, Clone)]
pub struct GradedTurn {
    /// Owning case id
    pub case_id: String,
    /// Index within the case's gradable-turn sequence
    pub index: usize,
    /// Acceptable answers; empty means every prediction scores incorrect
    pub acceptable: Vec<ContradictionPair>,
    /// Semantic category tags
    pub labels: Vec<String>,
    /// Reasoning-chain length; 0 means unlabeled
    pub reasoning_length: usize,
    /// Testimony texts, for report resolution
    pub testimonies: Vec<String>,
    /// evidence count x testimony count for this turn
    pub action_space_size: usize,
}

impl GradedTurn {
    /// Identifier used in bad-case lists, `<caseid>_<gradable index>`
    #[must_use]
    pub fn turn_id(&self) -> String {
        format!("{}_{}", self.case_id, self.index)
    }
}

/// A loaded case: court-record names plus the gradable turns
#[derive(Debug, Clone)]
pub struct GoldCase {
    pub id: String,
    pub evidence_names: Vec<String>,
    pub character_names: Vec<String>,
    pub turns: Vec<GradedTurn>,
}

impl GoldCase {
    /// Load a gold case from a JSON case file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or structurally unreadable, or
    /// if an annotated correct-answer name cannot be resolved against the
    /// court record (a data-integrity defect in the gold file).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CaseError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CaseError::NotFound(path.display().to_string()));
        }

        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let content = std::fs::read_to_string(path)?;
        let file: CaseFile =
            serde_json::from_str(&content).map_err(|source| CaseError::Malformed {
                path: path.display().to_string(),
                source,
            })?;

        Self::from_case_file(&id, &file)
    }

    /// Build a gold case from an already-deserialized case file.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::UnresolvedName` if a gold annotation references a
    /// name absent from both the evidence and character lists.
    pub fn from_case_file(id: &str, file: &CaseFile) -> Result<Self, CaseError> {
        let evidence_names: Vec<String> = file.evidences.iter().map(|e| e.name.clone()).collect();
        let character_names: Vec<String> = file.characters.iter().map(|c| c.name.clone()).collect();

        let mut turns = Vec::new();

        for turn in &file.turns {
            if turn.no_present {
                continue;
            }

            let index = turns.len();
            let mut acceptable = Vec::new();

            for (testimony_idx, testimony) in turn.testimonies.iter().enumerate() {
                for name in &testimony.present {
                    let pair = if let Some(target) =
                        evidence_names.iter().position(|n| n == name)
                    {
                        ContradictionPair {
                            kind: TargetKind::Evidence,
                            target,
                            testimony: testimony_idx,
                        }
                    } else if let Some(target) = character_names.iter().position(|n| n == name) {
                        ContradictionPair {
                            kind: TargetKind::Character,
                            target,
                            testimony: testimony_idx,
                        }
                    } else {
                        return Err(CaseError::UnresolvedName {
                            case: id.to_string(),
                            turn: index,
                            name: name.clone(),
                        });
                    };
                    acceptable.push(pair);
                }
            }

            turns.push(GradedTurn {
                case_id: id.to_string(),
                index,
                acceptable,
                labels: turn.labels.clone(),
                reasoning_length: turn.reasoning.len(),
                testimonies: turn.testimonies.iter().map(|t| t.testimony.clone()).collect(),
                action_space_size: file.evidences.len() * turn.testimonies.len(),
            });
        }

        Ok(Self {
            id: id.to_string(),
            evidence_names,
            character_names,
            turns,
        })
    }

    /// Resolve a target index to its court-record name, if in range
    #[must_use]
    pub fn target_name(&self, kind: TargetKind, index: usize) -> Option<&str> {
        let names = match kind {
            TargetKind::Evidence => &self.evidence_names,
            TargetKind::Character => &self.character_names,
        };
        names.get(index).map(String::as_str)
    }

    /// Number of gradable turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the case has no gradable turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Discover case ids (file stems) under a data directory, sorted.
///
/// # Errors
///
/// Returns an error if the directory does not exist or contains no `.json`
/// case files.
pub fn discover_case_ids<P: AsRef<Path>>(data_dir: P) -> Result<Vec<String>, CaseError> {
    let data_dir = data_dir.as_ref();
    if !data_dir.exists() {
        return Err(CaseError::NotFound(data_dir.display().to_string()));
    }

    let pattern = data_dir.join("*.json");
    let mut ids = Vec::new();

    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry.map_err(|e| std::io::Error::other(format!("glob error: {e}")))?;
        if let Some(stem) = path.file_stem() {
            ids.push(stem.to_string_lossy().to_string());
        }
    }

    if ids.is_empty() {
        return Err(CaseError::Empty(data_dir.display().to_string()));
    }

    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const CASE_JSON: &str = r#"{
        "evidences": [
            {"name": "Autopsy Report", "description1": "Time of death: 4PM."},
            {"name": "Statue", "description1": "Shaped like The Thinker."},
            {"name": "Passport", "description1": "Stamped yesterday."}
        ],
        "characters": [
            {"name": "Witness"}
        ],
        "turns": [
            {
                "category": "trial",
                "noPresent": true,
                "testimonies": [
                    {"testimony": "Opening statement.", "present": []}
                ]
            },
            {
                "category": "cross_examination",
                "noPresent": false,
                "testimonies": [
                    {"testimony": "I heard the scream at 9PM.", "present": []},
                    {"testimony": "The victim died instantly.", "present": ["Autopsy Report"]},
                    {"testimony": "Nobody else was there.", "present": ["Witness"]}
                ],
                "labels": ["temporal", "testimonial"],
                "reasoning": ["step one", "step two"]
            }
        ]
    }"#;

    fn write_case(dir: &TempDir, id: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(format!("{id}.json"));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_case() {
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "1-1_1", CASE_JSON);

        let case = GoldCase::load(&path).unwrap();
        assert_eq!(case.id, "1-1_1");
        assert_eq!(case.evidence_names.len(), 3);
        assert_eq!(case.character_names, vec!["Witness"]);
        // The noPresent turn is excluded from grading entirely
        assert_eq!(case.len(), 1);
    }

    #[test]
    fn test_acceptable_answers_resolved() {
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "1-1_1", CASE_JSON);

        let case = GoldCase::load(&path).unwrap();
        let turn = &case.turns[0];

        assert_eq!(
            turn.acceptable,
            vec![
                ContradictionPair {
                    kind: TargetKind::Evidence,
                    target: 0,
                    testimony: 1
                },
                ContradictionPair {
                    kind: TargetKind::Character,
                    target: 0,
                    testimony: 2
                },
            ]
        );
    }

    #[test]
    fn test_turn_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "1-1_1", CASE_JSON);

        let case = GoldCase::load(&path).unwrap();
        let turn = &case.turns[0];

        assert_eq!(turn.labels, vec!["temporal", "testimonial"]);
        assert_eq!(turn.reasoning_length, 2);
        assert_eq!(turn.action_space_size, 9); // 3 evidences x 3 testimonies
        assert_eq!(turn.turn_id(), "1-1_1_0");
    }

    #[test]
    fn test_unresolved_name_fails_loudly() {
        let json = r#"{
            "evidences": [{"name": "Knife"}],
            "characters": [],
            "turns": [{
                "noPresent": false,
                "testimonies": [{"testimony": "line", "present": ["Sword"]}]
            }]
        }"#;
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "bad", json);

        let result = GoldCase::load(&path);
        assert!(matches!(
            result,
            Err(CaseError::UnresolvedName { ref name, .. }) if name == "Sword"
        ));
    }

    #[test]
    fn test_malformed_case_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "broken", "not json at all");

        assert!(matches!(
            GoldCase::load(&path),
            Err(CaseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_case_not_found() {
        let result = GoldCase::load("/nonexistent/1-1.json");
        assert!(matches!(result, Err(CaseError::NotFound(_))));
    }

    #[test]
    fn test_gradable_turn_without_answers_kept() {
        let json = r#"{
            "evidences": [{"name": "Knife"}],
            "characters": [],
            "turns": [{
                "noPresent": false,
                "testimonies": [{"testimony": "line", "present": []}]
            }]
        }"#;
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "empty-gold", json);

        let case = GoldCase::load(&path).unwrap();
        assert_eq!(case.len(), 1);
        assert!(case.turns[0].acceptable.is_empty());
    }

    #[test]
    fn test_target_name_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = write_case(&dir, "1-1_1", CASE_JSON);
        let case = GoldCase::load(&path).unwrap();

        assert_eq!(case.target_name(TargetKind::Evidence, 0), Some("Autopsy Report"));
        assert_eq!(case.target_name(TargetKind::Evidence, 99), None);
        assert_eq!(case.target_name(TargetKind::Character, 0), Some("Witness"));
    }

    #[test]
    fn test_discover_case_ids_sorted() {
        let dir = TempDir::new().unwrap();
        write_case(&dir, "1-2_1", CASE_JSON);
        write_case(&dir, "1-1_1", CASE_JSON);

        let ids = discover_case_ids(dir.path()).unwrap();
        assert_eq!(ids, vec!["1-1_1", "1-2_1"]);
    }

    #[test]
    fn test_discover_case_ids_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_case_ids(dir.path()),
            Err(CaseError::Empty(_))
        ));
    }
}
