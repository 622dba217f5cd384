//! The beat schema: data contract for a structural analysis.
//!
//! The types here serve two purposes. Their `ResponseSchema` derive is the
//! structured-output contract handed to the model, and [`validate`] is the only
//! way to turn an untrusted reply into an [`AnalysisResult`].

use narrative_macros::ResponseSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lower bound of the emotional-value scale (despair, death).
pub const EMOTION_MIN: i8 = -10;
/// Upper bound of the emotional-value scale (happiness, victory).
pub const EMOTION_MAX: i8 = 10;
/// Lower bound of the tension scale (release, calm).
pub const TENSION_MIN: u8 = 0;
/// Upper bound of the tension scale (mortal danger, climax).
pub const TENSION_MAX: u8 = 10;

/// Errors from validating a candidate analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Reply is not valid JSON: {0}")]
    NotJson(String),

    #[error("Malformed {path}: {reason}")]
    Shape { path: String, reason: String },

    #[error("Analysis contains no beats")]
    EmptyBeats,

    #[error("beats[{index}]: beat_number must be a positive integer, got {value}")]
    InvalidBeatNumber { index: usize, value: f64 },

    #[error("beats[{index}]: beat_number {found} does not follow {previous}")]
    BeatOrder {
        index: usize,
        previous: u32,
        found: u32,
    },

    #[error("beats[{index}]: title is empty")]
    EmptyTitle { index: usize },

    #[error("beats[{index}]: unknown act {value:?}")]
    UnknownAct { index: usize, value: String },
}

/// Position of a beat in the classical three-act structure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ResponseSchema,
)]
pub enum Act {
    #[serde(rename = "Act 1")]
    Act1,
    #[serde(rename = "Act 2")]
    Act2,
    #[serde(rename = "Act 3")]
    Act3,
}

impl Act {
    /// All acts in narrative order.
    pub const ALL: [Act; 3] = [Act::Act1, Act::Act2, Act::Act3];

    /// The wire label, e.g. `"Act 2"`.
    pub fn label(&self) -> &'static str {
        match self {
            Act::Act1 => "Act 1",
            Act::Act2 => "Act 2",
            Act::Act3 => "Act 3",
        }
    }

    /// Parse an exact wire label. Anything else is rejected.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|act| act.label() == label)
    }
}

impl fmt::Display for Act {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A scene or beat of the narrative with quantified emotion and tension.
#[derive(Debug, Clone, PartialEq, Serialize, ResponseSchema)]
pub struct NarrativeBeat {
    /// Sequential number of the scene or beat, starting at 1
    pub beat_number: u32,
    /// Short title of the scene
    pub title: String,
    /// Concise summary of what happens in the scene (2-3 lines)
    pub summary: String,
    /// Which part of the three-act structure the scene belongs to
    pub act: Act,
    /// Protagonist's emotional state (-10: despair/death, 0: neutral, 10: supreme happiness/victory)
    pub emotional_value: i8,
    /// Suspense felt by the audience (0: release/calm, 5: conflict/unease, 10: mortal danger/climax)
    pub tension_level: u8,
    /// Short functional analysis from a researcher's viewpoint (why the scene is needed, foreshadowing, symbolism)
    pub analysis_comment: String,
}

/// The structural decomposition of a whole narrative.
#[derive(Debug, Clone, PartialEq, Serialize, ResponseSchema)]
pub struct AnalysisResult {
    /// Inferred title of the work
    pub title: String,
    /// One-sentence logline of the whole story
    pub logline: String,
    /// Overall critique of the structure
    pub overall_structure: String,
    /// Structural defect alerts (e.g. sagging second act, rushed resolution). Empty when no major defect is found.
    pub structural_defect_feedback: Vec<String>,
    /// Every beat of the story, in narrative order
    pub beats: Vec<NarrativeBeat>,
}

impl AnalysisResult {
    /// Number of beats.
    pub fn beat_count(&self) -> usize {
        self.beats.len()
    }

    /// Whether the critique flagged any structural defect.
    pub fn has_defects(&self) -> bool {
        !self.structural_defect_feedback.is_empty()
    }

    /// Indices of beats whose act is earlier than the previous beat's act.
    ///
    /// A well-formed three-act structure never regresses, but the analysis is
    /// untrusted input, so callers should treat this as a diagnostic only.
    pub fn act_regressions(&self) -> Vec<usize> {
        self.beats
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].act < pair[0].act)
            .map(|(i, _)| i + 1)
            .collect()
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    title: String,
    logline: String,
    overall_structure: String,
    structural_defect_feedback: Vec<String>,
    beats: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawBeat {
    beat_number: f64,
    title: String,
    summary: String,
    act: String,
    emotional_value: f64,
    tension_level: f64,
    analysis_comment: String,
}

/// Parse reply text and validate it.
pub fn validate_str(text: &str) -> Result<AnalysisResult, ValidationError> {
    let candidate: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ValidationError::NotJson(e.to_string()))?;
    validate(&candidate)
}

/// Validate an untrusted candidate against the beat schema.
///
/// Rules, in order:
/// 1. The top level has all five fields with the right primitive kinds.
/// 2. `beats` is non-empty and every element has the beat shape, with a
///    positive, strictly increasing `beat_number` and a non-empty title.
/// 3. Scores are rounded and clamped into their scales rather than rejected.
/// 4. `act` is exactly one of the three act labels.
pub fn validate(candidate: &serde_json::Value) -> Result<AnalysisResult, ValidationError> {
    let raw = RawAnalysis::deserialize(candidate).map_err(|e| ValidationError::Shape {
        path: "analysis".to_string(),
        reason: e.to_string(),
    })?;

    if raw.beats.is_empty() {
        return Err(ValidationError::EmptyBeats);
    }

    let raw_beats = raw
        .beats
        .iter()
        .enumerate()
        .map(|(index, value)| {
            RawBeat::deserialize(value).map_err(|e| ValidationError::Shape {
                path: format!("beats[{index}]"),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut beats = Vec::with_capacity(raw_beats.len());
    let mut previous: Option<u32> = None;

    for (index, raw_beat) in raw_beats.into_iter().enumerate() {
        let beat_number = beat_number(index, raw_beat.beat_number)?;
        if let Some(previous) = previous {
            if beat_number <= previous {
                return Err(ValidationError::BeatOrder {
                    index,
                    previous,
                    found: beat_number,
                });
            }
        }
        previous = Some(beat_number);

        if raw_beat.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle { index });
        }

        let emotional_value = clamp_score(
            index,
            "emotional_value",
            raw_beat.emotional_value,
            EMOTION_MIN.into(),
            EMOTION_MAX.into(),
        ) as i8;
        let tension_level = clamp_score(
            index,
            "tension_level",
            raw_beat.tension_level,
            TENSION_MIN.into(),
            TENSION_MAX.into(),
        ) as u8;

        let act = Act::from_label(&raw_beat.act).ok_or_else(|| ValidationError::UnknownAct {
            index,
            value: raw_beat.act.clone(),
        })?;

        beats.push(NarrativeBeat {
            beat_number,
            title: raw_beat.title,
            summary: raw_beat.summary,
            act,
            emotional_value,
            tension_level,
            analysis_comment: raw_beat.analysis_comment,
        });
    }

    Ok(AnalysisResult {
        title: raw.title,
        logline: raw.logline,
        overall_structure: raw.overall_structure,
        structural_defect_feedback: raw.structural_defect_feedback,
        beats,
    })
}

fn beat_number(index: usize, value: f64) -> Result<u32, ValidationError> {
    if value.fract() != 0.0 || value < 1.0 || value > f64::from(u32::MAX) {
        return Err(ValidationError::InvalidBeatNumber { index, value });
    }
    Ok(value as u32)
}

fn clamp_score(index: usize, field: &'static str, value: f64, min: i32, max: i32) -> i32 {
    let rounded = value.round();
    let clamped = rounded.clamp(f64::from(min), f64::from(max)) as i32;
    if rounded != f64::from(clamped) {
        tracing::debug!(index, field, raw = value, clamped, "score outside scale, clamped");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini::ResponseSchema;
    use serde_json::{json, Value};

    fn beat(number: u32, act: &str, emotion: f64, tension: f64) -> Value {
        json!({
            "beat_number": number,
            "title": format!("Beat {number}"),
            "summary": "Something happens.",
            "act": act,
            "emotional_value": emotion,
            "tension_level": tension,
            "analysis_comment": "Sets up the conflict."
        })
    }

    fn analysis(beats: Vec<Value>) -> Value {
        json!({
            "title": "Test Story",
            "logline": "A test goes through three acts.",
            "overall_structure": "Balanced.",
            "structural_defect_feedback": [],
            "beats": beats
        })
    }

    #[test]
    fn test_valid_analysis() {
        let candidate = analysis(vec![
            beat(1, "Act 1", -2.0, 3.0),
            beat(2, "Act 2", 4.0, 6.0),
            beat(3, "Act 3", 8.0, 9.0),
        ]);

        let result = validate(&candidate).unwrap();
        assert_eq!(result.title, "Test Story");
        assert_eq!(result.beat_count(), 3);
        assert_eq!(result.beats[1].act, Act::Act2);
        assert_eq!(result.beats[2].emotional_value, 8);
        assert!(!result.has_defects());
    }

    #[test]
    fn test_emotional_value_clamped() {
        let candidate = analysis(vec![
            beat(1, "Act 1", 15.0, 3.0),
            beat(2, "Act 2", -15.0, 3.0),
        ]);

        let result = validate(&candidate).unwrap();
        assert_eq!(result.beats[0].emotional_value, 10);
        assert_eq!(result.beats[1].emotional_value, -10);
    }

    #[test]
    fn test_tension_level_clamped_and_rounded() {
        let candidate = analysis(vec![
            beat(1, "Act 1", 0.0, -3.0),
            beat(2, "Act 1", 0.0, 12.0),
            beat(3, "Act 1", 2.6, 4.4),
        ]);

        let result = validate(&candidate).unwrap();
        assert_eq!(result.beats[0].tension_level, 0);
        assert_eq!(result.beats[1].tension_level, 10);
        assert_eq!(result.beats[2].emotional_value, 3);
        assert_eq!(result.beats[2].tension_level, 4);
    }

    #[test]
    fn test_unknown_act_rejected() {
        let candidate = analysis(vec![beat(1, "Act 1", 0.0, 0.0), beat(2, "Act 4", 0.0, 0.0)]);

        let err = validate(&candidate).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownAct {
                index: 1,
                value: "Act 4".to_string()
            }
        );
    }

    #[test]
    fn test_act_label_must_match_exactly() {
        for label in ["act 1", "Act1", "Act 1 ", "ACT 2", ""] {
            let candidate = analysis(vec![beat(1, label, 0.0, 0.0)]);
            assert!(
                matches!(validate(&candidate), Err(ValidationError::UnknownAct { .. })),
                "{label:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_top_level_field() {
        let mut candidate = analysis(vec![beat(1, "Act 1", 0.0, 0.0)]);
        candidate.as_object_mut().unwrap().remove("logline");

        let err = validate(&candidate).unwrap_err();
        match err {
            ValidationError::Shape { path, reason } => {
                assert_eq!(path, "analysis");
                assert!(reason.contains("logline"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_primitive_kind() {
        let mut candidate = analysis(vec![beat(1, "Act 1", 0.0, 0.0)]);
        candidate["structural_defect_feedback"] = json!("none");

        assert!(matches!(
            validate(&candidate),
            Err(ValidationError::Shape { .. })
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            validate(&json!([1, 2, 3])),
            Err(ValidationError::Shape { .. })
        ));
    }

    #[test]
    fn test_empty_beats_rejected() {
        assert_eq!(
            validate(&analysis(vec![])).unwrap_err(),
            ValidationError::EmptyBeats
        );
    }

    #[test]
    fn test_malformed_beat_reports_index() {
        let mut broken = beat(2, "Act 1", 0.0, 0.0);
        broken.as_object_mut().unwrap().remove("summary");
        let candidate = analysis(vec![beat(1, "Act 1", 0.0, 0.0), broken]);

        match validate(&candidate).unwrap_err() {
            ValidationError::Shape { path, .. } => assert_eq!(path, "beats[1]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_beat_number_must_be_positive_integer() {
        for number in [json!(0), json!(-1), json!(1.5)] {
            let mut first = beat(1, "Act 1", 0.0, 0.0);
            first["beat_number"] = number.clone();
            let candidate = analysis(vec![first]);
            assert!(
                matches!(
                    validate(&candidate),
                    Err(ValidationError::InvalidBeatNumber { index: 0, .. })
                ),
                "{number} should be rejected"
            );
        }
    }

    #[test]
    fn test_beat_numbers_strictly_increasing() {
        let candidate = analysis(vec![
            beat(1, "Act 1", 0.0, 0.0),
            beat(2, "Act 1", 0.0, 0.0),
            beat(2, "Act 2", 0.0, 0.0),
        ]);

        assert_eq!(
            validate(&candidate).unwrap_err(),
            ValidationError::BeatOrder {
                index: 2,
                previous: 2,
                found: 2
            }
        );
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut untitled = beat(1, "Act 1", 0.0, 0.0);
        untitled["title"] = json!("  ");

        assert_eq!(
            validate(&analysis(vec![untitled])).unwrap_err(),
            ValidationError::EmptyTitle { index: 0 }
        );
    }

    #[test]
    fn test_validate_str_not_json() {
        assert!(matches!(
            validate_str("Here is your analysis:"),
            Err(ValidationError::NotJson(_))
        ));
    }

    #[test]
    fn test_act_regressions_reported_not_rejected() {
        let candidate = analysis(vec![
            beat(1, "Act 1", 0.0, 0.0),
            beat(2, "Act 2", 0.0, 0.0),
            beat(3, "Act 1", 0.0, 0.0),
            beat(4, "Act 3", 0.0, 0.0),
        ]);

        let result = validate(&candidate).unwrap();
        assert_eq!(result.act_regressions(), vec![2]);
    }

    #[test]
    fn test_act_labels() {
        assert_eq!(Act::from_label("Act 2"), Some(Act::Act2));
        assert_eq!(Act::Act3.to_string(), "Act 3");
        assert!(Act::Act1 < Act::Act2 && Act::Act2 < Act::Act3);
        assert_eq!(serde_json::to_value(Act::Act1).unwrap(), json!("Act 1"));
    }

    #[test]
    fn test_beat_schema_mirrors_serialized_fields() {
        let schema = NarrativeBeat::response_schema();
        let beat = NarrativeBeat {
            beat_number: 1,
            title: "Opening".to_string(),
            summary: String::new(),
            act: Act::Act1,
            emotional_value: 0,
            tension_level: 0,
            analysis_comment: String::new(),
        };
        let serialized = serde_json::to_value(&beat).unwrap();

        let schema_fields: Vec<&str> = schema["propertyOrdering"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        let mut serialized_fields: Vec<&str> =
            serialized.as_object().unwrap().keys().map(String::as_str).collect();
        let mut sorted_schema_fields = schema_fields.clone();
        sorted_schema_fields.sort_unstable();
        serialized_fields.sort_unstable();

        assert_eq!(sorted_schema_fields, serialized_fields);
        assert_eq!(schema["required"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn test_analysis_schema_shape() {
        let schema = AnalysisResult::response_schema();

        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["beats"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["beats"]["items"]["type"], "OBJECT");
        assert_eq!(
            schema["properties"]["structural_defect_feedback"]["items"]["type"],
            "STRING"
        );
        assert_eq!(
            schema["properties"]["beats"]["items"]["properties"]["act"]["enum"],
            json!(["Act 1", "Act 2", "Act 3"])
        );
        assert_eq!(
            schema["properties"]["beats"]["items"]["properties"]["emotional_value"]["type"],
            "INTEGER"
        );
        assert!(schema["properties"]["logline"]["description"]
            .as_str()
            .unwrap()
            .contains("logline"));
    }
}
