//! Chart projection: derive the dual intensity curves and act markers.
//!
//! The projection is a pure function of an [`AnalysisResult`]. It is
//! recomputed whenever the result changes and never mutated in place.

use crate::schema::{AnalysisResult, EMOTION_MAX, EMOTION_MIN, TENSION_MAX, TENSION_MIN};
use serde::Serialize;

/// The fixed y-domain of the combined chart, shared by every analysis so
/// that curves from different sessions are visually comparable.
pub const Y_DOMAIN: (f64, f64) = (-10.0, 10.0);

/// One beat on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    /// One-based position of the beat in narrative order.
    pub x: f64,
    pub emotion: f64,
    pub tension: f64,
}

/// A boundary between two acts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActTransition {
    /// Zero-based slot offset: `i - 0.5` for the later beat at index `i`,
    /// which falls halfway between the slots of the two beats it separates.
    pub x: f64,
    /// Label of the act being entered.
    pub label: String,
}

/// Everything a renderer needs to draw the arc chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartProjection {
    pub points: Vec<ChartPoint>,
    pub act_transitions: Vec<ActTransition>,
    pub y_domain: (f64, f64),
}

impl ChartProjection {
    /// Number of plotted beats.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there is nothing to plot.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Project an analysis onto the chart.
///
/// Markers are emitted at every boundary where the act changes, including
/// regressions to an earlier act; no attempt is made to repair the sequence.
pub fn project(result: &AnalysisResult) -> ChartProjection {
    let points = result
        .beats
        .iter()
        .enumerate()
        .map(|(i, beat)| ChartPoint {
            x: (i + 1) as f64,
            emotion: f64::from(beat.emotional_value)
                .clamp(f64::from(EMOTION_MIN), f64::from(EMOTION_MAX)),
            tension: f64::from(beat.tension_level)
                .clamp(f64::from(TENSION_MIN), f64::from(TENSION_MAX)),
        })
        .collect();

    let act_transitions = result
        .beats
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].act != pair[1].act)
        .map(|(i, pair)| ActTransition {
            // The later beat of the pair sits at index i + 1.
            x: (i + 1) as f64 - 0.5,
            label: pair[1].act.label().to_string(),
        })
        .collect();

    ChartProjection {
        points,
        act_transitions,
        y_domain: Y_DOMAIN,
    }
}
