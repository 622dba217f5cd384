//! Plain-text rendering of an analysis.

use narrative_core::{AnalysisResult, ResultSource};
use std::fmt::Write;

/// Format an analysis as a readable report.
pub fn format_report(result: &AnalysisResult, source: ResultSource) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== {} ===", result.title);
    let _ = writeln!(out, "{}", result.logline);
    if source == ResultSource::Reference {
        let _ = writeln!(out, "(reference analysis)");
    }
    out.push('\n');

    let _ = writeln!(out, "Structure Analysis");
    let _ = writeln!(out, "{}", result.overall_structure);
    out.push('\n');

    let _ = writeln!(out, "Structure QC");
    if result.has_defects() {
        for item in &result.structural_defect_feedback {
            let _ = writeln!(out, "  - {item}");
        }
    } else {
        let _ = writeln!(out, "  No major defects detected.");
    }
    out.push('\n');

    let _ = writeln!(out, "Beat Breakdown");
    for beat in &result.beats {
        let _ = writeln!(
            out,
            "#{} [{}] E:{} T:{} {}",
            beat.beat_number, beat.act, beat.emotional_value, beat.tension_level, beat.title
        );
        let _ = writeln!(out, "    {}", beat.summary);
        if !beat.analysis_comment.is_empty() {
            let _ = writeln!(out, "    Analysis: {}", beat.analysis_comment);
        }
    }

    out
}

/// Format the character counter shown before a submission.
pub fn char_counter(text: &str, limit: usize) -> String {
    format!("{} / {} characters", text.chars().count(), limit)
}
