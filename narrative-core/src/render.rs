//! SVG rendering of a chart projection.
//!
//! Beats occupy evenly spaced slots along the x axis. A point with `x = n`
//! sits in slot `n - 1`; an act marker with `x = s` sits at slot offset `s`,
//! halfway between two beats.

use crate::projector::{ChartPoint, ChartProjection};
use std::fmt::Write;

const Y_TICKS: [f64; 5] = [-10.0, -5.0, 0.0, 5.0, 10.0];

/// Dimensions and colours of the rendered chart.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub grid: String,
    pub axis_text: String,
    pub emotion_color: String,
    pub tension_color: String,
    pub act_line_color: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 500,
            background: "#0f172a".to_string(),
            grid: "#334155".to_string(),
            axis_text: "#94a3b8".to_string(),
            emotion_color: "#34d399".to_string(),
            tension_color: "#e11d48".to_string(),
            act_line_color: "#64748b".to_string(),
        }
    }
}

struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    slots: usize,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn slot_x(&self, slot: f64) -> f64 {
        self.left + (slot + 0.5) * self.width / self.slots.max(1) as f64
    }

    fn value_y(&self, value: f64) -> f64 {
        let span = self.y_max - self.y_min;
        let t = if span > 0.0 {
            (value.clamp(self.y_min, self.y_max) - self.y_min) / span
        } else {
            0.5
        };
        self.top + self.height * (1.0 - t)
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Render a projection as a standalone SVG document.
pub fn render_svg(projection: &ChartProjection, style: &ChartStyle) -> String {
    let (margin_left, margin_right, margin_top, margin_bottom) = (60.0, 30.0, 40.0, 80.0);
    let frame = Frame {
        left: margin_left,
        top: margin_top,
        width: (f64::from(style.width) - margin_left - margin_right).max(1.0),
        height: (f64::from(style.height) - margin_top - margin_bottom).max(1.0),
        slots: projection.points.len(),
        y_min: projection.y_domain.0,
        y_max: projection.y_domain.1,
    };

    let mut grid = String::new();
    for tick in Y_TICKS {
        let y = frame.value_y(tick);
        let _ = write!(
            grid,
            r##"  <line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="{}" stroke-dasharray="3,3" opacity="0.3"/>
  <text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11" fill="{}">{tick}</text>
"##,
            frame.left,
            frame.right(),
            style.grid,
            frame.left - 8.0,
            y + 4.0,
            style.axis_text,
        );
    }

    let mut x_labels = String::new();
    for point in &projection.points {
        let _ = write!(
            x_labels,
            r##"  <text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="11" fill="{}">{}</text>
"##,
            frame.slot_x(point.x - 1.0),
            frame.bottom() + 18.0,
            style.axis_text,
            point.x,
        );
    }

    let mut act_lines = String::new();
    for transition in &projection.act_transitions {
        let x = frame.slot_x(transition.x);
        let _ = write!(
            act_lines,
            r##"  <line x1="{x:.1}" y1="{:.1}" x2="{x:.1}" y2="{:.1}" stroke="{}" stroke-dasharray="5,5"/>
  <text x="{:.1}" y="{:.1}" font-size="12" fill="{}">{}</text>
"##,
            frame.top,
            frame.bottom(),
            style.act_line_color,
            x + 4.0,
            frame.top + 14.0,
            style.axis_text,
            escape(&transition.label),
        );
    }

    let baseline_y = frame.value_y(0.0);
    let emotion = series(&frame, projection, |p| p.emotion, &style.emotion_color);
    let tension = series(&frame, projection, |p| p.tension, &style.tension_color);

    let legend_y = f64::from(style.height) - 20.0;
    let legend_x = frame.left;

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <rect width="{w}" height="{h}" fill="{bg}"/>
{grid}  <line x1="{left:.1}" y1="{baseline_y:.1}" x2="{right:.1}" y2="{baseline_y:.1}" stroke="#475569" stroke-width="1"/>
{act_lines}{emotion}{tension}{x_labels}  <text x="{right:.1}" y="{caption_y:.1}" text-anchor="end" font-size="12" fill="#64748b">Beat / Scene Sequence</text>
  <text x="16" y="{mid_y:.1}" text-anchor="middle" font-size="12" fill="#64748b" transform="rotate(-90, 16, {mid_y:.1})">Intensity</text>
  <circle cx="{legend_x:.1}" cy="{legend_y:.1}" r="5" fill="{ec}"/>
  <text x="{legend_text_x:.1}" y="{legend_text_y:.1}" font-size="12" fill="{axis}">Emotional Arc</text>
  <circle cx="{legend_x2:.1}" cy="{legend_y:.1}" r="5" fill="{tc}"/>
  <text x="{legend_text_x2:.1}" y="{legend_text_y:.1}" font-size="12" fill="{axis}">Tension Level</text>
</svg>
"##,
        w = style.width,
        h = style.height,
        bg = style.background,
        left = frame.left,
        right = frame.right(),
        caption_y = frame.bottom() + 38.0,
        mid_y = frame.top + frame.height / 2.0,
        ec = style.emotion_color,
        tc = style.tension_color,
        axis = style.axis_text,
        legend_text_x = legend_x + 10.0,
        legend_x2 = legend_x + 140.0,
        legend_text_x2 = legend_x + 150.0,
        legend_text_y = legend_y + 4.0,
    )
}

fn series(
    frame: &Frame,
    projection: &ChartProjection,
    value: impl Fn(&ChartPoint) -> f64,
    color: &str,
) -> String {
    if projection.points.is_empty() {
        return String::new();
    }

    let coords: Vec<(f64, f64)> = projection
        .points
        .iter()
        .map(|p| (frame.slot_x(p.x - 1.0), frame.value_y(value(p))))
        .collect();

    let path = coords
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = format!(
        r##"  <polyline points="{path}" fill="none" stroke="{color}" stroke-width="3"/>
"##
    );
    for (x, y) in coords {
        let _ = writeln!(
            out,
            r##"  <circle cx="{x:.1}" cy="{y:.1}" r="4" fill="{color}"/>"##
        );
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
