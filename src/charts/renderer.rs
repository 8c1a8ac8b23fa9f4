//! Static Chart Renderer
//! Shared drawing helpers and atomic persistence for SVG figures.
//!
//! Charts draw into an in-memory SVG string; nothing touches the output
//! directory until every file of a figure has rendered.

use crate::charts::Figure;
use crate::error::{CrashError, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const FIGURE_SIZE: (u32, u32) = (1000, 600);
pub const CAPTION_FONT: (&str, u32) = ("sans-serif", 22);
pub const LABEL_FONT: (&str, u32) = ("sans-serif", 13);

// Colors
pub const BAR_FILL: RGBColor = RGBColor(91, 155, 213);
pub const LINE_COLOR: RGBColor = RGBColor(31, 78, 121);
pub const EDGE_COLOR: RGBColor = RGBColor(0, 0, 0);

pub type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Output of a chart builder before it is written to disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub svg: String,
    /// (extension, bytes) pairs written next to the figure.
    pub companions: Vec<(String, Vec<u8>)>,
}

impl Rendered {
    pub fn svg(svg: String) -> Self {
        Self {
            svg,
            companions: Vec::new(),
        }
    }
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Draw onto a white SVG canvas held in memory.
    pub fn render_svg<F>(chart: &str, size: (u32, u32), draw: F) -> Result<String>
    where
        F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> DrawResult,
    {
        let mut buffer = String::new();
        {
            let root = SVGBackend::with_string(&mut buffer, size).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| CrashError::render(chart, e))?;
            draw(&root).map_err(|e| CrashError::render(chart, e))?;
            root.present().map_err(|e| CrashError::render(chart, e))?;
        }
        Ok(buffer)
    }

    /// Write `<stem>.svg` and its companions via temp files, then rename them
    /// into place so a failed chart never leaves a partial file behind.
    ///
    /// Companions are renamed first and the figure last. If any rename fails,
    /// the files already renamed are removed and the previous figure stays.
    pub fn persist(
        chart: &'static str,
        output_dir: &Path,
        stem: &str,
        rendered: Rendered,
    ) -> Result<Figure> {
        fs::create_dir_all(output_dir).map_err(|e| CrashError::render(chart, e))?;

        let mut staged = Vec::with_capacity(1 + rendered.companions.len());
        for (ext, bytes) in &rendered.companions {
            staged.push((
                output_dir.join(format!("{stem}.{ext}")),
                Self::stage(chart, output_dir, bytes)?,
            ));
        }
        staged.push((
            output_dir.join(format!("{stem}.svg")),
            Self::stage(chart, output_dir, rendered.svg.as_bytes())?,
        ));

        let mut paths: Vec<PathBuf> = Vec::with_capacity(staged.len());
        for (path, tmp) in staged {
            if let Err(e) = tmp.persist(&path) {
                for written in &paths {
                    let _ = fs::remove_file(written);
                }
                return Err(CrashError::render(
                    chart,
                    format!("{}: {}", path.display(), e.error),
                ));
            }
            paths.push(path);
        }

        let path = paths.pop().ok_or_else(|| CrashError::render(chart, "nothing to write"))?;
        Ok(Figure {
            kind: chart,
            path,
            companions: paths,
        })
    }

    fn stage(chart: &str, dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CrashError::render(chart, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.flush())
            .map_err(|e| CrashError::render(chart, e))?;
        Ok(tmp)
    }

    /// White (0.0) to deep red (1.0).
    pub fn heat_color(t: f64) -> RGBColor {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let fade = (255.0 * (1.0 - t)).round() as u8;
        let red = (255.0 - 75.0 * t).round() as u8;
        RGBColor(red, fade, fade)
    }

    /// Round an axis maximum up to a "nice" value (1, 2, 5 × 10^k).
    pub fn nice_ceiling(max: f64) -> f64 {
        if !max.is_finite() || max <= 0.0 {
            return 1.0;
        }
        let step = Self::nice_step(max, 5);
        (max / step).ceil() * step
    }

    pub fn nice_step(range: f64, target_steps: usize) -> f64 {
        let raw_step = range / target_steps as f64;
        let magnitude = 10f64.powf(raw_step.log10().floor());
        let normalized = raw_step / magnitude;

        let nice = if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };

        nice * magnitude
    }

    /// Label for a category axis drawn over `-0.5..n-0.5`: the category name at
    /// integer ticks, nothing in between.
    pub fn category_label(labels: &[String], x: f64) -> String {
        let nearest = x.round();
        if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
            return String::new();
        }
        labels.get(nearest as usize).cloned().unwrap_or_default()
    }
}

/// Lowercase and replace anything outside `[a-z0-9._-]` with `_`.
pub fn sanitize_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
