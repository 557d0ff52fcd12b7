//! SVG line chart of total portfolio value over time.
//!
//! History is kept as CSV, which cannot embed a chart, so the trend chart is
//! a sibling SVG file. The chart is rendered from scratch on every
//! run and written over the previous file, so there is only ever one chart per
//! history.

use std::{fs, path::Path};

use chrono::NaiveDate;

use crate::{Dollar, Error, Result};

pub const TITLE: &str = "Portfolio Value Over Time";

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 420.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;
const Y_TICKS: usize = 5;
const MAX_X_LABELS: usize = 8;

pub fn write_trend_chart(path: &Path, points: &[(NaiveDate, Dollar)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::persist(path, e))?;
    }
    fs::write(path, render_trend_svg(points)).map_err(|e| Error::persist(path, e))
}

pub fn render_trend_svg(points: &[(NaiveDate, Dollar)]) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let (lo, hi) = value_range(points);

    let x_at = |i: usize| match points.len() {
        0 | 1 => MARGIN_LEFT + plot_w / 2.0,
        n => MARGIN_LEFT + plot_w * i as f64 / (n - 1) as f64,
    };
    let y_at = |v: f64| MARGIN_TOP + plot_h * (1.0 - (v - lo) / (hi - lo));

    let x0 = MARGIN_LEFT;
    let x1 = MARGIN_LEFT + plot_w;
    let y_base = MARGIN_TOP + plot_h;

    let mut lines = vec![
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
        ),
        r#"<rect width="100%" height="100%" fill="white"/>"#.to_string(),
        format!(
            r#"<text x="{}" y="28" text-anchor="middle" font-size="18">{TITLE}</text>"#,
            WIDTH / 2.0
        ),
        format!(
            r##"<g stroke="#333" stroke-width="1"><line x1="{x0}" y1="{MARGIN_TOP}" x2="{x0}" y2="{y_base}"/><line x1="{x0}" y1="{y_base}" x2="{x1}" y2="{y_base}"/></g>"##
        ),
    ];

    lines.extend((0..=Y_TICKS).map(|tick| {
        let v = lo + (hi - lo) * tick as f64 / Y_TICKS as f64;
        let y = y_at(v);
        format!(
            r##"<line x1="{x0}" y1="{y:.1}" x2="{x1}" y2="{y:.1}" stroke="#ddd"/><text x="{}" y="{:.1}" text-anchor="end" font-size="11">{v:.0}</text>"##,
            x0 - 6.0,
            y + 4.0
        )
    }));

    let step = points.len().div_ceil(MAX_X_LABELS).max(1);
    lines.extend(
        points
            .iter()
            .enumerate()
            .filter(|&(i, _)| i % step == 0 || i + 1 == points.len())
            .map(|(i, (date, _))| {
                format!(
                    r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="11">{}</text>"#,
                    x_at(i),
                    y_base + 18.0,
                    date.format("%Y-%m-%d")
                )
            }),
    );

    lines.push(format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="13">Date</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 20.0
    ));
    lines.push(format!(
        r#"<text x="20" y="{y}" text-anchor="middle" font-size="13" transform="rotate(-90 20 {y})">Total Value</text>"#,
        y = MARGIN_TOP + plot_h / 2.0
    ));

    let coords: Vec<String> = points
        .iter()
        .enumerate()
        .map(|(i, (_, value))| format!("{:.1},{:.1}", x_at(i), y_at(value.0)))
        .collect();
    lines.push(format!(
        r##"<polyline fill="none" stroke="#1f77b4" stroke-width="2" points="{}"/>"##,
        coords.join(" ")
    ));
    lines.extend(points.iter().enumerate().map(|(i, (_, value))| {
        format!(
            r##"<circle cx="{:.1}" cy="{:.1}" r="3" fill="#1f77b4"/>"##,
            x_at(i),
            y_at(value.0)
        )
    }));
    lines.push("</svg>\n".to_string());
    lines.join("\n")
}

/// Y axis bounds, padded so a flat or single-point series still has height.
fn value_range(points: &[(NaiveDate, Dollar)]) -> (f64, f64) {
    let (lo, hi) = points
        .iter()
        .map(|(_, v)| v.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if hi > lo {
        (hi - lo) * 0.05
    } else {
        (hi.abs() * 0.05).max(1.0)
    };
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(d: &str, v: f64) -> (NaiveDate, Dollar) {
        (d.parse().unwrap(), Dollar(v))
    }

    #[test]
    fn one_line_per_chart() {
        let svg = render_trend_svg(&[
            point("2024-01-01", 1000.0),
            point("2024-02-01", 1100.0),
            point("2024-03-01", 1050.0),
        ]);
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 1);
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains(TITLE));
        assert!(svg.contains("2024-02-01"));
    }

    #[test]
    fn single_point_is_centered() {
        let svg = render_trend_svg(&[point("2024-01-01", 2000.0)]);
        assert!(svg.contains(r#"<circle cx="430.0""#), "{svg}");
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn empty_series_renders_axes() {
        let svg = render_trend_svg(&[]);
        assert!(svg.contains("Total Value"));
        assert!(!svg.contains("<circle"));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn rewrite_replaces_previous_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trend.svg");
        let points = [point("2024-01-01", 1000.0), point("2024-01-02", 990.0)];
        write_trend_chart(&path, &points).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        write_trend_chart(&path, &points).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.matches("<svg").count(), 1);
    }
}
