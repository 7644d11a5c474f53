// SVG rendering of chart slots with plotters.
//
// Layout under the output directory: one folder per tab holding
// `<chart>.svg`, the chart's table as `<chart>.csv`, and a
// `render_summary.json` for the last render of that tab.
use crate::aggregate::{BoxGroup, GroupedResult, RollingResult, ScatterSeries};
use crate::error::{DashboardError, Result};
use crate::output::{export_chart_csv, group_label, key_label, write_json};
use crate::render::{RenderSummary, RenderSurface};
use crate::types::{Column, KeyValue};
use crate::util::format_number;
use crate::view::{ChartData, ChartKind, ChartSpec, Tab};
use log::debug;
use plotters::prelude::*;
use plotters::style::Palette;
use std::error::Error;
use std::path::{Path, PathBuf};

type PlotResult = std::result::Result<(), Box<dyn Error>>;

pub struct SvgSurface {
    out_dir: PathBuf,
    size: (u32, u32),
    written: Vec<PathBuf>,
}

impl SvgSurface {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        SvgSurface {
            out_dir: out_dir.into(),
            size: (960, 540),
            written: Vec::new(),
        }
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn tab_dir(&self, tab: Tab) -> Result<PathBuf> {
        let dir = self.out_dir.join(tab.slug());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn render_err(spec: &ChartSpec, e: Box<dyn Error>) -> DashboardError {
        DashboardError::Render {
            chart: spec.slug.to_string(),
            reason: e.to_string(),
        }
    }
}

impl RenderSurface for SvgSurface {
    fn draw(&mut self, tab: Tab, spec: &ChartSpec, data: &ChartData) -> Result<()> {
        let dir = self.tab_dir(tab)?;
        let csv_path = dir.join(format!("{}.csv", spec.slug));
        export_chart_csv(&csv_path, data)?;
        self.written.push(csv_path);
        if spec.kind == ChartKind::Table {
            return Ok(());
        }
        let svg_path = dir.join(format!("{}.svg", spec.slug));
        draw_chart(&svg_path, self.size, spec, data).map_err(|e| Self::render_err(spec, e))?;
        debug!("wrote {}", svg_path.display());
        self.written.push(svg_path);
        Ok(())
    }

    fn notice(&mut self, tab: Tab, spec: &ChartSpec, notice: &str) -> Result<()> {
        let dir = self.tab_dir(tab)?;
        let svg_path = dir.join(format!("{}.svg", spec.slug));
        draw_message(&svg_path, self.size, spec.title, notice)
            .map_err(|e| Self::render_err(spec, e))?;
        self.written.push(svg_path);
        Ok(())
    }

    fn end_view(&mut self, summary: &RenderSummary) -> Result<()> {
        let path = self.tab_dir(summary.tab)?.join("render_summary.json");
        write_json(&path, summary)?;
        self.written.push(path);
        Ok(())
    }
}

fn series_color(i: usize) -> RGBColor {
    let (r, g, b) = Palette99::COLORS[i % Palette99::COLORS.len()];
    RGBColor(r, g, b)
}

fn label_at(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn y_upper(max: f64) -> f64 {
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn draw_chart(path: &Path, size: (u32, u32), spec: &ChartSpec, data: &ChartData) -> PlotResult {
    if data.is_empty() {
        return draw_message(path, size, spec.title, "No data for the current filter selection");
    }
    match data {
        ChartData::Grouped(g) if spec.kind == ChartKind::Line => draw_grouped_line(path, size, spec, g),
        ChartData::Grouped(g) => {
            let labels = g.rows.iter().map(|r| group_label(g, &r.key)).collect();
            let values = g.rows.iter().map(|r| r.value).collect();
            draw_bars(path, size, spec, labels, values)
        }
        ChartData::Totals(t) => {
            let labels = t
                .iter()
                .map(|(c, _)| match c {
                    Column::Casual => "Casual".to_string(),
                    Column::Registered => "Registered".to_string(),
                    other => other.name().to_string(),
                })
                .collect();
            let values = t.iter().map(|(_, v)| *v).collect();
            draw_bars(path, size, spec, labels, values)
        }
        ChartData::Rolling(r) => draw_rolling(path, size, spec, r),
        ChartData::Boxes(b) => draw_boxes(path, size, spec, b),
        ChartData::Scatter { hue, series } => draw_scatter(path, size, spec, *hue, series),
        ChartData::Preview(_) | ChartData::Describe(_) => Ok(()),
    }
}

fn draw_message(path: &Path, size: (u32, u32), title: &str, message: &str) -> PlotResult {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled(title, ("sans-serif", 24))?;
    area.draw(&Text::new(
        message.to_string(),
        (40, 40),
        ("sans-serif", 18).into_font().color(&RED),
    ))?;
    root.present()?;
    Ok(())
}

fn draw_bars(
    path: &Path,
    size: (u32, u32),
    spec: &ChartSpec,
    labels: Vec<String>,
    values: Vec<f64>,
) -> PlotResult {
    let n = values.len();
    let y_max = y_upper(values.iter().copied().fold(0.0, f64::max));
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.max(1))
        .x_label_formatter(&|x: &f64| label_at(&labels, *x))
        .y_label_formatter(&|y: &f64| format_number(*y, 0))
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .draw()?;
    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *v)], series_color(i).filled())
    }))?;
    root.present()?;
    Ok(())
}

fn draw_grouped_line(path: &Path, size: (u32, u32), spec: &ChartSpec, g: &GroupedResult) -> PlotResult {
    let labels: Vec<String> = g.rows.iter().map(|r| group_label(g, &r.key)).collect();
    let points: Vec<(f64, f64)> = g
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, r.value))
        .collect();
    let n = points.len();
    let y_max = y_upper(points.iter().map(|p| p.1).fold(0.0, f64::max));
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..(n.max(2) - 1) as f64, 0f64..y_max)?;
    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|x: &f64| label_at(&labels, *x))
        .y_label_formatter(&|y: &f64| format_number(*y, 0))
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .draw()?;
    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    chart.draw_series(points.iter().map(|p| Circle::new(*p, 2, BLUE.filled())))?;
    root.present()?;
    Ok(())
}

fn draw_rolling(path: &Path, size: (u32, u32), spec: &ChartSpec, r: &RollingResult) -> PlotResult {
    let labels: Vec<String> = r
        .points
        .iter()
        .map(|p| p.date.format("%Y-%m-%d").to_string())
        .collect();
    let raw: Vec<(f64, f64)> = r
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.value))
        .collect();
    let smooth: Vec<(f64, f64)> = r
        .points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.mean.map(|m| (i as f64, m)))
        .collect();
    let n = raw.len();
    let y_max = y_upper(raw.iter().map(|p| p.1).fold(0.0, f64::max));
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..(n.max(2) - 1) as f64, 0f64..y_max)?;
    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|x: &f64| label_at(&labels, *x))
        .y_label_formatter(&|y: &f64| format_number(*y, 0))
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .draw()?;
    let grey = RGBColor(190, 190, 190);
    chart
        .draw_series(LineSeries::new(raw, &grey))?
        .label(r.value.name())
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], grey));
    chart
        .draw_series(LineSeries::new(smooth, &BLUE))?
        .label(format!("{}-point rolling mean", r.window))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_boxes(path: &Path, size: (u32, u32), spec: &ChartSpec, boxes: &[BoxGroup]) -> PlotResult {
    let mut keys: Vec<(Column, KeyValue)> = Vec::new();
    let mut series: Vec<String> = Vec::new();
    for b in boxes {
        if !keys.iter().any(|(_, k)| *k == b.key) {
            keys.push((b.group, b.key));
        }
        if !series.contains(&b.series) {
            series.push(b.series.clone());
        }
    }
    let labels: Vec<String> = keys.iter().map(|(c, k)| key_label(*c, k)).collect();
    let y_max = y_upper(
        boxes
            .iter()
            .flat_map(|b| b.stats.outliers.iter().copied().chain([b.stats.max]))
            .fold(0.0, f64::max),
    );
    let width = 0.8 / series.len().max(1) as f64;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(keys.len() as f64 - 0.5), 0f64..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(keys.len().max(1))
        .x_label_formatter(&|x: &f64| label_at(&labels, *x))
        .y_label_formatter(&|y: &f64| format_number(*y, 0))
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .draw()?;

    let center = |b: &BoxGroup| -> f64 {
        let ki = keys.iter().position(|(_, k)| *k == b.key).unwrap_or(0) as f64;
        let si = series.iter().position(|s| *s == b.series).unwrap_or(0) as f64;
        ki - 0.4 + width * (si + 0.5)
    };
    let half = width * 0.4;

    for (si, name) in series.iter().enumerate() {
        let color = series_color(si);
        let anno = chart.draw_series(boxes.iter().filter(|b| b.series == *name).map(|b| {
            let x = center(b);
            Rectangle::new([(x - half, b.stats.q1), (x + half, b.stats.q3)], color.mix(0.7).filled())
        }))?;
        if series.len() > 1 {
            anno.label(name.as_str()).legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
            });
        }
    }
    chart.draw_series(boxes.iter().flat_map(|b| {
        let x = center(b);
        let s = &b.stats;
        [
            PathElement::new(vec![(x, s.min), (x, s.q1)], BLACK),
            PathElement::new(vec![(x, s.q3), (x, s.max)], BLACK),
            PathElement::new(vec![(x - half, s.median), (x + half, s.median)], BLACK),
            PathElement::new(vec![(x - half / 2.0, s.min), (x + half / 2.0, s.min)], BLACK),
            PathElement::new(vec![(x - half / 2.0, s.max), (x + half / 2.0, s.max)], BLACK),
        ]
    }))?;
    chart.draw_series(boxes.iter().flat_map(|b| {
        let x = center(b);
        b.stats
            .outliers
            .iter()
            .map(move |o| Circle::new((x, *o), 2, BLACK.filled()))
    }))?;
    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

fn draw_scatter(
    path: &Path,
    size: (u32, u32),
    spec: &ChartSpec,
    hue: Option<Column>,
    series: &[ScatterSeries],
) -> PlotResult {
    let all = move || series.iter().flat_map(|s| s.points.iter());
    let x_min = all().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = all().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max) = if x_max > x_min {
        (x_min, x_max)
    } else {
        (x_min - 0.5, x_min + 0.5)
    };
    let pad = (x_max - x_min) * 0.05;
    let y_max = y_upper(all().map(|p| p.1).fold(0.0, f64::max));

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((x_min - pad)..(x_max + pad), 0f64..y_max)?;
    chart
        .configure_mesh()
        .y_label_formatter(&|y: &f64| format_number(*y, 0))
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .draw()?;
    for (i, s) in series.iter().enumerate() {
        let color = series_color(i);
        let label = match (hue, &s.hue) {
            (Some(c), Some(k)) => format!("{}: {}", c.name(), key_label(c, k)),
            _ => "all".to_string(),
        };
        chart
            .draw_series(s.points.iter().map(|p| Circle::new(*p, 3, color.mix(0.6).filled())))?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 5, y), 3, color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_view;
    use crate::types::{Granularity, Record, RecordTable, Schema};
    use crate::view::{compose, ComposeSettings};
    use chrono::NaiveDate;

    #[test]
    fn label_lookup_only_on_integer_ticks() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(label_at(&labels, 1.0), "b");
        assert_eq!(label_at(&labels, 0.5), "");
        assert_eq!(label_at(&labels, -1.0), "");
        assert_eq!(label_at(&labels, 5.0), "");
    }

    #[test]
    fn writes_svg_csv_and_summary_per_tab() {
        let table = RecordTable {
            source: PathBuf::from("day.csv"),
            granularity: Granularity::Daily,
            schema: Schema::from_headers(["dteday", "casual", "registered", "cnt"]),
            rows: vec![Record {
                date: NaiveDate::from_ymd_opt(2011, 1, 1),
                casual: Some(331),
                registered: Some(654),
                count: Some(985),
                ..Record::default()
            }],
        };
        let dir = tempfile::tempdir().unwrap();
        let view = compose(Tab::UserType, &[&table], &ComposeSettings::default(), 0, String::new());
        let mut surface = SvgSurface::new(dir.path());
        render_view(&view, &mut surface).unwrap();
        let tab_dir = dir.path().join("user-type");
        assert!(tab_dir.join("user_totals.csv").exists());
        assert!(tab_dir.join("user_totals.svg").exists());
        // hourly box chart is skipped but still leaves a notice image
        assert!(tab_dir.join("user_type_by_hour.svg").exists());
        assert!(tab_dir.join("render_summary.json").exists());
        assert_eq!(surface.written().len(), 4);
    }
}
