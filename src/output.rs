use crate::aggregate::{BoxGroup, Describe, GroupedResult, RollingResult, ScatterSeries};
use crate::error::Result;
use crate::filter::Dimension;
use crate::types::{
    BoxRow, Column, DescribeRow, GroupRow, KeyValue, PreviewRow, Record, RollingRow, ScatterRow,
};
use crate::util::{format_int, format_number, format_opt, mean};
use crate::view::ChartData;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Write `rows` as CSV. An empty slice still gets the header row so the
/// file stays a valid table.
pub fn write_csv<T: Serialize + Tabled>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        let headers = T::headers();
        wtr.write_record(headers.iter().map(|h| h.as_bytes()))?;
    }
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, or `(no data)`.
pub fn markdown_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no data)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

/// Label for a key of `column`, using dimension names where they exist.
pub fn key_label(column: Column, key: &KeyValue) -> String {
    match (column, key) {
        (Column::Year, KeyValue::Int(v)) => Dimension::Year.label(*v as u8),
        (Column::Season, KeyValue::Int(v)) => Dimension::Season.label(*v as u8),
        (Column::Weather, KeyValue::Int(v)) => Dimension::Weather.label(*v as u8),
        _ => key.to_string(),
    }
}

fn opt_int<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

pub fn preview_rows(records: &[Record]) -> Vec<PreviewRow> {
    records
        .iter()
        .map(|r| PreviewRow {
            date: r
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            season: opt_int(r.season),
            year: opt_int(r.year),
            month: opt_int(r.month),
            hour: opt_int(r.hour),
            weather: opt_int(r.weather),
            temp: r.temp.map(|v| format!("{:.3}", v)).unwrap_or_default(),
            humidity: r.humidity.map(|v| format!("{:.3}", v)).unwrap_or_default(),
            casual: opt_int(r.casual),
            registered: opt_int(r.registered),
            count: opt_int(r.count),
            time_category: opt_int(r.time_category),
        })
        .collect()
}

pub fn describe_rows(stats: &[Describe]) -> Vec<DescribeRow> {
    stats
        .iter()
        .map(|d| DescribeRow {
            column: d.column.name().to_string(),
            count: format_int(d.count as u64),
            mean: format_opt(d.mean, 3),
            std: format_opt(d.std, 3),
            min: format_opt(d.min, 3),
            q1: format_opt(d.q1, 3),
            median: format_opt(d.median, 3),
            q3: format_opt(d.q3, 3),
            max: format_opt(d.max, 3),
        })
        .collect()
}

pub fn group_label(result: &GroupedResult, key: &[KeyValue]) -> String {
    result
        .keys
        .iter()
        .zip(key)
        .map(|(c, k)| key_label(*c, k))
        .collect::<Vec<_>>()
        .join(" / ")
}

pub fn group_rows(result: &GroupedResult) -> Vec<GroupRow> {
    result
        .rows
        .iter()
        .map(|r| GroupRow {
            group: group_label(result, &r.key),
            value: format_number(r.value, 2),
        })
        .collect()
}

pub fn rolling_rows(result: &RollingResult) -> Vec<RollingRow> {
    result
        .points
        .iter()
        .map(|p| RollingRow {
            date: match p.hour {
                Some(h) => format!("{} {:02}:00", p.date.format("%Y-%m-%d"), h),
                None => p.date.format("%Y-%m-%d").to_string(),
            },
            value: format_number(p.value, 0),
            rolling_mean: format_opt(p.mean, 2),
        })
        .collect()
}

pub fn box_rows(boxes: &[BoxGroup]) -> Vec<BoxRow> {
    boxes
        .iter()
        .map(|b| BoxRow {
            group: key_label(b.group, &b.key),
            series: b.series.clone(),
            n: b.stats.n,
            min: format_number(b.stats.min, 1),
            q1: format_number(b.stats.q1, 1),
            median: format_number(b.stats.median, 1),
            q3: format_number(b.stats.q3, 1),
            max: format_number(b.stats.max, 1),
            outliers: b.stats.outliers.len(),
        })
        .collect()
}

pub fn scatter_rows(hue: Option<Column>, series: &[ScatterSeries]) -> Vec<ScatterRow> {
    series
        .iter()
        .map(|s| {
            let xs: Vec<f64> = s.points.iter().map(|p| p.0).collect();
            let ys: Vec<f64> = s.points.iter().map(|p| p.1).collect();
            ScatterRow {
                hue: match (hue, &s.hue) {
                    (Some(c), Some(k)) => key_label(c, k),
                    _ => "all".to_string(),
                },
                points: s.points.len(),
                mean_x: format_opt(mean(&xs), 3),
                mean_y: format_opt(mean(&ys), 2),
            }
        })
        .collect()
}

pub fn total_rows(totals: &[(Column, f64)]) -> Vec<GroupRow> {
    totals
        .iter()
        .map(|(c, v)| GroupRow {
            group: match c {
                Column::Casual => "Casual".to_string(),
                Column::Registered => "Registered".to_string(),
                other => other.name().to_string(),
            },
            value: format_number(*v, 0),
        })
        .collect()
}

/// Markdown rendition of any chart table.
pub fn chart_markdown(data: &ChartData, max_rows: usize) -> String {
    match data {
        ChartData::Preview(rows) => markdown_table(&preview_rows(rows), max_rows),
        ChartData::Describe(stats) => markdown_table(&describe_rows(stats), max_rows),
        ChartData::Grouped(g) => markdown_table(&group_rows(g), max_rows),
        ChartData::Rolling(r) => markdown_table(&rolling_rows(r), max_rows),
        ChartData::Boxes(b) => markdown_table(&box_rows(b), max_rows),
        ChartData::Scatter { hue, series } => markdown_table(&scatter_rows(*hue, series), max_rows),
        ChartData::Totals(t) => markdown_table(&total_rows(t), max_rows),
    }
}

/// Export the full table behind a chart as CSV.
pub fn export_chart_csv(path: &Path, data: &ChartData) -> Result<()> {
    match data {
        ChartData::Preview(rows) => write_csv(path, &preview_rows(rows)),
        ChartData::Describe(stats) => write_csv(path, &describe_rows(stats)),
        ChartData::Grouped(g) => write_csv(path, &group_rows(g)),
        ChartData::Rolling(r) => write_csv(path, &rolling_rows(r)),
        ChartData::Boxes(b) => write_csv(path, &box_rows(b)),
        ChartData::Scatter { hue, series } => write_csv(path, &scatter_rows(*hue, series)),
        ChartData::Totals(t) => write_csv(path, &total_rows(t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{GroupedValue, Reducer};
    use crate::types::TimeCategory;

    fn rush() -> GroupedResult {
        GroupedResult {
            keys: vec![Column::TimeCategory],
            value: Column::Count,
            reducer: Reducer::Mean,
            rows: vec![
                GroupedValue {
                    key: vec![KeyValue::Category(TimeCategory::RushHour)],
                    value: 110.0,
                    n: 2,
                },
                GroupedValue {
                    key: vec![KeyValue::Category(TimeCategory::NonRushHour)],
                    value: 30.0,
                    n: 2,
                },
            ],
        }
    }

    #[test]
    fn labels_use_dimension_names() {
        assert_eq!(key_label(Column::Season, &KeyValue::Int(3)), "Fall");
        assert_eq!(key_label(Column::Year, &KeyValue::Int(1)), "2012");
        assert_eq!(key_label(Column::Hour, &KeyValue::Int(7)), "7");
    }

    #[test]
    fn markdown_contains_group_labels() {
        let md = chart_markdown(&ChartData::Grouped(rush()), 10);
        assert!(md.contains("Rush Hour"));
        assert!(md.contains("110.00"));
        assert_eq!(markdown_table::<GroupRow>(&[], 10), "(no data)");
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rush.csv");
        export_chart_csv(&path, &ChartData::Grouped(rush())).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Group,Value", "Rush Hour,110.00", "Non-Rush Hour,30.00"]);
    }

    #[test]
    fn empty_export_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_trend.csv");
        let empty = GroupedResult {
            keys: vec![Column::Date],
            value: Column::Count,
            reducer: Reducer::Sum,
            rows: Vec::new(),
        };
        export_chart_csv(&path, &ChartData::Grouped(empty)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Group,Value\n");

        let path = dir.path().join("rolling_trend.csv");
        export_chart_csv(
            &path,
            &ChartData::Rolling(RollingResult {
                value: Column::Count,
                window: 7,
                points: Vec::new(),
            }),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Date,Value,RollingMean\n");
    }

    #[test]
    fn totals_are_named_by_user_type() {
        let rows = total_rows(&[(Column::Casual, 1200.0), (Column::Registered, 5000.0)]);
        assert_eq!(rows[0].group, "Casual");
        assert_eq!(rows[1].value, "5,000");
    }
}
