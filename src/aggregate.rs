use crate::error::{DashboardError, Result};
use crate::types::{Column, KeyValue, RecordTable};
use crate::util::{mean, quantile_sorted, sample_std, sorted};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reducer {
    Mean,
    Sum,
    Median,
}

impl Reducer {
    fn reduce(&self, values: Vec<f64>) -> Option<f64> {
        match self {
            Reducer::Mean => mean(&values),
            Reducer::Sum => Some(values.iter().sum()),
            Reducer::Median => crate::util::median(values),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Mean => f.write_str("mean"),
            Reducer::Sum => f.write_str("sum"),
            Reducer::Median => f.write_str("median"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedValue {
    pub key: Vec<KeyValue>,
    pub value: f64,
    pub n: usize,
}

/// Result of a group-by reduction, ordered by key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedResult {
    pub keys: Vec<Column>,
    pub value: Column,
    pub reducer: Reducer,
    pub rows: Vec<GroupedValue>,
}

impl GroupedResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of the group whose key is exactly `key`.
    #[cfg(test)]
    pub fn get(&self, key: &[KeyValue]) -> Option<f64> {
        self.rows.iter().find(|r| r.key == key).map(|r| r.value)
    }
}

/// Group rows by the full tuple of `keys` and reduce `value` per group.
///
/// Rows missing any key or the value are left out, so a group only exists
/// when at least one row contributes to it.
pub fn group_reduce(
    table: &RecordTable,
    keys: &[Column],
    value: Column,
    reducer: Reducer,
) -> GroupedResult {
    let mut groups: BTreeMap<Vec<KeyValue>, Vec<f64>> = BTreeMap::new();
    for r in &table.rows {
        let Some(v) = r.numeric(value) else { continue };
        let key: Option<Vec<KeyValue>> = keys.iter().map(|k| r.key(*k)).collect();
        let Some(key) = key else { continue };
        groups.entry(key).or_default().push(v);
    }
    let rows = groups
        .into_iter()
        .filter_map(|(key, values)| {
            let n = values.len();
            reducer
                .reduce(values)
                .map(|value| GroupedValue { key, value, n })
        })
        .collect();
    GroupedResult {
        keys: keys.to_vec(),
        value,
        reducer,
        rows,
    }
}

/// Trailing simple moving average over positions. The first `window - 1`
/// positions have no value.
pub fn rolling_window_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    if window == 0 {
        return Err(DashboardError::InvalidWindow(window));
    }
    Ok((0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                mean(&values[i + 1 - window..=i])
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub hour: Option<u8>,
    pub value: f64,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingResult {
    pub value: Column,
    pub window: usize,
    pub points: Vec<RollingPoint>,
}

/// Rolling mean of `value` with rows ordered by date (then hour). Rows
/// without a date or value are left out of the sequence; calendar gaps are
/// not filled.
pub fn rolling_mean(table: &RecordTable, value: Column, window: usize) -> Result<RollingResult> {
    let mut seq: Vec<(NaiveDate, Option<u8>, f64)> = table
        .rows
        .iter()
        .filter_map(|r| Some((r.date?, r.hour, r.numeric(value)?)))
        .collect();
    seq.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    let values: Vec<f64> = seq.iter().map(|p| p.2).collect();
    let means = rolling_window_mean(&values, window)?;
    let points = seq
        .into_iter()
        .zip(means)
        .map(|((date, hour, value), mean)| RollingPoint {
            date,
            hour,
            value,
            mean,
        })
        .collect();
    Ok(RollingResult {
        value,
        window,
        points,
    })
}

/// Five-number summary with whiskers at 1.5 IQR.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub n: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        let v = sorted(values);
        let q1 = quantile_sorted(&v, 0.25)?;
        let median = quantile_sorted(&v, 0.5)?;
        let q3 = quantile_sorted(&v, 0.75)?;
        let iqr = q3 - q1;
        let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let inside: Vec<f64> = v.iter().copied().filter(|x| *x >= lo && *x <= hi).collect();
        let min = inside.first().copied().unwrap_or(q1);
        let max = inside.last().copied().unwrap_or(q3);
        let outliers = v.iter().copied().filter(|x| *x < lo || *x > hi).collect();
        Some(BoxStats {
            n: v.len(),
            min,
            q1,
            median,
            q3,
            max,
            outliers,
        })
    }
}

/// One box of a (possibly hued) box chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxGroup {
    pub group: Column,
    pub key: KeyValue,
    pub series: String,
    pub stats: BoxStats,
}

/// Distribution of `value` per distinct `group` value.
pub fn box_stats(table: &RecordTable, group: Column, value: Column) -> Vec<BoxGroup> {
    let mut groups: BTreeMap<KeyValue, Vec<f64>> = BTreeMap::new();
    for r in &table.rows {
        if let (Some(k), Some(v)) = (r.key(group), r.numeric(value)) {
            groups.entry(k).or_default().push(v);
        }
    }
    groups
        .into_iter()
        .filter_map(|(key, values)| {
            BoxStats::from_values(values).map(|stats| BoxGroup {
                group,
                key,
                series: value.name().to_string(),
                stats,
            })
        })
        .collect()
}

/// Casual and registered counts per hour in long form: one box per
/// (hour, user type) pair, hour-major.
pub fn user_type_long(table: &RecordTable) -> Vec<BoxGroup> {
    let mut out = Vec::new();
    let casual = box_stats(table, Column::Hour, Column::Casual);
    let registered = box_stats(table, Column::Hour, Column::Registered);
    let mut by_hour: BTreeMap<KeyValue, Vec<BoxGroup>> = BTreeMap::new();
    for g in casual.into_iter().chain(registered) {
        by_hour.entry(g.key).or_default().push(g);
    }
    for (_, groups) in by_hour {
        out.extend(groups);
    }
    out
}

/// Sum of each column over the table; absent cells are skipped.
pub fn column_totals(table: &RecordTable, columns: &[Column]) -> Vec<(Column, f64)> {
    columns
        .iter()
        .map(|c| (*c, table.rows.iter().filter_map(|r| r.numeric(*c)).sum()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub column: Column,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

/// Descriptive statistics for every numeric column the table carries.
pub fn describe(table: &RecordTable) -> Vec<Describe> {
    table
        .schema
        .columns()
        .filter(Column::is_numeric)
        .map(|column| {
            let values: Vec<f64> = table.rows.iter().filter_map(|r| r.numeric(column)).collect();
            let std = sample_std(&values);
            let mean = mean(&values);
            let v = sorted(values);
            Describe {
                column,
                count: v.len(),
                mean,
                std,
                min: v.first().copied(),
                q1: quantile_sorted(&v, 0.25),
                median: quantile_sorted(&v, 0.5),
                q3: quantile_sorted(&v, 0.75),
                max: v.last().copied(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    pub hue: Option<KeyValue>,
    pub points: Vec<(f64, f64)>,
}

/// Points of `x` against `y`, split into one series per `hue` value.
pub fn scatter(table: &RecordTable, x: Column, y: Column, hue: Option<Column>) -> Vec<ScatterSeries> {
    let mut series: BTreeMap<Option<KeyValue>, Vec<(f64, f64)>> = BTreeMap::new();
    for r in &table.rows {
        let (Some(px), Some(py)) = (r.numeric(x), r.numeric(y)) else {
            continue;
        };
        let h = hue.and_then(|c| r.key(c));
        series.entry(h).or_default().push((px, py));
    }
    series
        .into_iter()
        .map(|(hue, points)| ScatterSeries { hue, points })
        .collect()
}
