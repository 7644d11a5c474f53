// The four dashboard tabs and the charts each one shows.
//
// Every chart declares the columns it needs up front. Composition checks
// those against the loaded tables once; a chart whose columns are missing
// becomes a `Skipped` slot and the rest of the tab still renders.
use crate::aggregate::{
    box_stats, column_totals, describe, group_reduce, rolling_mean, scatter, user_type_long,
    BoxGroup, Describe, GroupedResult, Reducer, RollingResult, ScatterSeries,
};
use crate::error::DashboardError;
use crate::types::{Column, Granularity, Record, RecordTable};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Tab {
    Overview,
    Time,
    Weather,
    UserType,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Overview, Tab::Time, Tab::Weather, Tab::UserType];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Data Overview",
            Tab::Time => "Time Analysis",
            Tab::Weather => "Weather Analysis",
            Tab::UserType => "User Type Analysis",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Tab::Overview => "overview",
            Tab::Time => "time",
            Tab::Weather => "weather",
            Tab::UserType => "user-type",
        }
    }

    pub fn charts(&self) -> &'static [ChartSpec] {
        CATALOG.get(self).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Tab::ALL
            .iter()
            .copied()
            .find(|t| t.slug() == s || t.title().to_lowercase() == s)
            .ok_or_else(|| format!("unknown tab '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Line,
    Bar,
    Box,
    Scatter,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChartId {
    DataPreview,
    Describe,
    DailyTrend,
    RollingTrend,
    MonthlyMean,
    HourlyMean,
    RushHourMean,
    WeatherBox,
    TempScatter,
    HumidityScatter,
    UserTotals,
    UserTypeByHour,
}

/// Static description of one chart slot.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub id: ChartId,
    pub slug: &'static str,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub kind: ChartKind,
    pub requires: &'static [Column],
    pub prefers: Granularity,
}

#[allow(clippy::too_many_arguments)]
fn chart(
    id: ChartId,
    slug: &'static str,
    title: &'static str,
    x_label: &'static str,
    y_label: &'static str,
    kind: ChartKind,
    requires: &'static [Column],
    prefers: Granularity,
) -> ChartSpec {
    ChartSpec {
        id,
        slug,
        title,
        x_label,
        y_label,
        kind,
        requires,
        prefers,
    }
}

static CATALOG: Lazy<BTreeMap<Tab, Vec<ChartSpec>>> = Lazy::new(|| {
    use Granularity::{Daily, Hourly};
    BTreeMap::from([
        (
            Tab::Overview,
            vec![
                chart(ChartId::DataPreview, "data_preview", "Data Preview", "", "", ChartKind::Table, &[], Daily),
                chart(ChartId::Describe, "descriptive_statistics", "Descriptive Statistics", "", "", ChartKind::Table, &[], Daily),
            ],
        ),
        (
            Tab::Time,
            vec![
                chart(ChartId::DailyTrend, "daily_trend", "Total Rentals per Day", "Date", "Total rentals", ChartKind::Line, &[Column::Date, Column::Count], Daily),
                chart(ChartId::RollingTrend, "rolling_trend", "Rolling Mean of Rentals", "Date", "Rolling mean", ChartKind::Line, &[Column::Date, Column::Count], Daily),
                chart(ChartId::MonthlyMean, "monthly_mean", "Average Rentals per Month", "Month", "Average rentals", ChartKind::Bar, &[Column::Month, Column::Count], Daily),
                chart(ChartId::HourlyMean, "hourly_mean", "Average Rentals per Hour", "Hour", "Average rentals", ChartKind::Bar, &[Column::Hour, Column::Count], Hourly),
                chart(ChartId::RushHourMean, "rush_hour_mean", "Rush Hour vs Non-Rush Hour", "Time category", "Average rentals", ChartKind::Bar, &[Column::TimeCategory, Column::Count], Hourly),
            ],
        ),
        (
            Tab::Weather,
            vec![
                chart(ChartId::WeatherBox, "weather_box", "Rentals by Weather Condition", "Weather condition", "Rentals", ChartKind::Box, &[Column::Weather, Column::Count], Daily),
                chart(ChartId::TempScatter, "temp_scatter", "Temperature vs Rentals", "Temperature (normalized)", "Rentals", ChartKind::Scatter, &[Column::Temp, Column::Count], Daily),
                chart(ChartId::HumidityScatter, "humidity_scatter", "Humidity vs Rentals", "Humidity (normalized)", "Rentals", ChartKind::Scatter, &[Column::Humidity, Column::Count], Daily),
            ],
        ),
        (
            Tab::UserType,
            vec![
                chart(ChartId::UserTotals, "user_totals", "Total Casual vs Registered Usage", "User type", "Total rentals", ChartKind::Bar, &[Column::Casual, Column::Registered], Daily),
                chart(ChartId::UserTypeByHour, "user_type_by_hour", "Casual vs Registered by Hour", "Hour", "Users", ChartKind::Box, &[Column::Hour, Column::Casual, Column::Registered], Hourly),
            ],
        ),
    ])
});

/// The computed table a chart draws.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Preview(Vec<Record>),
    Describe(Vec<Describe>),
    Grouped(GroupedResult),
    Rolling(RollingResult),
    Boxes(Vec<BoxGroup>),
    Scatter {
        hue: Option<Column>,
        series: Vec<ScatterSeries>,
    },
    Totals(Vec<(Column, f64)>),
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Preview(rows) => rows.is_empty(),
            ChartData::Describe(rows) => rows.iter().all(|d| d.count == 0),
            ChartData::Grouped(g) => g.is_empty(),
            ChartData::Rolling(r) => r.points.is_empty(),
            ChartData::Boxes(b) => b.is_empty(),
            ChartData::Scatter { series, .. } => series.iter().all(|s| s.points.is_empty()),
            ChartData::Totals(t) => t.iter().all(|(_, v)| *v == 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Rendered { table: String, data: ChartData },
    Skipped { notice: String },
}

#[derive(Debug, Clone)]
pub struct ChartSlot {
    pub spec: &'static ChartSpec,
    pub state: SlotState,
}

impl ChartSlot {
    pub fn is_rendered(&self) -> bool {
        matches!(self.state, SlotState::Rendered { .. })
    }
}

/// One composed tab, tied to the selection generation it was computed for.
#[derive(Debug, Clone)]
pub struct ViewRender {
    pub tab: Tab,
    pub generation: u64,
    pub selection: String,
    pub slots: Vec<ChartSlot>,
}

impl ViewRender {
    pub fn slot(&self, id: ChartId) -> Option<&ChartSlot> {
        self.slots.iter().find(|s| s.spec.id == id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComposeSettings {
    pub rolling_window: usize,
    pub preview_rows: usize,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        ComposeSettings {
            rolling_window: 7,
            preview_rows: 10,
        }
    }
}

/// Pick the table a chart draws from: one of the preferred granularity
/// that has every required column, else any table that has them.
fn pick_table<'a>(spec: &ChartSpec, tables: &[&'a RecordTable]) -> Option<&'a RecordTable> {
    let candidates: Vec<&'a RecordTable> = tables
        .iter()
        .copied()
        .filter(|t| t.schema.satisfies(spec.requires))
        .collect();
    candidates
        .iter()
        .copied()
        .find(|t| t.granularity == spec.prefers)
        .or_else(|| candidates.first().copied())
}

fn missing_for(spec: &ChartSpec, tables: &[&RecordTable]) -> Vec<Column> {
    tables
        .iter()
        .find(|t| t.granularity == spec.prefers)
        .or_else(|| tables.first())
        .map(|t| t.schema.missing(spec.requires))
        .unwrap_or_else(|| spec.requires.to_vec())
}

fn compute(
    spec: &ChartSpec,
    table: &RecordTable,
    settings: &ComposeSettings,
) -> Result<ChartData, DashboardError> {
    let data = match spec.id {
        ChartId::DataPreview => {
            ChartData::Preview(table.rows.iter().take(settings.preview_rows).cloned().collect())
        }
        ChartId::Describe => ChartData::Describe(describe(table)),
        ChartId::DailyTrend => {
            ChartData::Grouped(group_reduce(table, &[Column::Date], Column::Count, Reducer::Sum))
        }
        ChartId::RollingTrend => {
            ChartData::Rolling(rolling_mean(table, Column::Count, settings.rolling_window)?)
        }
        ChartId::MonthlyMean => {
            ChartData::Grouped(group_reduce(table, &[Column::Month], Column::Count, Reducer::Mean))
        }
        ChartId::HourlyMean => {
            ChartData::Grouped(group_reduce(table, &[Column::Hour], Column::Count, Reducer::Mean))
        }
        ChartId::RushHourMean => ChartData::Grouped(group_reduce(
            table,
            &[Column::TimeCategory],
            Column::Count,
            Reducer::Mean,
        )),
        ChartId::WeatherBox => ChartData::Boxes(box_stats(table, Column::Weather, Column::Count)),
        ChartId::TempScatter | ChartId::HumidityScatter => {
            let x = if spec.id == ChartId::TempScatter {
                Column::Temp
            } else {
                Column::Humidity
            };
            let hue = Some(Column::Weather).filter(|c| table.schema.has(*c));
            ChartData::Scatter {
                hue,
                series: scatter(table, x, Column::Count, hue),
            }
        }
        ChartId::UserTotals => {
            ChartData::Totals(column_totals(table, &[Column::Casual, Column::Registered]))
        }
        ChartId::UserTypeByHour => ChartData::Boxes(user_type_long(table)),
    };
    Ok(data)
}

/// Build every slot of `tab` from the already filtered tables.
pub fn compose(
    tab: Tab,
    tables: &[&RecordTable],
    settings: &ComposeSettings,
    generation: u64,
    selection: String,
) -> ViewRender {
    if tables.iter().all(|t| t.is_empty()) {
        info!("{}", DashboardError::EmptyFilterResult);
    }
    let slots = tab
        .charts()
        .iter()
        .map(|spec| {
            let state = match pick_table(spec, tables) {
                Some(table) => match compute(spec, table, settings) {
                    Ok(data) => SlotState::Rendered {
                        table: table.label(),
                        data,
                    },
                    Err(e) => {
                        warn!("{}: {}", spec.slug, e);
                        SlotState::Skipped {
                            notice: e.to_string(),
                        }
                    }
                },
                None => {
                    let err = DashboardError::SchemaMismatch {
                        chart: spec.title.to_string(),
                        missing: missing_for(spec, tables),
                    };
                    warn!("{}", err);
                    SlotState::Skipped {
                        notice: err.to_string(),
                    }
                }
            };
            ChartSlot { spec, state }
        })
        .collect::<Vec<_>>();
    debug!(
        "{}: {} of {} charts ready",
        tab.slug(),
        slots.iter().filter(|s| s.is_rendered()).count(),
        slots.len()
    );
    ViewRender {
        tab,
        generation,
        selection,
        slots,
    }
}
