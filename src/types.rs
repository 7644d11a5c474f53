use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tabled::Tabled;

/// One CSV row exactly as read. Every field is optional so a file that lacks
/// a column still deserializes; presence is tracked separately in `Schema`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRow {
    #[serde(rename = "instant")]
    pub instant: Option<String>,
    #[serde(rename = "dteday")]
    pub date: Option<String>,
    #[serde(rename = "season")]
    pub season: Option<String>,
    #[serde(rename = "yr")]
    pub year: Option<String>,
    #[serde(rename = "mnth")]
    pub month: Option<String>,
    #[serde(rename = "hr")]
    pub hour: Option<String>,
    #[serde(rename = "holiday")]
    pub holiday: Option<String>,
    #[serde(rename = "weekday")]
    pub weekday: Option<String>,
    #[serde(rename = "workingday")]
    pub working_day: Option<String>,
    #[serde(rename = "weathersit")]
    pub weather: Option<String>,
    #[serde(rename = "temp")]
    pub temp: Option<String>,
    #[serde(rename = "atemp")]
    pub atemp: Option<String>,
    #[serde(rename = "hum")]
    pub humidity: Option<String>,
    #[serde(rename = "windspeed")]
    pub windspeed: Option<String>,
    #[serde(rename = "casual")]
    pub casual: Option<String>,
    #[serde(rename = "registered")]
    pub registered: Option<String>,
    #[serde(rename = "cnt")]
    pub count: Option<String>,
    #[serde(rename = "time_category")]
    pub time_category: Option<String>,
}

/// Named columns of the bike-sharing dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Column {
    #[serde(rename = "instant")]
    Instant,
    #[serde(rename = "dteday")]
    Date,
    #[serde(rename = "season")]
    Season,
    #[serde(rename = "yr")]
    Year,
    #[serde(rename = "mnth")]
    Month,
    #[serde(rename = "hr")]
    Hour,
    #[serde(rename = "holiday")]
    Holiday,
    #[serde(rename = "weekday")]
    Weekday,
    #[serde(rename = "workingday")]
    WorkingDay,
    #[serde(rename = "weathersit")]
    Weather,
    #[serde(rename = "temp")]
    Temp,
    #[serde(rename = "atemp")]
    ATemp,
    #[serde(rename = "hum")]
    Humidity,
    #[serde(rename = "windspeed")]
    Windspeed,
    #[serde(rename = "casual")]
    Casual,
    #[serde(rename = "registered")]
    Registered,
    #[serde(rename = "cnt")]
    Count,
    #[serde(rename = "time_category")]
    TimeCategory,
}

impl Column {
    pub const ALL: [Column; 18] = [
        Column::Instant,
        Column::Date,
        Column::Season,
        Column::Year,
        Column::Month,
        Column::Hour,
        Column::Holiday,
        Column::Weekday,
        Column::WorkingDay,
        Column::Weather,
        Column::Temp,
        Column::ATemp,
        Column::Humidity,
        Column::Windspeed,
        Column::Casual,
        Column::Registered,
        Column::Count,
        Column::TimeCategory,
    ];

    /// Columns a complete daily or hourly file is expected to carry. `hr` is
    /// only expected in hourly files and `time_category` is derived.
    pub const EXPECTED: [Column; 15] = [
        Column::Instant,
        Column::Date,
        Column::Season,
        Column::Year,
        Column::Month,
        Column::Holiday,
        Column::Weekday,
        Column::WorkingDay,
        Column::Weather,
        Column::Temp,
        Column::ATemp,
        Column::Humidity,
        Column::Windspeed,
        Column::Casual,
        Column::Registered,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Instant => "instant",
            Column::Date => "dteday",
            Column::Season => "season",
            Column::Year => "yr",
            Column::Month => "mnth",
            Column::Hour => "hr",
            Column::Holiday => "holiday",
            Column::Weekday => "weekday",
            Column::WorkingDay => "workingday",
            Column::Weather => "weathersit",
            Column::Temp => "temp",
            Column::ATemp => "atemp",
            Column::Humidity => "hum",
            Column::Windspeed => "windspeed",
            Column::Casual => "casual",
            Column::Registered => "registered",
            Column::Count => "cnt",
            Column::TimeCategory => "time_category",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim();
        Column::ALL.iter().copied().find(|c| c.name() == header)
    }

    /// Columns that hold plain numbers and can feed a reduction.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::Date | Column::TimeCategory)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of columns a loaded table actually carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeSet<Column>,
}

impl Schema {
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Schema {
            columns: headers.into_iter().filter_map(Column::from_header).collect(),
        }
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn insert(&mut self, column: Column) {
        self.columns.insert(column);
    }

    /// Columns of `required` this schema does not carry, in the given order.
    pub fn missing(&self, required: &[Column]) -> Vec<Column> {
        required.iter().copied().filter(|c| !self.has(*c)).collect()
    }

    pub fn satisfies(&self, required: &[Column]) -> bool {
        required.iter().all(|c| self.has(*c))
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }
}

/// Hour-of-day bucket. Rush hour is [6,10) and [16,20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TimeCategory {
    #[serde(rename = "Rush Hour")]
    RushHour,
    #[serde(rename = "Non-Rush Hour")]
    NonRushHour,
}

impl TimeCategory {
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            6..=9 | 16..=19 => TimeCategory::RushHour,
            _ => TimeCategory::NonRushHour,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeCategory::RushHour => "Rush Hour",
            TimeCategory::NonRushHour => "Non-Rush Hour",
        }
    }
}

impl fmt::Display for TimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Rush Hour" => Ok(TimeCategory::RushHour),
            "Non-Rush Hour" => Ok(TimeCategory::NonRushHour),
            other => Err(format!("unknown time category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Granularity {
    Daily,
    Hourly,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Daily => f.write_str("daily"),
            Granularity::Hourly => f.write_str("hourly"),
        }
    }
}

/// A typed observation. Fields are `None` when the column is absent from
/// the source or the cell could not be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub instant: Option<u32>,
    pub date: Option<NaiveDate>,
    pub season: Option<u8>,
    pub year: Option<u8>,
    pub month: Option<u8>,
    pub hour: Option<u8>,
    pub holiday: Option<u8>,
    pub weekday: Option<u8>,
    pub working_day: Option<u8>,
    pub weather: Option<u8>,
    pub temp: Option<f64>,
    pub atemp: Option<f64>,
    pub humidity: Option<f64>,
    pub windspeed: Option<f64>,
    pub casual: Option<u32>,
    pub registered: Option<u32>,
    pub count: Option<u32>,
    pub time_category: Option<TimeCategory>,
}

impl Record {
    /// Numeric view of a column, `None` for missing cells and for the
    /// non-numeric columns.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Instant => self.instant.map(f64::from),
            Column::Season => self.season.map(f64::from),
            Column::Year => self.year.map(f64::from),
            Column::Month => self.month.map(f64::from),
            Column::Hour => self.hour.map(f64::from),
            Column::Holiday => self.holiday.map(f64::from),
            Column::Weekday => self.weekday.map(f64::from),
            Column::WorkingDay => self.working_day.map(f64::from),
            Column::Weather => self.weather.map(f64::from),
            Column::Temp => self.temp,
            Column::ATemp => self.atemp,
            Column::Humidity => self.humidity,
            Column::Windspeed => self.windspeed,
            Column::Casual => self.casual.map(f64::from),
            Column::Registered => self.registered.map(f64::from),
            Column::Count => self.count.map(f64::from),
            Column::Date | Column::TimeCategory => None,
        }
    }

    /// Grouping key for a column. Continuous measurements are not keys.
    pub fn key(&self, column: Column) -> Option<KeyValue> {
        let int = |v: Option<u8>| v.map(|v| KeyValue::Int(i64::from(v)));
        match column {
            Column::Date => self.date.map(KeyValue::Date),
            Column::TimeCategory => self.time_category.map(KeyValue::Category),
            Column::Instant => self.instant.map(|v| KeyValue::Int(i64::from(v))),
            Column::Season => int(self.season),
            Column::Year => int(self.year),
            Column::Month => int(self.month),
            Column::Hour => int(self.hour),
            Column::Holiday => int(self.holiday),
            Column::Weekday => int(self.weekday),
            Column::WorkingDay => int(self.working_day),
            Column::Weather => int(self.weather),
            Column::Casual => self.casual.map(|v| KeyValue::Int(i64::from(v))),
            Column::Registered => self.registered.map(|v| KeyValue::Int(i64::from(v))),
            Column::Count => self.count.map(|v| KeyValue::Int(i64::from(v))),
            Column::Temp | Column::ATemp | Column::Humidity | Column::Windspeed => None,
        }
    }

    /// `cnt == casual + registered`, vacuously true when any part is missing.
    pub fn count_is_consistent(&self) -> bool {
        match (self.count, self.casual, self.registered) {
            (Some(total), Some(c), Some(r)) => u64::from(total) == u64::from(c) + u64::from(r),
            _ => true,
        }
    }
}

/// A value of a grouping column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Date(NaiveDate),
    Category(TimeCategory),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            KeyValue::Category(c) => write!(f, "{}", c),
        }
    }
}

/// An in-memory table of observations at one granularity. Read-only once
/// loaded; filtering produces a new table.
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub source: PathBuf,
    pub granularity: Granularity,
    pub schema: Schema,
    pub rows: Vec<Record>,
}

impl RecordTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// New table with the same source, granularity and schema.
    pub fn with_rows(&self, rows: Vec<Record>) -> RecordTable {
        RecordTable {
            source: self.source.clone(),
            granularity: self.granularity,
            schema: self.schema.clone(),
            rows,
        }
    }

    pub fn label(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Display row for the data preview table.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PreviewRow {
    #[serde(rename = "dteday")]
    #[tabled(rename = "dteday")]
    pub date: String,
    #[serde(rename = "season")]
    #[tabled(rename = "season")]
    pub season: String,
    #[serde(rename = "yr")]
    #[tabled(rename = "yr")]
    pub year: String,
    #[serde(rename = "mnth")]
    #[tabled(rename = "mnth")]
    pub month: String,
    #[serde(rename = "hr")]
    #[tabled(rename = "hr")]
    pub hour: String,
    #[serde(rename = "weathersit")]
    #[tabled(rename = "weathersit")]
    pub weather: String,
    #[serde(rename = "temp")]
    #[tabled(rename = "temp")]
    pub temp: String,
    #[serde(rename = "hum")]
    #[tabled(rename = "hum")]
    pub humidity: String,
    #[serde(rename = "casual")]
    #[tabled(rename = "casual")]
    pub casual: String,
    #[serde(rename = "registered")]
    #[tabled(rename = "registered")]
    pub registered: String,
    #[serde(rename = "cnt")]
    #[tabled(rename = "cnt")]
    pub count: String,
    #[serde(rename = "time_category")]
    #[tabled(rename = "time_category")]
    pub time_category: String,
}

/// Display row for descriptive statistics of one column.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DescribeRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: String,
    #[serde(rename = "Mean")]
    #[tabled(rename = "Mean")]
    pub mean: String,
    #[serde(rename = "Std")]
    #[tabled(rename = "Std")]
    pub std: String,
    #[serde(rename = "Min")]
    #[tabled(rename = "Min")]
    pub min: String,
    #[serde(rename = "25%")]
    #[tabled(rename = "25%")]
    pub q1: String,
    #[serde(rename = "50%")]
    #[tabled(rename = "50%")]
    pub median: String,
    #[serde(rename = "75%")]
    #[tabled(rename = "75%")]
    pub q3: String,
    #[serde(rename = "Max")]
    #[tabled(rename = "Max")]
    pub max: String,
}

/// Display row for a grouped reduction.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Display row for a rolling mean sequence.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RollingRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "RollingMean")]
    #[tabled(rename = "RollingMean")]
    pub rolling_mean: String,
}

/// Display row for one box of a box chart.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BoxRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Series")]
    #[tabled(rename = "Series")]
    pub series: String,
    #[serde(rename = "N")]
    #[tabled(rename = "N")]
    pub n: usize,
    #[serde(rename = "Min")]
    #[tabled(rename = "Min")]
    pub min: String,
    #[serde(rename = "Q1")]
    #[tabled(rename = "Q1")]
    pub q1: String,
    #[serde(rename = "Median")]
    #[tabled(rename = "Median")]
    pub median: String,
    #[serde(rename = "Q3")]
    #[tabled(rename = "Q3")]
    pub q3: String,
    #[serde(rename = "Max")]
    #[tabled(rename = "Max")]
    pub max: String,
    #[serde(rename = "Outliers")]
    #[tabled(rename = "Outliers")]
    pub outliers: usize,
}

/// Display row for a scatter series summary.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ScatterRow {
    #[serde(rename = "Hue")]
    #[tabled(rename = "Hue")]
    pub hue: String,
    #[serde(rename = "Points")]
    #[tabled(rename = "Points")]
    pub points: usize,
    #[serde(rename = "MeanX")]
    #[tabled(rename = "MeanX")]
    pub mean_x: String,
    #[serde(rename = "MeanY")]
    #[tabled(rename = "MeanY")]
    pub mean_y: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rush_hour_boundaries_are_half_open() {
        for hour in [6, 7, 8, 9, 16, 17, 18, 19] {
            assert_eq!(TimeCategory::from_hour(hour), TimeCategory::RushHour, "hour {}", hour);
        }
        for hour in [0, 5, 10, 15, 20, 23] {
            assert_eq!(TimeCategory::from_hour(hour), TimeCategory::NonRushHour, "hour {}", hour);
        }
    }

    #[test]
    fn time_category_parses_its_labels() {
        assert_eq!("Rush Hour".parse::<TimeCategory>(), Ok(TimeCategory::RushHour));
        assert_eq!(" Non-Rush Hour ".parse::<TimeCategory>(), Ok(TimeCategory::NonRushHour));
        assert!("rush".parse::<TimeCategory>().is_err());
    }

    #[test]
    fn schema_reports_missing_columns_in_order() {
        let schema = Schema::from_headers(["dteday", "cnt", "unknown"]);
        assert!(schema.has(Column::Date));
        assert!(!schema.has(Column::Weather));
        assert_eq!(
            schema.missing(&[Column::Weather, Column::Count, Column::Hour]),
            vec![Column::Weather, Column::Hour]
        );
    }

    #[test]
    fn count_consistency() {
        let mut r = Record {
            casual: Some(3),
            registered: Some(7),
            count: Some(10),
            ..Record::default()
        };
        assert!(r.count_is_consistent());
        r.count = Some(11);
        assert!(!r.count_is_consistent());
        r.casual = None;
        assert!(r.count_is_consistent());
    }
}
