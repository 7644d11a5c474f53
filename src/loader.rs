use crate::error::{DashboardError, Result};
use crate::types::{Column, Granularity, RawRow, Record, RecordTable, Schema, TimeCategory};
use crate::util::{parse_date_safe, parse_f64_safe, parse_u32_safe, parse_u8_safe};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub derived_categories: usize,
    pub count_mismatches: usize,
    pub missing_columns: Vec<Column>,
}

/// Loaded tables keyed by source path. Lives as long as the session that
/// owns it; there is no invalidation short of dropping the cache.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<PathBuf, (Rc<RecordTable>, LoadReport)>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the table for `path`, reading it only the first time.
    pub fn load(&mut self, path: &Path) -> Result<Rc<RecordTable>> {
        if let Some((table, _)) = self.tables.get(path) {
            debug!("cache hit for {}", path.display());
            return Ok(Rc::clone(table));
        }
        let (table, report) = load_table(path)?;
        let table = Rc::new(table);
        self.tables
            .insert(path.to_path_buf(), (Rc::clone(&table), report));
        Ok(table)
    }

    pub fn report(&self, path: &Path) -> Option<&LoadReport> {
        self.tables.get(path).map(|(_, report)| report)
    }
}

/// Read one CSV source into a typed table.
///
/// Fails with `DataUnavailable` when the file cannot be opened or holds no
/// data rows. Missing columns are not an error: they are listed in the
/// report and the corresponding fields stay `None`.
pub fn load_table(path: &Path) -> Result<(RecordTable, LoadReport)> {
    let unavailable = |reason: String| DashboardError::DataUnavailable {
        path: path.to_path_buf(),
        reason,
    };
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| unavailable(e.to_string()))?;
    let headers = rdr.headers().map_err(|e| unavailable(e.to_string()))?.clone();
    let mut schema = Schema::from_headers(headers.iter());

    let granularity = if schema.has(Column::Hour) {
        Granularity::Hourly
    } else {
        Granularity::Daily
    };
    let derive_category = schema.has(Column::Hour) && !schema.has(Column::TimeCategory);
    if derive_category {
        schema.insert(Column::TimeCategory);
    }

    let mut report = LoadReport::default();
    let mut rows: Vec<Record> = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        report.total_rows += 1;
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: skipping row {}: {}", path.display(), report.total_rows, e);
                report.parse_errors += 1;
                continue;
            }
        };
        let (mut record, field_errors) = clean_row(&raw);
        if field_errors > 0 {
            report.parse_errors += 1;
        }
        if derive_category {
            if let Some(hour) = record.hour {
                record.time_category = Some(TimeCategory::from_hour(hour));
                report.derived_categories += 1;
            }
        }
        if !record.count_is_consistent() {
            report.count_mismatches += 1;
        }
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(unavailable("source holds no data rows".to_string()));
    }

    let mut expected: Vec<Column> = Column::EXPECTED.to_vec();
    expected.push(Column::Count);
    report.missing_columns = schema.missing(&expected);
    report.loaded_rows = rows.len();

    info!(
        "Loaded {} ({} granularity): {} rows, {} with parse errors",
        path.display(),
        granularity,
        report.loaded_rows,
        report.parse_errors
    );
    if !report.missing_columns.is_empty() {
        let names: Vec<&str> = report.missing_columns.iter().map(|c| c.name()).collect();
        warn!(
            "{} lacks column(s) {}; charts needing them will be skipped",
            path.display(),
            names.join(", ")
        );
    }
    if report.count_mismatches > 0 {
        warn!(
            "{}: {} row(s) where cnt != casual + registered",
            path.display(),
            report.count_mismatches
        );
    }

    let table = RecordTable {
        source: path.to_path_buf(),
        granularity,
        schema,
        rows,
    };
    Ok((table, report))
}

/// Convert raw cells into a typed record. Returns the record and the number
/// of cells that were present but could not be parsed.
fn clean_row(raw: &RawRow) -> (Record, usize) {
    let mut errors = 0usize;
    let mut check = |cell: &Option<String>, parsed: bool| {
        if !parsed && cell.as_deref().is_some_and(|s| !s.trim().is_empty()) {
            errors += 1;
        }
    };

    let instant = parse_u32_safe(raw.instant.as_deref());
    check(&raw.instant, instant.is_some());
    let date = parse_date_safe(raw.date.as_deref());
    check(&raw.date, date.is_some());
    let season = parse_u8_safe(raw.season.as_deref()).filter(|s| (1..=4).contains(s));
    check(&raw.season, season.is_some());
    let year = parse_u8_safe(raw.year.as_deref()).filter(|y| *y <= 1);
    check(&raw.year, year.is_some());
    let month = parse_u8_safe(raw.month.as_deref()).filter(|m| (1..=12).contains(m));
    check(&raw.month, month.is_some());
    let hour = parse_u8_safe(raw.hour.as_deref()).filter(|h| *h <= 23);
    check(&raw.hour, hour.is_some());
    let holiday = parse_u8_safe(raw.holiday.as_deref());
    check(&raw.holiday, holiday.is_some());
    let weekday = parse_u8_safe(raw.weekday.as_deref()).filter(|d| *d <= 6);
    check(&raw.weekday, weekday.is_some());
    let working_day = parse_u8_safe(raw.working_day.as_deref());
    check(&raw.working_day, working_day.is_some());
    let weather = parse_u8_safe(raw.weather.as_deref()).filter(|w| (1..=4).contains(w));
    check(&raw.weather, weather.is_some());
    let temp = parse_f64_safe(raw.temp.as_deref());
    check(&raw.temp, temp.is_some());
    let atemp = parse_f64_safe(raw.atemp.as_deref());
    check(&raw.atemp, atemp.is_some());
    let humidity = parse_f64_safe(raw.humidity.as_deref());
    check(&raw.humidity, humidity.is_some());
    let windspeed = parse_f64_safe(raw.windspeed.as_deref());
    check(&raw.windspeed, windspeed.is_some());
    let casual = parse_u32_safe(raw.casual.as_deref());
    check(&raw.casual, casual.is_some());
    let registered = parse_u32_safe(raw.registered.as_deref());
    check(&raw.registered, registered.is_some());
    let count = parse_u32_safe(raw.count.as_deref());
    check(&raw.count, count.is_some());
    let time_category = raw
        .time_category
        .as_deref()
        .and_then(|s| s.parse::<TimeCategory>().ok());
    check(&raw.time_category, time_category.is_some());

    let record = Record {
        instant,
        date,
        season,
        year,
        month,
        hour,
        holiday,
        weekday,
        working_day,
        weather,
        temp,
        atemp,
        humidity,
        windspeed,
        casual,
        registered,
        count,
        time_category,
    };
    (record, errors)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const HOURLY: &str = "\
instant,dteday,season,yr,mnth,hr,holiday,weekday,workingday,weathersit,temp,atemp,hum,windspeed,casual,registered,cnt
1,2011-01-01,1,0,1,6,0,6,0,1,0.24,0.2879,0.81,0,30,70,100
2,2011-01-01,1,0,1,12,0,6,0,2,0.22,0.2727,0.80,0,10,40,50
3,2011-01-01,1,0,1,18,0,6,0,1,0.22,0.2727,0.80,0,20,100,120
4,2011-01-01,1,0,1,23,0,6,0,3,0.24,0.2879,0.75,0,3,7,10
";

    #[test]
    fn loads_hourly_table_and_derives_rush_hour() {
        let file = write_csv(HOURLY);
        let (table, report) = load_table(file.path()).unwrap();
        assert_eq!(table.granularity, Granularity::Hourly);
        assert_eq!(table.len(), 4);
        assert!(table.schema.has(Column::TimeCategory));
        assert_eq!(report.derived_categories, 4);
        assert_eq!(report.parse_errors, 0);
        assert_eq!(report.count_mismatches, 0);
        assert!(report.missing_columns.is_empty());
        let categories: Vec<_> = table.rows.iter().map(|r| r.time_category).collect();
        assert_eq!(
            categories,
            vec![
                Some(TimeCategory::RushHour),
                Some(TimeCategory::NonRushHour),
                Some(TimeCategory::RushHour),
                Some(TimeCategory::NonRushHour),
            ]
        );
        assert_eq!(
            table.rows[0].date,
            chrono::NaiveDate::from_ymd_opt(2011, 1, 1)
        );
    }

    #[test]
    fn every_loaded_row_satisfies_count_invariant() {
        let file = write_csv(HOURLY);
        let (table, _) = load_table(file.path()).unwrap();
        assert!(table.rows.iter().all(Record::count_is_consistent));
    }

    #[test]
    fn keeps_existing_time_category() {
        let file = write_csv("hr,cnt,time_category\n7,5,Non-Rush Hour\n");
        let (table, report) = load_table(file.path()).unwrap();
        assert_eq!(report.derived_categories, 0);
        assert_eq!(table.rows[0].time_category, Some(TimeCategory::NonRushHour));
    }

    #[test]
    fn float_formatted_counts_load() {
        let file = write_csv("casual,registered,cnt\n331.0,654.0,985.0\n");
        let (table, report) = load_table(file.path()).unwrap();
        assert_eq!(report.parse_errors, 0);
        assert_eq!(table.rows[0].count, Some(985));
        assert_eq!(report.count_mismatches, 0);
    }

    #[test]
    fn missing_weather_column_is_not_an_error() {
        let file = write_csv("dteday,yr,season,cnt\n2011-01-01,0,1,985\n2011-01-02,0,1,801\n");
        let (table, report) = load_table(file.path()).unwrap();
        assert_eq!(table.granularity, Granularity::Daily);
        assert!(!table.schema.has(Column::Weather));
        assert!(report.missing_columns.contains(&Column::Weather));
        assert!(table.rows.iter().all(|r| r.weather.is_none()));
    }

    #[test]
    fn counts_invariant_violations_and_bad_cells() {
        let file = write_csv("casual,registered,cnt,temp\n1,2,3,0.5\n1,2,4,abc\n");
        let (table, report) = load_table(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(report.count_mismatches, 1);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(table.rows[1].temp, None);
    }

    #[test]
    fn empty_or_missing_source_is_unavailable() {
        let file = write_csv("dteday,cnt\n");
        assert!(matches!(
            load_table(file.path()),
            Err(DashboardError::DataUnavailable { .. })
        ));
        assert!(matches!(
            load_table(Path::new("/definitely/not/here.csv")),
            Err(DashboardError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn cache_returns_same_table_without_rereading() {
        let file = write_csv(HOURLY);
        let mut cache = TableCache::new();
        let first = cache.load(file.path()).unwrap();
        // A changed file must not be re-read while cached.
        std::fs::write(file.path(), "hr,cnt\n1,1\n").unwrap();
        let second = cache.load(file.path()).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 4);
        assert_eq!(cache.report(file.path()).map(|r| r.loaded_rows), Some(4));
    }
}
