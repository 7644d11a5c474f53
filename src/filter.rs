// Row filtering driven by the year / weather / season selections.
use crate::types::{Column, Record, RecordTable};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A dimension the user can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dimension {
    Year,
    Weather,
    Season,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Year, Dimension::Weather, Dimension::Season];

    pub fn column(&self) -> Column {
        match self {
            Dimension::Year => Column::Year,
            Dimension::Weather => Column::Weather,
            Dimension::Season => Column::Season,
        }
    }

    fn value(&self, record: &Record) -> Option<u8> {
        match self {
            Dimension::Year => record.year,
            Dimension::Weather => record.weather,
            Dimension::Season => record.season,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Dimension::Year => "Years (0 = 2011, 1 = 2012)",
            Dimension::Weather => "Weather (1 = clear, 2 = mist/cloudy, 3 = light rain/snow, 4 = heavy rain/snow)",
            Dimension::Season => "Seasons (1 = spring, 2 = summer, 3 = fall, 4 = winter)",
        }
    }

    /// Human label for a code of this dimension.
    pub fn label(&self, code: u8) -> String {
        let name = match (self, code) {
            (Dimension::Year, 0) => "2011",
            (Dimension::Year, 1) => "2012",
            (Dimension::Season, 1) => "Spring",
            (Dimension::Season, 2) => "Summer",
            (Dimension::Season, 3) => "Fall",
            (Dimension::Season, 4) => "Winter",
            (Dimension::Weather, 1) => "Clear",
            (Dimension::Weather, 2) => "Mist/Cloudy",
            (Dimension::Weather, 3) => "Light Snow/Rain",
            (Dimension::Weather, 4) => "Heavy Rain/Snow",
            _ => return code.to_string(),
        };
        name.to_string()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Year => f.write_str("year"),
            Dimension::Weather => f.write_str("weather"),
            Dimension::Season => f.write_str("season"),
        }
    }
}

/// Sorted distinct values per dimension over every loaded table. A
/// dimension no table carries has no entry, and no control is offered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    values: BTreeMap<Dimension, BTreeSet<u8>>,
}

impl FilterOptions {
    pub fn from_tables(tables: &[&RecordTable]) -> Self {
        let mut values: BTreeMap<Dimension, BTreeSet<u8>> = BTreeMap::new();
        for table in tables {
            for dim in Dimension::ALL {
                if !table.schema.has(dim.column()) {
                    continue;
                }
                let set = values.entry(dim).or_default();
                set.extend(table.rows.iter().filter_map(|r| dim.value(r)));
            }
        }
        FilterOptions { values }
    }

    pub fn get(&self, dim: Dimension) -> Option<&BTreeSet<u8>> {
        self.values.get(&dim)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.values.keys().copied()
    }

    /// Everything observed, the initial state of every control. No
    /// dimension is constrained, so rows with a blank code are kept too.
    pub fn default_selection(&self) -> FilterSelection {
        FilterSelection::new()
    }
}

/// Accepted values per dimension. A dimension without an entry is not
/// filtered; a dimension with an empty set rejects every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    accepted: BTreeMap<Dimension, BTreeSet<u8>>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, dim: Dimension, values: impl IntoIterator<Item = u8>) -> Self {
        self.set(dim, values);
        self
    }

    pub fn set(&mut self, dim: Dimension, values: impl IntoIterator<Item = u8>) {
        self.accepted.insert(dim, values.into_iter().collect());
    }

    pub fn get(&self, dim: Dimension) -> Option<&BTreeSet<u8>> {
        self.accepted.get(&dim)
    }

    /// Drop values and dimensions that were never observed so the
    /// selection stays a subset of `options`. A dimension that accepts every
    /// observed value is unset again, which also keeps rows whose code is
    /// blank.
    pub fn restrict_to(&mut self, options: &FilterOptions) {
        self.accepted.retain(|dim, values| match options.get(*dim) {
            Some(observed) => {
                let unknown: Vec<u8> = values.difference(observed).copied().collect();
                if !unknown.is_empty() {
                    warn!("ignoring unobserved {} value(s) {:?}", dim, unknown);
                    values.retain(|v| observed.contains(v));
                }
                if !observed.is_empty() && *values == *observed {
                    debug!("{} selection covers every observed value", dim);
                    return false;
                }
                true
            }
            None => {
                warn!("no loaded table has a {} column; ignoring its selection", dim);
                false
            }
        });
    }

    fn accepts(&self, table: &RecordTable, record: &Record) -> bool {
        self.accepted.iter().all(|(dim, values)| {
            if !table.schema.has(dim.column()) {
                return true;
            }
            dim.value(record).is_some_and(|v| values.contains(&v))
        })
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .accepted
            .iter()
            .map(|(dim, values)| {
                let labels: Vec<String> = values.iter().map(|v| dim.label(*v)).collect();
                format!("{}: [{}]", dim, labels.join(", "))
            })
            .collect();
        if parts.is_empty() {
            f.write_str("(no filters)")
        } else {
            f.write_str(&parts.join("; "))
        }
    }
}

/// Rows of `table` accepted on every selected dimension the table carries.
/// The input is left untouched.
pub fn apply(table: &RecordTable, selection: &FilterSelection) -> RecordTable {
    let rows: Vec<Record> = table
        .rows
        .iter()
        .filter(|r| selection.accepts(table, r))
        .cloned()
        .collect();
    debug!(
        "filter on {}: kept {} of {} rows",
        table.label(),
        rows.len(),
        table.len()
    );
    table.with_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Granularity, Schema};
    use std::path::PathBuf;

    fn table() -> RecordTable {
        let row = |year, season, weather| Record {
            year: Some(year),
            season: Some(season),
            weather: Some(weather),
            count: Some(10),
            ..Record::default()
        };
        RecordTable {
            source: PathBuf::from("day.csv"),
            granularity: Granularity::Daily,
            schema: Schema::from_headers(["yr", "season", "weathersit", "cnt"]),
            rows: vec![row(0, 1, 1), row(0, 2, 2), row(1, 1, 1), row(1, 3, 3), row(1, 4, 1)],
        }
    }

    #[test]
    fn filters_single_year_and_partitions_rows() {
        let t = table();
        let sel = FilterSelection::new().with(Dimension::Year, [0]);
        let kept = apply(&t, &sel);
        assert!(kept.rows.iter().all(|r| r.year == Some(0)));
        let dropped = t.rows.iter().filter(|r| r.year != Some(0)).count();
        assert_eq!(kept.len() + dropped, t.len());
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn conjunction_across_dimensions() {
        let t = table();
        let sel = FilterSelection::new()
            .with(Dimension::Year, [1])
            .with(Dimension::Weather, [1, 2]);
        let kept = apply(&t, &sel);
        assert_eq!(kept.len(), 2);
        assert!(kept.rows.iter().all(|r| r.year == Some(1) && r.weather == Some(1)));
    }

    #[test]
    fn empty_accepted_set_yields_no_rows() {
        let t = table();
        let sel = FilterSelection::new().with(Dimension::Season, []);
        assert!(apply(&t, &sel).is_empty());
    }

    #[test]
    fn dimension_absent_from_table_is_ignored() {
        let mut t = table();
        t.schema = Schema::from_headers(["yr", "season", "cnt"]);
        let sel = FilterSelection::new().with(Dimension::Weather, [4]);
        assert_eq!(apply(&t, &sel).len(), 5);
    }

    #[test]
    fn options_are_sorted_distinct_union() {
        let t = table();
        let mut other = table();
        other.rows[0].season = Some(4);
        other.schema = Schema::from_headers(["season"]);
        let opts = FilterOptions::from_tables(&[&t, &other]);
        assert_eq!(opts.get(Dimension::Year).unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(
            opts.get(Dimension::Weather).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let all = apply(&t, &opts.default_selection());
        assert_eq!(all.len(), t.len());
    }

    #[test]
    fn restrict_drops_unobserved_values() {
        let t = table();
        let mut only_year = t.clone();
        only_year.schema = Schema::from_headers(["yr"]);
        let opts = FilterOptions::from_tables(&[&only_year]);
        let mut sel = FilterSelection::new()
            .with(Dimension::Year, [0, 7])
            .with(Dimension::Weather, [1]);
        sel.restrict_to(&opts);
        assert_eq!(sel.get(Dimension::Year).map(|s| s.len()), Some(1));
        assert_eq!(sel.get(Dimension::Weather), None);
    }

    #[test]
    fn full_observed_set_keeps_rows_with_blank_codes() {
        let mut t = table();
        t.rows[4].weather = None;
        let opts = FilterOptions::from_tables(&[&t]);
        assert_eq!(apply(&t, &opts.default_selection()).len(), 5);

        let mut sel = FilterSelection::new().with(Dimension::Weather, [1, 2, 3]);
        sel.restrict_to(&opts);
        assert_eq!(sel.get(Dimension::Weather), None);
        assert_eq!(apply(&t, &sel).len(), 5);

        // a narrowed selection still drops the blank row
        let mut narrowed = FilterSelection::new().with(Dimension::Weather, [1, 3]);
        narrowed.restrict_to(&opts);
        assert_eq!(apply(&t, &narrowed).len(), 3);
    }

    #[test]
    fn explicit_empty_set_survives_restrict() {
        let t = table();
        let opts = FilterOptions::from_tables(&[&t]);
        let mut sel = FilterSelection::new().with(Dimension::Season, []);
        sel.restrict_to(&opts);
        assert!(apply(&t, &sel).is_empty());
    }

    #[test]
    fn filtering_is_pure() {
        let t = table();
        let before = t.rows.clone();
        let _ = apply(&t, &FilterSelection::new().with(Dimension::Year, []));
        assert_eq!(t.rows, before);
    }
}
