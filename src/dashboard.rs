// Session state shared by the interactive menu and batch mode.
//
// Loaded tables are cached for the life of the session and never mutated;
// every render filters the cached tables afresh. Each selection change bumps
// a generation counter and a view computed for an older generation is
// dropped instead of drawn.
use crate::error::Result;
use crate::filter::{self, FilterOptions, FilterSelection};
use crate::loader::{LoadReport, TableCache};
use crate::types::RecordTable;
use crate::view::{self, ComposeSettings, Tab, ViewRender};
use log::{debug, info};
use std::path::PathBuf;
use std::rc::Rc;

pub struct Dashboard {
    cache: TableCache,
    sources: Vec<PathBuf>,
    settings: ComposeSettings,
    selection: Option<FilterSelection>,
    generation: u64,
}

impl Dashboard {
    pub fn new(sources: Vec<PathBuf>, settings: ComposeSettings) -> Self {
        Dashboard {
            cache: TableCache::new(),
            sources,
            settings,
            selection: None,
            generation: 0,
        }
    }

    /// Load (or fetch from cache) every source. Any unavailable source is
    /// fatal.
    pub fn tables(&mut self) -> Result<Vec<Rc<RecordTable>>> {
        let mut tables = Vec::with_capacity(self.sources.len());
        for path in &self.sources {
            tables.push(self.cache.load(path)?);
        }
        Ok(tables)
    }

    pub fn load_reports(&mut self) -> Result<Vec<(PathBuf, LoadReport)>> {
        self.tables()?;
        Ok(self
            .sources
            .iter()
            .filter_map(|p| self.cache.report(p).map(|r| (p.clone(), r.clone())))
            .collect())
    }

    pub fn options(&mut self) -> Result<FilterOptions> {
        let tables = self.tables()?;
        let refs: Vec<&RecordTable> = tables.iter().map(Rc::as_ref).collect();
        Ok(FilterOptions::from_tables(&refs))
    }

    /// The active selection; every observed value until the user narrows it.
    pub fn selection(&mut self) -> Result<FilterSelection> {
        match &self.selection {
            Some(sel) => Ok(sel.clone()),
            None => Ok(self.options()?.default_selection()),
        }
    }

    /// Replace the selection, restricted to observed values. Invalidates
    /// every view composed before the call.
    pub fn set_selection(&mut self, mut selection: FilterSelection) -> Result<u64> {
        let options = self.options()?;
        selection.restrict_to(&options);
        info!("Filter selection: {}", selection);
        self.selection = Some(selection);
        self.generation += 1;
        Ok(self.generation)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, view: &ViewRender) -> bool {
        view.generation == self.generation
    }

    /// One render pass for a tab: load if needed, filter, compose.
    pub fn compose(&mut self, tab: Tab) -> Result<ViewRender> {
        let selection = self.selection()?;
        let tables = self.tables()?;
        let filtered: Vec<RecordTable> = tables
            .iter()
            .map(|t| filter::apply(t, &selection))
            .collect();
        let refs: Vec<&RecordTable> = filtered.iter().collect();
        debug!("composing {} for generation {}", tab.slug(), self.generation);
        Ok(view::compose(
            tab,
            &refs,
            &self.settings,
            self.generation,
            selection.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Dimension;
    use crate::loader::tests::write_csv;
    use crate::view::{ChartData, ChartId, SlotState};

    const DAY: &str = "\
dteday,season,yr,mnth,weathersit,temp,hum,casual,registered,cnt
2011-01-01,1,0,1,2,0.34,0.80,331,654,985
2011-01-02,1,0,1,2,0.36,0.69,131,670,801
2012-01-01,1,1,1,1,0.37,0.69,686,1608,2294
";

    #[test]
    fn selection_change_invalidates_older_views() {
        let file = write_csv(DAY);
        let mut dash = Dashboard::new(vec![file.path().to_path_buf()], ComposeSettings::default());
        let before = dash.compose(Tab::Time).unwrap();
        assert!(dash.is_current(&before));
        dash.set_selection(FilterSelection::new().with(Dimension::Year, [1])).unwrap();
        assert!(!dash.is_current(&before));
        let after = dash.compose(Tab::Time).unwrap();
        assert!(dash.is_current(&after));
        match &after.slot(ChartId::DailyTrend).unwrap().state {
            SlotState::Rendered { data: ChartData::Grouped(g), .. } => assert_eq!(g.rows.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn default_selection_keeps_all_rows_and_filters_do_not_touch_cache() {
        let file = write_csv(DAY);
        let mut dash = Dashboard::new(vec![file.path().to_path_buf()], ComposeSettings::default());
        dash.set_selection(FilterSelection::new().with(Dimension::Weather, [])).unwrap();
        let empty = dash.compose(Tab::Overview).unwrap();
        match &empty.slot(ChartId::DataPreview).unwrap().state {
            SlotState::Rendered { data, .. } => assert!(data.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dash.tables().unwrap()[0].len(), 3);
        let all = dash.options().unwrap().default_selection();
        dash.set_selection(all).unwrap();
        let view = dash.compose(Tab::Overview).unwrap();
        match &view.slot(ChartId::DataPreview).unwrap().state {
            SlotState::Rendered { data: ChartData::Preview(rows), .. } => assert_eq!(rows.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    fn preview_len(view: &ViewRender) -> usize {
        match &view.slot(ChartId::DataPreview).unwrap().state {
            SlotState::Rendered { data: ChartData::Preview(rows), .. } => rows.len(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn blank_weather_cell_survives_default_and_full_selections() {
        let file = write_csv(
            "dteday,yr,weathersit,cnt\n2011-01-01,0,1,985\n2011-01-02,0,,801\n",
        );
        let mut dash = Dashboard::new(vec![file.path().to_path_buf()], ComposeSettings::default());
        assert_eq!(preview_len(&dash.compose(Tab::Overview).unwrap()), 2);

        dash.set_selection(FilterSelection::new().with(Dimension::Year, [0])).unwrap();
        assert_eq!(preview_len(&dash.compose(Tab::Overview).unwrap()), 2);

        dash.set_selection(FilterSelection::new().with(Dimension::Weather, [1])).unwrap();
        assert_eq!(preview_len(&dash.compose(Tab::Overview).unwrap()), 2);

        dash.set_selection(FilterSelection::new().with(Dimension::Weather, [])).unwrap();
        assert_eq!(preview_len(&dash.compose(Tab::Overview).unwrap()), 0);
    }

    #[test]
    fn load_reports_cover_every_source() {
        let file = write_csv(DAY);
        let mut dash = Dashboard::new(vec![file.path().to_path_buf()], ComposeSettings::default());
        let reports = dash.load_reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1.loaded_rows, 3);
        assert_eq!(reports[0].1.count_mismatches, 0);
    }
}
