use crate::error::Result;
use crate::output::chart_markdown;
use crate::view::{ChartData, ChartId, ChartSpec, SlotState, Tab, ViewRender};
use log::{error, info};
use serde::Serialize;

/// Something a composed view can be drawn on. The pipeline only hands over
/// tables and chart metadata; how they are drawn is up to the surface.
pub trait RenderSurface {
    fn begin_view(&mut self, _view: &ViewRender) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, tab: Tab, spec: &ChartSpec, data: &ChartData) -> Result<()>;

    /// Shown in place of a chart whose precondition failed.
    fn notice(&mut self, tab: Tab, spec: &ChartSpec, notice: &str) -> Result<()>;

    fn end_view(&mut self, _summary: &RenderSummary) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotOutcome {
    Rendered,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    pub chart: ChartId,
    pub title: &'static str,
    pub outcome: SlotOutcome,
    pub empty: bool,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderSummary {
    pub tab: Tab,
    pub generation: u64,
    pub selection: String,
    pub slots: Vec<SlotSummary>,
}

impl RenderSummary {
    pub fn count(&self, outcome: SlotOutcome) -> usize {
        self.slots.iter().filter(|s| s.outcome == outcome).count()
    }
}

/// Draw every slot of `view`. A chart or notice that fails to draw is
/// recorded as failed and the remaining slots are still drawn.
pub fn render_view(view: &ViewRender, surface: &mut dyn RenderSurface) -> Result<RenderSummary> {
    surface.begin_view(view)?;
    let mut slots = Vec::with_capacity(view.slots.len());
    for slot in &view.slots {
        let summary = match &slot.state {
            SlotState::Rendered { data, .. } => match surface.draw(view.tab, slot.spec, data) {
                Ok(()) => SlotSummary {
                    chart: slot.spec.id,
                    title: slot.spec.title,
                    outcome: SlotOutcome::Rendered,
                    empty: data.is_empty(),
                    notice: None,
                },
                Err(e) => {
                    error!("{}: {}", slot.spec.slug, e);
                    SlotSummary {
                        chart: slot.spec.id,
                        title: slot.spec.title,
                        outcome: SlotOutcome::Failed,
                        empty: data.is_empty(),
                        notice: Some(e.to_string()),
                    }
                }
            },
            SlotState::Skipped { notice } => match surface.notice(view.tab, slot.spec, notice) {
                Ok(()) => SlotSummary {
                    chart: slot.spec.id,
                    title: slot.spec.title,
                    outcome: SlotOutcome::Skipped,
                    empty: true,
                    notice: Some(notice.clone()),
                },
                Err(e) => {
                    error!("{}: {}", slot.spec.slug, e);
                    SlotSummary {
                        chart: slot.spec.id,
                        title: slot.spec.title,
                        outcome: SlotOutcome::Failed,
                        empty: true,
                        notice: Some(format!("{} ({})", notice, e)),
                    }
                }
            },
        };
        slots.push(summary);
    }
    let summary = RenderSummary {
        tab: view.tab,
        generation: view.generation,
        selection: view.selection.clone(),
        slots,
    };
    info!(
        "{}: {} rendered, {} skipped, {} failed",
        view.tab,
        summary.count(SlotOutcome::Rendered),
        summary.count(SlotOutcome::Skipped),
        summary.count(SlotOutcome::Failed)
    );
    surface.end_view(&summary)?;
    Ok(summary)
}

/// Prints each chart's table as markdown on stdout.
pub struct TerminalSurface {
    max_rows: usize,
}

impl TerminalSurface {
    pub fn new(max_rows: usize) -> Self {
        TerminalSurface { max_rows }
    }
}

impl RenderSurface for TerminalSurface {
    fn begin_view(&mut self, view: &ViewRender) -> Result<()> {
        println!("=== {} ===", view.tab.title());
        println!("(Filters: {})\n", view.selection);
        Ok(())
    }

    fn draw(&mut self, _tab: Tab, spec: &ChartSpec, data: &ChartData) -> Result<()> {
        println!("{}", spec.title);
        if !spec.x_label.is_empty() {
            println!("({} vs {})", spec.y_label, spec.x_label);
        }
        println!();
        println!("{}\n", chart_markdown(data, self.max_rows));
        Ok(())
    }

    fn notice(&mut self, _tab: Tab, spec: &ChartSpec, notice: &str) -> Result<()> {
        println!("{}\n", spec.title);
        println!("Note: {}\n", notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::types::{Granularity, Record, RecordTable, Schema};
    use crate::view::{compose, ComposeSettings};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    /// Records what was drawn; optionally fails on one chart.
    #[derive(Default)]
    struct RecordingSurface {
        drawn: Vec<ChartId>,
        notices: Vec<ChartId>,
        fail_on: Option<ChartId>,
        ended: bool,
    }

    impl RenderSurface for RecordingSurface {
        fn draw(&mut self, _tab: Tab, spec: &ChartSpec, _data: &ChartData) -> Result<()> {
            if self.fail_on == Some(spec.id) {
                return Err(DashboardError::Render {
                    chart: spec.slug.to_string(),
                    reason: "boom".to_string(),
                });
            }
            self.drawn.push(spec.id);
            Ok(())
        }

        fn notice(&mut self, _tab: Tab, spec: &ChartSpec, _notice: &str) -> Result<()> {
            if self.fail_on == Some(spec.id) {
                return Err(DashboardError::Render {
                    chart: spec.slug.to_string(),
                    reason: "disk full".to_string(),
                });
            }
            self.notices.push(spec.id);
            Ok(())
        }

        fn end_view(&mut self, _summary: &RenderSummary) -> Result<()> {
            self.ended = true;
            Ok(())
        }
    }

    fn weatherless_day() -> RecordTable {
        RecordTable {
            source: PathBuf::from("day.csv"),
            granularity: Granularity::Daily,
            schema: Schema::from_headers(["dteday", "temp", "hum", "cnt"]),
            rows: vec![Record {
                date: NaiveDate::from_ymd_opt(2011, 1, 1),
                temp: Some(0.3),
                humidity: Some(0.6),
                count: Some(985),
                ..Record::default()
            }],
        }
    }

    #[test]
    fn skipped_slot_gets_a_notice_and_siblings_draw() {
        let t = weatherless_day();
        let view = compose(Tab::Weather, &[&t], &ComposeSettings::default(), 0, String::new());
        let mut surface = RecordingSurface::default();
        let summary = render_view(&view, &mut surface).unwrap();
        assert_eq!(surface.notices, vec![ChartId::WeatherBox]);
        assert_eq!(surface.drawn, vec![ChartId::TempScatter, ChartId::HumidityScatter]);
        assert_eq!(summary.count(SlotOutcome::Skipped), 1);
        assert_eq!(summary.count(SlotOutcome::Rendered), 2);
    }

    #[test]
    fn draw_failure_does_not_abort_view() {
        let t = weatherless_day();
        let view = compose(Tab::Weather, &[&t], &ComposeSettings::default(), 0, String::new());
        let mut surface = RecordingSurface {
            fail_on: Some(ChartId::TempScatter),
            ..RecordingSurface::default()
        };
        let summary = render_view(&view, &mut surface).unwrap();
        assert_eq!(surface.drawn, vec![ChartId::HumidityScatter]);
        assert_eq!(summary.count(SlotOutcome::Failed), 1);
    }

    #[test]
    fn notice_failure_does_not_abort_view() {
        let t = weatherless_day();
        let view = compose(Tab::Weather, &[&t], &ComposeSettings::default(), 0, String::new());
        let mut surface = RecordingSurface {
            fail_on: Some(ChartId::WeatherBox),
            ..RecordingSurface::default()
        };
        let summary = render_view(&view, &mut surface).unwrap();
        assert!(surface.notices.is_empty());
        assert_eq!(surface.drawn, vec![ChartId::TempScatter, ChartId::HumidityScatter]);
        assert_eq!(summary.slots[0].outcome, SlotOutcome::Failed);
        assert!(summary.slots[0].notice.as_deref().unwrap().contains("disk full"));
        assert_eq!(summary.count(SlotOutcome::Rendered), 2);
        assert!(surface.ended);
    }

    #[test]
    fn summary_serializes_outcomes() {
        let t = weatherless_day();
        let view = compose(Tab::Weather, &[&t], &ComposeSettings::default(), 4, "(no filters)".to_string());
        let summary = render_view(&view, &mut RecordingSurface::default()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["generation"], 4);
        assert_eq!(json["slots"][0]["outcome"], "skipped");
        assert_eq!(json["slots"][1]["outcome"], "rendered");
    }
}
