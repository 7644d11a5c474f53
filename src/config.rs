use crate::filter::{Dimension, FilterSelection};
use crate::view::{ComposeSettings, Tab};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

const DEFAULT_SOURCE: &str = "main_data.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Markdown tables on stdout
    Terminal,
    /// SVG charts and CSV tables under the output directory
    Svg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TabArg {
    Overview,
    Time,
    Weather,
    UserType,
    All,
}

impl TabArg {
    pub fn tabs(&self) -> Vec<Tab> {
        match self {
            TabArg::Overview => vec![Tab::Overview],
            TabArg::Time => vec![Tab::Time],
            TabArg::Weather => vec![Tab::Weather],
            TabArg::UserType => vec![Tab::UserType],
            TabArg::All => Tab::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "bike-dashboard",
    version,
    about = "Explore the bike-sharing dataset: filter by year, weather and season and chart the results"
)]
pub struct Cli {
    /// Daily-granularity CSV (e.g. day.csv)
    #[arg(long, env = "BIKE_DAILY_CSV")]
    pub daily: Option<PathBuf>,

    /// Hourly-granularity CSV (e.g. hour.csv)
    #[arg(long, env = "BIKE_HOURLY_CSV")]
    pub hourly: Option<PathBuf>,

    /// Directory for SVG charts, CSV tables and render summaries
    #[arg(short, long, default_value = "dashboard_out")]
    pub out_dir: PathBuf,

    /// Accepted year codes (0 = 2011, 1 = 2012); default is every observed year
    #[arg(long, value_delimiter = ',')]
    pub year: Option<Vec<u8>>,

    /// Accepted weather codes (1..4); default is every observed condition
    #[arg(long, value_delimiter = ',')]
    pub weather: Option<Vec<u8>>,

    /// Accepted season codes (1..4); default is every observed season
    #[arg(long, value_delimiter = ',')]
    pub season: Option<Vec<u8>>,

    /// Render these tabs and exit instead of opening the menu
    #[arg(short, long, value_enum)]
    pub tab: Option<TabArg>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Window of the rolling-mean trend, in rows
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u16).range(1..))]
    pub rolling_window: u16,

    /// Rows shown in previews and terminal tables
    #[arg(long, default_value_t = 10)]
    pub preview_rows: usize,

    /// Turn debugging information on (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Data sources in load order; falls back to `main_data.csv` when
    /// neither file is given.
    pub fn sources(&self) -> Vec<PathBuf> {
        let sources: Vec<PathBuf> = [self.daily.clone(), self.hourly.clone()]
            .into_iter()
            .flatten()
            .collect();
        if sources.is_empty() {
            vec![PathBuf::from(DEFAULT_SOURCE)]
        } else {
            sources
        }
    }

    pub fn settings(&self) -> ComposeSettings {
        ComposeSettings {
            rolling_window: usize::from(self.rolling_window),
            preview_rows: self.preview_rows,
        }
    }

    /// Selection from the command line, `None` when no filter flag was given.
    pub fn selection(&self) -> Option<FilterSelection> {
        let flags = [
            (Dimension::Year, &self.year),
            (Dimension::Weather, &self.weather),
            (Dimension::Season, &self.season),
        ];
        if flags.iter().all(|(_, v)| v.is_none()) {
            return None;
        }
        let mut selection = FilterSelection::new();
        for (dim, values) in flags {
            if let Some(values) = values {
                selection.set(dim, values.iter().copied());
            }
        }
        Some(selection)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
