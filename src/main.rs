// Entry point and high-level CLI flow.
//
// With `--tab` the selected views are rendered once and the program exits.
// Otherwise an interactive menu runs:
// - Option [1] prints the load diagnostics of the CSV source(s), which are
//   read once at startup.
// - Option [2] sets the year / weather / season filters.
// - Option [3] renders one tab (or all of them) to the chosen surface.
// After a render the user can go back to the menu or exit.
mod aggregate;
mod config;
mod dashboard;
mod error;
mod filter;
mod loader;
mod output;
mod render;
mod svg;
mod types;
mod util;
mod view;

use anyhow::Context;
use clap::Parser;
use config::{Cli, OutputFormat};
use dashboard::Dashboard;
use filter::{Dimension, FilterSelection};
use log::{info, warn};
use render::{render_view, RenderSurface, TerminalSurface};
use std::io::{self, Write};
use svg::SvgSurface;
use view::Tab;

/// Read a single line of input after printing `label`.
fn read_line(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Ask whether to go back to the menu after a render.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        let resp = read_line("Back to Dashboard Menu (Y/N): ").to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: print a short load summary per source.
fn handle_load(dash: &mut Dashboard) -> error::Result<()> {
    for (path, report) in dash.load_reports()? {
        println!(
            "Processing {}... ({} rows read, {} loaded)",
            path.display(),
            util::format_int(report.total_rows as u64),
            util::format_int(report.loaded_rows as u64)
        );
        if report.parse_errors > 0 {
            println!(
                "Note: {} rows had unparseable cells; those cells were left blank.",
                util::format_int(report.parse_errors as u64)
            );
        }
        if report.derived_categories > 0 {
            println!(
                "Info: Derived time_category for {} rows.",
                util::format_int(report.derived_categories as u64)
            );
        }
        if report.count_mismatches > 0 {
            println!(
                "Warning: {} rows where casual + registered != cnt.",
                util::format_int(report.count_mismatches as u64)
            );
        }
        if !report.missing_columns.is_empty() {
            println!(
                "Info: Missing column(s): {}; charts that need them will be skipped.",
                error::format_columns(&report.missing_columns)
            );
        }
    }
    println!();
    Ok(())
}

/// Handle option [2]: prompt once per available dimension. Blank input
/// keeps every observed value.
fn handle_filters(dash: &mut Dashboard) -> error::Result<()> {
    let options = dash.options()?;
    let current = dash.selection()?;
    let mut selection = FilterSelection::new();
    for dim in options.dimensions().collect::<Vec<Dimension>>() {
        let observed = options.get(dim).cloned().unwrap_or_default();
        let labels: Vec<String> = observed
            .iter()
            .map(|v| format!("{}={}", v, dim.label(*v)))
            .collect();
        println!("{}", dim.prompt());
        println!("Available: {}", labels.join(", "));
        match current.get(dim) {
            Some(active) => {
                let active: Vec<String> = active.iter().map(|v| v.to_string()).collect();
                println!("Current: {}", active.join(", "));
            }
            None => println!("Current: all"),
        }
        loop {
            let input = read_line("Values (comma-separated, blank for all): ");
            if input.is_empty() {
                break;
            }
            match util::parse_value_list(&input) {
                Ok(values) => {
                    selection.set(dim, values);
                    break;
                }
                Err(e) => println!("Invalid input: {}", e),
            }
        }
    }
    let generation = dash.set_selection(selection)?;
    println!(
        "Filters applied: {} (generation {})\n",
        dash.selection()?,
        generation
    );
    Ok(())
}

fn render_tabs(
    dash: &mut Dashboard,
    tabs: &[Tab],
    surface: &mut dyn RenderSurface,
) -> error::Result<()> {
    for tab in tabs {
        let view = dash.compose(*tab)?;
        if !dash.is_current(&view) {
            warn!("discarding stale {} view (generation {})", tab.slug(), view.generation);
            continue;
        }
        render_view(&view, surface)?;
    }
    Ok(())
}

/// Render `tabs` to the surface picked by `--format`.
fn render_to_output(dash: &mut Dashboard, tabs: &[Tab], cli: &Cli) -> error::Result<()> {
    match cli.format {
        OutputFormat::Terminal => {
            render_tabs(dash, tabs, &mut TerminalSurface::new(cli.preview_rows))
        }
        OutputFormat::Svg => {
            let mut surface = SvgSurface::new(&cli.out_dir);
            render_tabs(dash, tabs, &mut surface)?;
            println!(
                "({} file(s) exported to {})\n",
                surface.written().len(),
                cli.out_dir.display()
            );
            Ok(())
        }
    }
}

/// Handle option [3]: pick a tab and render it.
fn handle_render(dash: &mut Dashboard, cli: &Cli) -> error::Result<bool> {
    println!("Select View:");
    for (i, tab) in Tab::ALL.iter().enumerate() {
        println!("[{}] {}", i + 1, tab.title());
    }
    println!("[{}] All tabs\n", Tab::ALL.len() + 1);
    let choice = read_choice();
    let tabs: Vec<Tab> = match choice.parse::<usize>() {
        Ok(n) if (1..=Tab::ALL.len()).contains(&n) => vec![Tab::ALL[n - 1]],
        Ok(n) if n == Tab::ALL.len() + 1 => Tab::ALL.to_vec(),
        _ => {
            println!("Invalid choice. Please enter 1 to {}.\n", Tab::ALL.len() + 1);
            return Ok(false);
        }
    };
    println!();
    render_to_output(dash, &tabs, cli)?;
    Ok(true)
}

fn run_menu(dash: &mut Dashboard, cli: &Cli) {
    loop {
        println!("Bike Sharing Dashboard:");
        println!("[1] Show load summary");
        println!("[2] Set filters");
        println!("[3] Render a view\n");
        let result = match read_choice().as_str() {
            "1" => handle_load(dash).map(|_| None),
            "2" => handle_filters(dash).map(|_| None),
            "3" => {
                println!();
                handle_render(dash, cli).map(Some)
            }
            _ => {
                println!("Invalid choice. Please enter 1, 2 or 3.\n");
                Ok(None)
            }
        };
        match result {
            Ok(Some(true)) => {
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let mut dash = Dashboard::new(cli.sources(), cli.settings());
    let tables = dash.tables().context("cannot load dashboard data")?;
    info!("loaded {} table(s)", tables.len());
    if let Some(selection) = cli.selection() {
        dash.set_selection(selection)
            .context("failed to apply command-line filters")?;
    }

    match cli.tab {
        Some(tab) => {
            render_to_output(&mut dash, &tab.tabs(), &cli).context("rendering failed")?;
        }
        None => run_menu(&mut dash, &cli),
    }
    Ok(())
}
