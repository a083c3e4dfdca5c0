//! Terminal report for a briefing run.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::bot::BotOutcome;

/// One row of the `check` command's output.
#[derive(Debug, Clone)]
pub struct CheckItem {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl CheckItem {
    pub fn new(name: &str, ok: bool, detail: impl Into<String>) -> Self {
        CheckItem {
            name: name.to_string(),
            ok,
            detail: detail.into(),
        }
    }
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn status_cell(ok: bool, ok_text: &str, bad_text: &str) -> Cell {
    if ok {
        Cell::new(ok_text).fg(Color::Green)
    } else {
        Cell::new(bad_text).fg(Color::Red)
    }
}

fn rate_cell(outcome: &BotOutcome) -> Cell {
    match outcome.rate {
        Some(rate) if outcome.rate_accepted => Cell::new(format!("{rate}"))
            .fg(Color::Green)
            .set_alignment(CellAlignment::Right),
        Some(rate) => Cell::new(format!("{rate} (rejected)"))
            .fg(Color::Red)
            .set_alignment(CellAlignment::Right),
        None => Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
    }
}

/// Prints the per-bot run table and a one-line summary.
pub fn print_run_report(outcomes: &[BotOutcome]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Bot"),
            header_cell("Weather"),
            header_cell("News"),
            header_cell("Rate"),
            header_cell("Alert"),
            header_cell("Groups"),
        ]);

    for outcome in outcomes {
        let groups = format!("{}/{}", outcome.groups_sent, outcome.groups_total);
        table.add_row(vec![
            Cell::new(&outcome.bot_name),
            status_cell(outcome.weather_ok, "ok", "failed"),
            match outcome.news_ok {
                Some(ok) => status_cell(ok, "ok", "failed"),
                None => Cell::new("-").fg(Color::DarkGrey),
            },
            rate_cell(outcome),
            if outcome.alert_sent {
                Cell::new("sent").fg(Color::Yellow)
            } else {
                Cell::new("-").fg(Color::DarkGrey)
            },
            status_cell(outcome.groups_sent > 0, &groups, &groups),
        ]);
    }

    println!("\n{}", style("Briefing run report").bold().underlined());
    println!("{table}");

    let succeeded = outcomes.iter().filter(|o| o.groups_sent > 0).count();
    let summary = format!(
        "Briefing push complete: {succeeded}/{} bot(s) succeeded",
        outcomes.len()
    );
    if succeeded == outcomes.len() {
        println!("{}", style(summary).green().bold());
    } else {
        println!("{}", style(summary).red().bold());
    }

    for outcome in outcomes {
        if let Some(error) = &outcome.error {
            println!(
                "{}",
                style(format!("  {}: {error}", outcome.bot_name)).red()
            );
        }
    }
}

/// Prints the setup-check table and a pass/fail summary.
pub fn print_check_report(items: &[CheckItem]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Check"),
            header_cell("Status"),
            header_cell("Detail"),
        ]);

    for item in items {
        table.add_row(vec![
            Cell::new(&item.name),
            status_cell(item.ok, "ok", "failed"),
            Cell::new(&item.detail),
        ]);
    }

    println!("\n{}", style("Setup check").bold().underlined());
    println!("{table}");

    let failed = items.iter().filter(|item| !item.ok).count();
    if failed == 0 {
        println!("{}", style("All checks passed").green().bold());
    } else {
        println!(
            "{}",
            style(format!("{failed} check(s) failed")).red().bold()
        );
    }
}
