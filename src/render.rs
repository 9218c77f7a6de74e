//! Terminal tables for the simulation, sweep, search, and scenario results.

use comfy_table::{Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        aggregate::{DailySummary, MonthlySummary},
        nelder_mead::SearchResult,
        plan::ActionKind,
        scenario::ScenarioReport,
        simulator::TimestepRecord,
        sweep::SweepResult,
    },
    quantity::cost::Cost,
};

fn styled() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table
}

fn cashflow_cell(cashflow: Cost) -> Cell {
    Cell::new(format!("{:+.2}", cashflow.0))
        .set_alignment(CellAlignment::Right)
        .fg(if cashflow >= Cost::ZERO { Color::Green } else { Color::Red })
}

fn ratio_cell(ratio: Option<f64>) -> Cell {
    Cell::new(ratio.map_or_else(|| "–".to_owned(), |ratio| format!("{:.0}%", ratio * 100.0)))
        .set_alignment(CellAlignment::Right)
}

pub fn monthly_table(summaries: &[MonthlySummary]) -> Table {
    let mut table = styled();
    table.set_header(vec![
        "Month",
        "Charged\nkWh",
        "Discharged\nkWh",
        "Import\nkWh",
        "Export\nkWh",
        "Cycles",
        "Self-cons.",
        "Self-suff.",
        "Cashflow\n€",
    ]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(format!("{}-{:02}", summary.year, summary.month)),
            Cell::new(format!("{:.1}", summary.charged_dc.0)),
            Cell::new(format!("{:.1}", summary.discharged_dc.0)),
            Cell::new(format!("{:.1}", summary.grid_import.0)),
            Cell::new(format!("{:.1}", summary.grid_export.0)),
            Cell::new(format!("{:.1}", summary.cycles)),
            ratio_cell(summary.self_consumption),
            ratio_cell(summary.self_sufficiency),
            cashflow_cell(summary.cashflow),
        ]);
    }
    table
}

pub fn daily_table(summaries: &[DailySummary]) -> Table {
    let mut table = styled();
    table.set_header(vec![
        "Date",
        "Charged\nkWh",
        "Discharged\nkWh",
        "Cycles",
        "SoC min\n%",
        "SoC max\n%",
        "Savings\n€",
        "Cashflow\n€",
    ]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(summary.date.to_string()),
            Cell::new(format!("{:.1}", summary.charged_dc.0)),
            Cell::new(format!("{:.1}", summary.discharged_dc.0)),
            Cell::new(format!("{:.2}", summary.cycles)),
            Cell::new(format!("{:.0}", summary.min_soc_percent)),
            Cell::new(format!("{:.0}", summary.max_soc_percent)),
            summary
                .savings
                .map_or_else(|| Cell::new("–"), cashflow_cell),
            cashflow_cell(summary.cashflow),
        ]);
    }
    table
}

pub fn intraday_table(records: &[TimestepRecord]) -> Table {
    let mut table = styled();
    table.set_header(vec![
        "Time",
        "Buy\n€/kWh",
        "Sell\n€/kWh",
        "Action",
        "DC\nkWh",
        "SoC\nkWh",
        "Import\nkWh",
        "Export\nkWh",
        "Cashflow\n€",
    ]);
    for record in records {
        let action_color = match record.kind {
            ActionKind::Charge => Color::Green,
            ActionKind::Discharge => Color::Red,
            ActionKind::Idle => Color::Reset,
        };
        table.add_row(vec![
            Cell::new(record.timestamp.format("%H:%M").to_string()),
            Cell::new(format!("{:.4}", record.buy.0)),
            Cell::new(format!("{:.4}", record.sell.0)),
            Cell::new(format!("{:?}", record.kind)).fg(action_color),
            Cell::new(format!("{:.2}", record.energy_dc.0)),
            Cell::new(format!("{:.2}", record.soc.0)),
            Cell::new(format!("{:.2}", record.grid_import.0)),
            Cell::new(format!("{:.2}", record.grid_export.0)),
            cashflow_cell(record.cashflow),
        ]);
    }
    table
}

pub fn sweep_table(result: &SweepResult) -> Table {
    let mut table = styled();
    table.set_header(vec![
        "Charge\nkW",
        "Discharge\nkW",
        "Profit\n€",
        "Cycles",
        "Profit/cycle\n€",
    ]);
    for point in &result.grid {
        let best = point.charge_power == result.best.charge_power
            && point.discharge_power == result.best.discharge_power;
        let mut row = vec![
            Cell::new(format!("{:.1}", point.charge_power.0)),
            Cell::new(format!("{:.1}", point.discharge_power.0)),
            cashflow_cell(point.profit),
            Cell::new(format!("{:.1}", point.cycles)),
            point
                .profit_per_cycle
                .map_or_else(|| Cell::new("–"), cashflow_cell),
        ];
        if best {
            row = row
                .into_iter()
                .map(|cell| cell.add_attribute(comfy_table::Attribute::Bold))
                .collect();
        }
        table.add_row(row);
    }
    table
}

pub fn search_table(result: &SearchResult) -> Table {
    let mut table = styled();
    table.set_header(vec![
        "Charge\nkW",
        "Discharge\nkW",
        "Profit\n€",
        "Cycles",
        "Iterations",
        "Evaluations",
        "Converged",
    ]);
    table.add_row(vec![
        Cell::new(format!("{:.2}", result.best.charge_power.0)),
        Cell::new(format!("{:.2}", result.best.discharge_power.0)),
        cashflow_cell(result.best.profit),
        Cell::new(format!("{:.1}", result.best.cycles)),
        Cell::new(result.iterations.to_string()),
        Cell::new(result.evaluations.to_string()),
        Cell::new(if result.converged { "yes" } else { "no" }).fg(if result.converged {
            Color::Green
        } else {
            Color::DarkYellow
        }),
    ]);
    table
}

pub fn scenario_table(report: &ScenarioReport) -> Table {
    let mut table = styled();
    table.set_header(vec!["Scenario", "Cashflow\n€", "Cycles", "Self-cons.", "Self-suff."]);
    for result in &report.completed {
        let self_consumption =
            result.monthly.iter().find_map(|summary| summary.self_consumption);
        let self_sufficiency =
            result.monthly.iter().find_map(|summary| summary.self_sufficiency);
        table.add_row(vec![
            Cell::new(result.kind.name()),
            cashflow_cell(result.total_cashflow),
            Cell::new(format!("{:.1}", result.cycles)),
            ratio_cell(self_consumption),
            ratio_cell(self_sufficiency),
        ]);
    }
    if let Some(failure) = &report.failure {
        table.add_row(vec![
            Cell::new(failure.scenario.name()).fg(Color::Red),
            Cell::new(failure.error.to_string()).fg(Color::Red),
            Cell::new("–"),
            Cell::new("–"),
            Cell::new("–"),
        ]);
    }
    table
}
