use chrono::TimeDelta;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::core::plan::{Action, Plan};

#[must_use]
pub fn build_plan_table(plan: &Plan) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec!["Start", "End", "Action", "Price", "Rate"]);
    for action in plan.iter() {
        table.add_row(vec![
            Cell::new(action.time.format("%a %H:%M")),
            Cell::new((action.time + TimeDelta::hours(1)).format("%H:%M"))
                .add_attribute(Attribute::Dim),
            Cell::new(action.action).fg(match action.action {
                Action::Charge => Color::Green,
                Action::Discharge => Color::Red,
            }),
            Cell::new(action.price).set_alignment(CellAlignment::Right),
            Cell::new(action.rate.map_or_else(String::new, |rate| rate.to_string()))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
