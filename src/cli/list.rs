use super::ui;
use crate::core::{RateRecord, RateSnapshot, RateTable};
use anyhow::Result;
use comfy_table::Cell;

/// Renders every known currency with its value per one unit of `base`.
pub fn render(snapshot: &RateSnapshot, base: &RateRecord) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Per 1 {}", base.code)),
    ]);

    for record in snapshot.list() {
        table.add_row(vec![
            Cell::new(&record.code),
            Cell::new(&record.name),
            ui::rate_cell(record.value_in_base),
        ]);
    }

    let mut output = format!(
        "Exchange rates: {}\n\n",
        ui::style_text(&base.name, ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{}",
        ui::style_text(
            &ui::last_updated_label(snapshot.updated_at()),
            ui::StyleType::Subtle
        )
    ));
    output
}

pub fn run(table: &RateTable) -> Result<()> {
    let snapshot = table.snapshot()?;
    println!("{}", render(&snapshot, table.base()));
    Ok(())
}
