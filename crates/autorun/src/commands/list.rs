use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use autorun_core::{AutostartEntry, AutostartManager, AutostartType};

use super::fail;

pub fn execute(manager: &AutostartManager, kind: Option<AutostartType>, json: bool) {
    let listed = match kind {
        Some(kind) => manager.provider(kind).and_then(|p| p.list()),
        None => manager.list_all(),
    };
    let entries = listed.unwrap_or_else(|e| fail(e));

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(text) => println!("{text}"),
            Err(e) => fail(e),
        }
        return;
    }

    println!("{}", table(&entries));
    let disabled = entries.iter().filter(|e| !e.is_enabled).count();
    println!("\n{} entries found ({disabled} disabled)", entries.len());
}

fn table(entries: &[AutostartEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Type"),
            Cell::new("Name"),
            Cell::new("Command"),
            Cell::new("Location"),
            Cell::new("State"),
        ]);

    for entry in entries {
        let state = if entry.is_enabled {
            Cell::new("enabled").fg(Color::Green)
        } else {
            Cell::new("disabled").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(entry.kind.short_name()),
            Cell::new(&entry.name),
            Cell::new(entry.command_line()),
            Cell::new(&entry.location),
            state,
        ]);
    }
    table
}
