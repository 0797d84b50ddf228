use crate::error::Result;
use crate::storage::{StoredEvent, query_count, query_recent};
use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use rusqlite::Connection;
use std::path::Path;

pub fn run(file: &Path, limit: usize, json: bool) -> Result<()> {
    let conn = Connection::open(file)?;
    let total = query_count(&conn)?;
    let events = query_recent(&conn, limit)?;

    if json {
        print_json_lines(&events)?;
    } else {
        println!("# {} | {} events stored", file.display(), total);
        println!();
        println!("{}", render_table(&events));
    }

    Ok(())
}

fn print_json_lines(events: &[StoredEvent]) -> Result<()> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn render_table(events: &[StoredEvent]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "TIME", "EVENT", "TAGS", "TITLE", "URL"]);

    for event in events {
        let record = &event.record;
        table.add_row(vec![
            event.id.to_string(),
            format_ts(record.ts),
            record.event.clone(),
            record.tags.join(","),
            record.title.clone(),
            record.url.clone(),
        ]);
    }
    table
}

/// Format epoch seconds as UTC, falling back to the raw number
fn format_ts(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
