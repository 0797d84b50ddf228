use crate::error::Result;
use crate::storage::{EventSummary, query_count, query_summary};
use rusqlite::Connection;
use std::path::Path;

pub fn run(file: &Path, json: bool) -> Result<()> {
    let conn = Connection::open(file)?;
    let total = query_count(&conn)?;
    let entries = query_summary(&conn)?;

    if json {
        let doc = serde_json::json!({
            "file": file.display().to_string(),
            "total": total,
            "events": entries,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_table(file, total, &entries);
    }

    Ok(())
}

fn print_table(file: &Path, total: u64, entries: &[EventSummary]) {
    println!("# {}", file.display());
    println!("# Events: {} | Distinct: {}", total, entries.len());
    println!();

    println!("{:>8}  {:>6}  {:<20}  {:<20}  EVENT", "COUNT", "SHARE", "FIRST", "LAST");
    println!("{}", "-".repeat(80));

    for entry in entries {
        println!(
            "{:>8}  {:>5.1}%  {:<20}  {:<20}  {}",
            entry.count,
            share(entry.count, total),
            format_ts(entry.first_ts),
            format_ts(entry.last_ts),
            entry.event
        );
    }
}

fn share(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share() {
        assert_eq!(share(0, 0), 0.0);
        assert_eq!(share(1, 4), 25.0);
    }
}
