use crate::error::Result;
use rusqlite::Connection;
use rusqlite::types::Value;
use std::path::Path;

pub fn run(file: &Path, sql: &str) -> Result<()> {
    let conn = Connection::open(file)?;
    for line in execute(&conn, sql)? {
        println!("{line}");
    }
    Ok(())
}

/// Run `sql` and render a header line plus one tab-separated line per row
pub fn execute(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;

    let column_count = stmt.column_count();
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut lines = vec![column_names.join("\t")];

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values: Vec<String> = (0..column_count)
            .map(|i| {
                row.get::<_, Value>(i)
                    .map(|v| format_value(&v))
                    .unwrap_or_else(|_| "NULL".to_string())
            })
            .collect();
        lines.push(values.join("\t"));
    }

    Ok(lines)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:.6}", f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_renders_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tracks (event TEXT, tags TEXT, ts INTEGER);
             INSERT INTO tracks VALUES ('click', '[\"a\"]', 10);
             INSERT INTO tracks VALUES ('scroll', NULL, 11);",
        )
        .unwrap();

        let lines = execute(&conn, "SELECT event, tags, ts FROM tracks ORDER BY ts").unwrap();
        assert_eq!(
            lines,
            vec!["event\ttags\tts", "click\t[\"a\"]\t10", "scroll\tNULL\t11"]
        );
    }

    #[test]
    fn test_bad_sql_is_database_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = execute(&conn, "SELEC nothing").unwrap_err();
        assert!(matches!(err, crate::Error::Database(_)));
    }
}
