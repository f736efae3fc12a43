use rusqlite::types::Value;
use rusqlite::{Connection, Statement};

use crate::error::SqlHandlesError;
use crate::results::{QueryResult, ResultSet};
use crate::types::RowValues;

/// Extract one cell as a text-protocol value: numbers arrive as their decimal text.
pub(crate) fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlHandlesError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Text(i.to_string()),
        Value::Real(f) => RowValues::Text(f.to_string()),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

fn build_result_set(stmt: &mut Statement<'_>) -> Result<ResultSet, SqlHandlesError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let mut result_set = ResultSet::with_capacity(column_names, 10);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        result_set.add_row_values(row_values);
    }
    Ok(result_set)
}

fn starts_insert(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

/// Run one statement and collect its rows (if any) plus the change summary.
///
/// `changes()` and `last_insert_rowid()` keep the values of the last DML statement, so the
/// summary only reports them when this statement moved `total_changes()`.
pub(crate) fn run_query(conn: &Connection, sql: &str) -> Result<QueryResult, SqlHandlesError> {
    let total_before = u64::try_from(conn.total_changes()).unwrap_or(0);
    let rowid_before = conn.last_insert_rowid();

    let mut stmt = conn.prepare(sql)?;
    let mut result = QueryResult::default();
    if stmt.column_count() > 0 {
        result.result_sets.push(build_result_set(&mut stmt)?);
    } else {
        stmt.execute([])?;
    }
    drop(stmt);

    let total_after = u64::try_from(conn.total_changes()).unwrap_or(0);
    if total_after == total_before {
        return Ok(result);
    }
    result.affected_rows = u64::try_from(conn.changes()).unwrap_or(0);
    let rowid = conn.last_insert_rowid();
    if rowid != rowid_before || starts_insert(sql) {
        result.last_insert_id = u64::try_from(rowid).unwrap_or(0);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_come_back_as_text() {
        let conn = Connection::open_in_memory().unwrap();
        let result = run_query(&conn, "SELECT 1 AS a, 2.5 AS b, 'x' AS c, NULL AS d").unwrap();
        let set = result.first_set().unwrap();
        assert_eq!(
            set.rows()[0],
            vec![
                RowValues::Text("1".into()),
                RowValues::Text("2.5".into()),
                RowValues::Text("x".into()),
                RowValues::Null,
            ]
        );
    }

    #[test]
    fn dml_reports_summary() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);")
            .unwrap();
        let result = run_query(&conn, "INSERT INTO t (v) VALUES ('a')").unwrap();
        assert!(result.result_sets.is_empty());
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.last_insert_id, 1);
    }

    #[test]
    fn summary_does_not_leak_from_earlier_statements() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER);")
            .unwrap();
        let insert = run_query(&conn, "INSERT INTO t (v) VALUES (1), (2), (3)").unwrap();
        assert_eq!((insert.affected_rows, insert.last_insert_id), (3, 3));

        for sql in [
            "SELECT * FROM t",
            "CREATE TABLE u (id INTEGER PRIMARY KEY)",
            "UPDATE t SET v = 9 WHERE id = 99",
            "DELETE FROM t WHERE id = 99",
        ] {
            let result = run_query(&conn, sql).unwrap();
            assert_eq!(result.affected_rows, 0, "{sql}");
            assert_eq!(result.last_insert_id, 0, "{sql}");
        }

        let update = run_query(&conn, "UPDATE t SET v = 0 WHERE id <= 2").unwrap();
        assert_eq!((update.affected_rows, update.last_insert_id), (2, 0));
    }

    #[test]
    fn replacing_the_same_rowid_still_reports_it() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER);")
            .unwrap();
        run_query(&conn, "INSERT INTO t (id, v) VALUES (7, 1)").unwrap();
        let replaced = run_query(&conn, "  replace INTO t (id, v) VALUES (7, 2)").unwrap();
        assert_eq!(replaced.last_insert_id, 7);
        assert!(starts_insert("INSERT INTO t"));
        assert!(!starts_insert("UPDATE t"));
    }
}
