//! Per-state detail lookups
//!
//! Epics, tasks, steps and iterations live as JSON columns on the state row.
//! Files, user inputs and LLM requests are child tables keyed by
//! `project_state_id`. Rows are returned as JSON objects keyed by column name
//! so that extra columns written by newer versions of the producing tool show
//! up without code changes.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

/// JSON columns stored on `project_states`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateColumn {
    Epics,
    Tasks,
    Steps,
    Iterations,
}

impl StateColumn {
    fn column(self) -> &'static str {
        match self {
            Self::Epics => "epics",
            Self::Tasks => "tasks",
            Self::Steps => "steps",
            Self::Iterations => "iterations",
        }
    }
}

/// Convert a SQLite value to JSON. Text that parses as a JSON array or object
/// is embedded as structured JSON.
pub(crate) fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => {
            let text = String::from_utf8_lossy(t);
            let trimmed = text.trim_start();
            if trimmed.starts_with('[') || trimmed.starts_with('{') {
                if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                    return parsed;
                }
            }
            Value::String(text.into_owned())
        }
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn row_to_object(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Value> {
    let mut object = Map::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        object.insert(name.clone(), value_to_json(row.get_ref(idx)?));
    }
    Ok(Value::Object(object))
}

fn rows_as_json(conn: &Connection, query: &str, state_id: &str) -> anyhow::Result<Value> {
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let rows = stmt
        .query_map(params![state_id], |row| row_to_object(row, &columns))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Value::Array(rows))
}

/// JSON column of a state, `None` when the state is missing or the column is NULL.
pub fn get_state_column(
    conn: &Connection,
    state_id: &str,
    column: StateColumn,
) -> anyhow::Result<Option<Value>> {
    let query = format!("SELECT {} FROM project_states WHERE id = ?1", column.column());
    let value = conn
        .query_row(&query, params![state_id], |row| Ok(value_to_json(row.get_ref(0)?)))
        .optional()?;
    Ok(value.filter(|v| !v.is_null()))
}

pub fn get_files(conn: &Connection, state_id: &str) -> anyhow::Result<Value> {
    rows_as_json(
        conn,
        "SELECT f.id, f.path, f.meta, fc.content
         FROM files f
         LEFT JOIN file_contents fc ON fc.id = f.content_id
         WHERE f.project_state_id = ?1
         ORDER BY f.path",
        state_id,
    )
}

pub fn get_user_inputs(conn: &Connection, state_id: &str) -> anyhow::Result<Value> {
    rows_as_json(
        conn,
        "SELECT * FROM user_inputs WHERE project_state_id = ?1 ORDER BY id",
        state_id,
    )
}

pub fn get_llm_requests(conn: &Connection, state_id: &str) -> anyhow::Result<Value> {
    rows_as_json(
        conn,
        "SELECT * FROM llm_requests WHERE project_state_id = ?1 ORDER BY id",
        state_id,
    )
}
