//! Project → branch → project-state queries
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::query_db::schema::{Branch, Project, ProjectState, StateCriteria};

/// Read an id-like column as text, whatever its storage class.
pub(crate) fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(optional_text_column(row, idx)?.unwrap_or_default())
}

pub(crate) fn optional_text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(b.iter().map(|byte| format!("{:02x}", byte)).collect()),
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: text_column(row, 0)?,
        name: optional_text_column(row, 1)?,
        folder_name: optional_text_column(row, 2)?,
        created_at: optional_text_column(row, 3)?,
    })
}

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: text_column(row, 0)?,
        project_id: text_column(row, 1)?,
        name: optional_text_column(row, 2)?,
        created_at: optional_text_column(row, 3)?,
    })
}

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectState> {
    Ok(ProjectState {
        id: text_column(row, 0)?,
        branch_id: text_column(row, 1)?,
        prev_state_id: optional_text_column(row, 2)?,
        step_index: row.get(3)?,
        action: optional_text_column(row, 4)?,
    })
}

const STATE_COLUMNS: &str = "ps.id, ps.branch_id, ps.prev_state_id, ps.step_index, ps.action";

pub fn get_projects(conn: &Connection) -> anyhow::Result<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, folder_name, created_at
         FROM projects
         ORDER BY created_at DESC",
    )?;
    let projects = stmt
        .query_map([], project_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

pub fn get_branches(conn: &Connection, project_id: &str) -> anyhow::Result<Vec<Branch>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, name, created_at
         FROM branches
         WHERE project_id = ?1
         ORDER BY created_at DESC",
    )?;
    let branches = stmt
        .query_map(params![project_id], branch_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(branches)
}

pub fn get_branch(conn: &Connection, branch_id: &str) -> anyhow::Result<Option<Branch>> {
    let branch = conn
        .query_row(
            "SELECT id, project_id, name, created_at FROM branches WHERE id = ?1",
            params![branch_id],
            branch_from_row,
        )
        .optional()?;
    Ok(branch)
}

pub fn get_project_states(conn: &Connection, branch_id: &str) -> anyhow::Result<Vec<ProjectState>> {
    let query = format!(
        "SELECT {STATE_COLUMNS}
         FROM project_states ps
         WHERE ps.branch_id = ?
         ORDER BY ps.step_index, ps.id"
    );
    let mut stmt = conn.prepare(&query)?;
    let states = stmt
        .query_map(params![branch_id], state_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(states)
}

/// States of `branch_id` matching every criterion in `criteria`.
///
/// Task, epic and iteration match as substrings of the state's JSON columns;
/// agent matches any LLM request recorded against the state.
pub fn search_project_states(
    conn: &Connection,
    branch_id: &str,
    criteria: &StateCriteria,
) -> anyhow::Result<Vec<ProjectState>> {
    let mut query = format!(
        "SELECT {STATE_COLUMNS}
         FROM project_states ps
         WHERE ps.branch_id = ?"
    );
    let mut patterns: Vec<String> = Vec::new();

    if let Some(task) = &criteria.task {
        query.push_str(" AND ps.tasks LIKE ?");
        patterns.push(format!("%{}%", task));
    }
    if let Some(epic) = &criteria.epic {
        query.push_str(" AND ps.epics LIKE ?");
        patterns.push(format!("%{}%", epic));
    }
    if let Some(iteration) = &criteria.iteration {
        query.push_str(" AND ps.iterations LIKE ?");
        patterns.push(format!("%{}%", iteration));
    }
    if let Some(agent) = &criteria.agent {
        query.push_str(
            " AND EXISTS (SELECT 1 FROM llm_requests lr
                          WHERE lr.project_state_id = ps.id AND lr.agent LIKE ?)",
        );
        patterns.push(format!("%{}%", agent));
    }
    query.push_str(" ORDER BY ps.step_index, ps.id");

    let mut stmt = conn.prepare(&query)?;

    let mut params: Vec<&dyn rusqlite::ToSql> = Vec::new();
    params.push(&branch_id);
    for pattern in &patterns {
        params.push(pattern);
    }

    let states = stmt
        .query_map(rusqlite::params_from_iter(params), state_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(states)
}
