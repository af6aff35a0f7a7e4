//! Records read from an inspected database
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: Option<String>,
    pub folder_name: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub project_id: String,
    pub name: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: String,
    pub branch_id: String,
    pub prev_state_id: Option<String>,
    pub step_index: Option<i64>,
    pub action: Option<String>,
}

/// Filters for a project-state search. All present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCriteria {
    pub task: Option<String>,
    pub epic: Option<String>,
    pub iteration: Option<String>,
    pub agent: Option<String>,
}

impl StateCriteria {
    /// Drops empty strings so only meaningful criteria remain.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        Self {
            task: keep(self.task),
            epic: keep(self.epic),
            iteration: keep(self.iteration),
            agent: keep(self.agent),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.epic.is_none() && self.iteration.is_none() && self.agent.is_none()
    }
}

/// Something with a creation timestamp and an id, ordered oldest to newest.
pub trait Chronological {
    fn id(&self) -> &str;
    fn created_at(&self) -> Option<&str>;

    /// Later `created_at` compares greater; equal timestamps fall back to the id.
    fn cmp_created(&self, other: &Self) -> Ordering {
        let mine = self.created_at().map(parse_timestamp);
        let theirs = other.created_at().map(parse_timestamp);
        mine.cmp(&theirs)
            .then_with(|| self.created_at().cmp(&other.created_at()))
            .then_with(|| compare_ids(self.id(), other.id()))
    }
}

impl Chronological for Project {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }
}

impl Chronological for Branch {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }
}

/// Parsed timestamp, `None` when the text is in none of the known layouts.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Numeric ids compare numerically, anything else lexically.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Item with the greatest `created_at`, ties going to the highest id.
pub fn latest<T: Chronological>(items: &[T]) -> Option<&T> {
    items.iter().max_by(|a, b| a.cmp_created(b))
}
