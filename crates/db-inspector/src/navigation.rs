//! Navigation resolution
//!
//! Turns an optional project / branch / filter request into a complete view:
//!
//! 1. no projects at all: empty view
//! 2. no project requested: newest project
//! 3. project known: requested branch if it belongs to it, else newest branch
//! 4. branch known: filtered search when any criterion is set, else all states
//!
//! Provider failures abort the whole resolution; a partial view is never built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{InspectorError, InspectorResult};
use crate::query_db::{latest, Branch, DataQueryProvider, Project, ProjectState, StateCriteria};

/// Query parameters accepted by the browse endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NavigationQuery {
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(rename = "branchId")]
    pub branch_id: Option<String>,
    pub task: Option<String>,
    pub epic: Option<String>,
    pub iteration: Option<String>,
    pub llm_request: Option<String>,
    pub agent: Option<String>,
}

/// How project states are fetched for the resolved branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFilter {
    Unfiltered,
    Filtered(StateCriteria),
}

impl NavigationQuery {
    fn selected(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }

    pub fn state_filter(&self) -> StateFilter {
        let criteria = StateCriteria {
            task: self.task.clone(),
            epic: self.epic.clone(),
            iteration: self.iteration.clone(),
            agent: self.agent.clone(),
        }
        .normalized();
        if criteria.is_empty() {
            StateFilter::Unfiltered
        } else {
            StateFilter::Filtered(criteria)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedView {
    pub projects: Vec<Project>,
    pub branches: Vec<Branch>,
    #[serde(rename = "projectStates")]
    pub project_states: Vec<ProjectState>,
    #[serde(rename = "selectedProjectId")]
    pub selected_project_id: Option<String>,
    #[serde(rename = "selectedBranchId")]
    pub selected_branch_id: Option<String>,
    pub task: Option<String>,
    pub epic: Option<String>,
    pub iteration: Option<String>,
    pub llm_request: Option<String>,
    pub agent: Option<String>,
}

fn fetch<T>(result: anyhow::Result<T>) -> InspectorResult<T> {
    result.map_err(InspectorError::DataFetch)
}

pub struct NavigationResolver<'a> {
    provider: &'a dyn DataQueryProvider,
    db: &'a Path,
}

impl<'a> NavigationResolver<'a> {
    pub fn new(provider: &'a dyn DataQueryProvider, db: &'a Path) -> Self {
        Self { provider, db }
    }

    pub fn resolve(&self, query: &NavigationQuery) -> InspectorResult<ResolvedView> {
        let mut view = ResolvedView {
            task: query.task.clone(),
            epic: query.epic.clone(),
            iteration: query.iteration.clone(),
            llm_request: query.llm_request.clone(),
            agent: query.agent.clone(),
            ..ResolvedView::default()
        };

        view.projects = fetch(self.provider.projects(self.db))?;

        let requested_branch = match NavigationQuery::selected(&query.branch_id) {
            Some(branch_id) => fetch(self.provider.branch(self.db, branch_id))?,
            None => None,
        };

        let project_id = match NavigationQuery::selected(&query.project_id) {
            Some(project_id) => project_id.to_string(),
            None => match (&requested_branch, latest(&view.projects)) {
                (Some(branch), _) => branch.project_id.clone(),
                (None, Some(project)) => project.id.clone(),
                (None, None) => {
                    debug!("No projects in database, returning empty view");
                    return Ok(view);
                }
            },
        };

        view.branches = fetch(self.provider.branches(self.db, &project_id))?;
        view.selected_project_id = Some(project_id);

        let branch_id = match requested_branch {
            Some(branch) if view.branches.iter().any(|b| b.id == branch.id) => Some(branch.id),
            requested => {
                if let Some(branch_id) = NavigationQuery::selected(&query.branch_id) {
                    warn!(
                        "Branch {} does not belong to project {:?} (found: {}), using newest branch",
                        branch_id,
                        view.selected_project_id,
                        requested.is_some()
                    );
                }
                latest(&view.branches).map(|b| b.id.clone())
            }
        };

        let Some(branch_id) = branch_id else {
            debug!("Project {:?} has no branches", view.selected_project_id);
            return Ok(view);
        };

        view.project_states = match query.state_filter() {
            StateFilter::Unfiltered => fetch(self.provider.project_states(self.db, &branch_id))?,
            StateFilter::Filtered(criteria) => {
                debug!("Searching states of branch {} with {:?}", branch_id, criteria);
                fetch(self.provider.search_project_states(self.db, &branch_id, &criteria))?
            }
        };
        view.selected_branch_id = Some(branch_id);

        Ok(view)
    }
}
