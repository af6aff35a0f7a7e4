// db-inspector/crates/db-inspector/src/detail.rs

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{InspectorError, InspectorResult};
use crate::query_db::DataQueryProvider;

/// Kinds of sub-record attached to a project state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DetailCategory {
    Epic,
    Task,
    Step,
    Files,
    UserInputs,
    LlmRequests,
    Iteration,
}

impl DetailCategory {
    pub const ALL: [DetailCategory; 7] = [
        Self::Epic,
        Self::Task,
        Self::Step,
        Self::Files,
        Self::UserInputs,
        Self::LlmRequests,
        Self::Iteration,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Task => "task",
            Self::Step => "step",
            Self::Files => "files",
            Self::UserInputs => "userInputs",
            Self::LlmRequests => "llmRequests",
            Self::Iteration => "iteration",
        }
    }

    /// Template the presentation layer renders this category with.
    pub fn template(self) -> &'static str {
        match self {
            Self::Epic => "epic_details",
            Self::Task => "task_details",
            Self::Step => "step_details",
            Self::Files => "files_details",
            Self::UserInputs => "user_inputs_details",
            Self::LlmRequests => "llm_requests_details",
            Self::Iteration => "iteration_details",
        }
    }

    fn fetch(
        self,
        provider: &dyn DataQueryProvider,
        db: &Path,
        state_id: &str,
    ) -> anyhow::Result<Option<Value>> {
        match self {
            Self::Epic => provider.epics(db, state_id),
            Self::Task => provider.tasks(db, state_id),
            Self::Step => provider.steps(db, state_id),
            Self::Files => provider.files(db, state_id),
            Self::UserInputs => provider.user_inputs(db, state_id),
            Self::LlmRequests => provider.llm_requests(db, state_id),
            Self::Iteration => provider.iterations(db, state_id),
        }
    }
}

impl fmt::Display for DetailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for DetailCategory {
    type Err = InspectorError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "epic" => Ok(Self::Epic),
            "task" => Ok(Self::Task),
            "step" => Ok(Self::Step),
            "files" => Ok(Self::Files),
            "userInputs" | "user_inputs" => Ok(Self::UserInputs),
            "llmRequests" | "llm_requests" | "llm_request" => Ok(Self::LlmRequests),
            "iteration" => Ok(Self::Iteration),
            other => Err(InspectorError::UnsupportedDetailCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub category: DetailCategory,
    pub template: &'static str,
    #[serde(rename = "stateId")]
    pub state_id: String,
    pub data: Option<Value>,
}

/// Fetch one category of detail for a state. No fallback to other categories.
pub fn dispatch(
    provider: &dyn DataQueryProvider,
    db: &Path,
    category: DetailCategory,
    state_id: &str,
) -> InspectorResult<DetailView> {
    let data = category
        .fetch(provider, db, state_id)
        .map_err(InspectorError::DataFetch)?;
    Ok(DetailView {
        category,
        template: category.template(),
        state_id: state_id.to_string(),
        data,
    })
}
