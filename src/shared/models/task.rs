//! Band to-do items.

use serde::{Deserialize, Serialize};

use super::{now_rfc3339, SyncRecord};

/// A task on the band's board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub band_id: String,
    pub title: String,
    #[serde(default)]
    pub assignee: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: String,
}

/// Insert shape for [`Task`]. New tasks always start incomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub band_id: String,
    pub title: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Partial update for [`Task`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl TaskPatch {
    /// Patch that toggles only the completion flag.
    pub fn completed(done: bool) -> Self {
        Self {
            completed: Some(done),
            ..Default::default()
        }
    }
}

impl SyncRecord for Task {
    const TABLE: &'static str = "tasks";
    type New = NewTask;
    type Patch = TaskPatch;

    fn from_new(id: String, new: NewTask) -> Self {
        Self {
            id,
            band_id: new.band_id,
            title: new.title,
            assignee: new.assignee,
            completed: false,
            due_date: new.due_date,
            created_at: now_rfc3339(),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn band_id(&self) -> &str {
        &self.band_id
    }
}
