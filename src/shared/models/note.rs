//! Shared band notes.

use serde::{Deserialize, Serialize};

use super::{now_rfc3339, SyncRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub band_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
    pub band_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl SyncRecord for Note {
    const TABLE: &'static str = "notes";
    type New = NewNote;
    type Patch = NotePatch;

    fn from_new(id: String, new: NewNote) -> Self {
        Self {
            id,
            band_id: new.band_id,
            title: new.title,
            content: new.content,
            author: new.author,
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
