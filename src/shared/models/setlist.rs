//! Setlists and the songs that make them up.
//!
//! Songs live in their own table and reference their setlist by id; the
//! `order` column drives the playing order.

use serde::{Deserialize, Serialize};

use super::{now_rfc3339, SyncRecord};

/// A named setlist belonging to a band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setlist {
    pub id: String,
    pub band_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSetlist {
    pub band_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetlistPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SyncRecord for Setlist {
    const TABLE: &'static str = "setlists";
    type New = NewSetlist;
    type Patch = SetlistPatch;

    fn from_new(id: String, new: NewSetlist) -> Self {
        Self {
            id,
            band_id: new.band_id,
            name: new.name,
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

/// One song inside a setlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetlistSong {
    pub id: String,
    pub band_id: String,
    pub setlist_id: String,
    pub title: String,
    /// Duration in `MM:SS` format
    #[serde(default)]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "order")]
    pub position: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSetlistSong {
    pub band_id: String,
    pub setlist_id: String,
    pub title: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(rename = "order")]
    pub position: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetlistSongPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "order", skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl SyncRecord for SetlistSong {
    const TABLE: &'static str = "setlist_songs";
    type New = NewSetlistSong;
    type Patch = SetlistSongPatch;

    fn from_new(id: String, new: NewSetlistSong) -> Self {
        Self {
            id,
            band_id: new.band_id,
            setlist_id: new.setlist_id,
            title: new.title,
            duration: new.duration,
            key: new.key,
            notes: new.notes,
            position: new.position,
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
