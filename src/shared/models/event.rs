//! Calendar events: gigs, rehearsals, and everything else a band schedules.

use serde::{Deserialize, Serialize};

use super::{now_rfc3339, SyncRecord};

/// What kind of event this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Gig,
    Rehearsal,
    Other,
}

/// A scheduled event belonging to a band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub band_id: String,
    pub title: String,
    /// ISO 8601 date, e.g. `2025-04-18`
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub created_at: String,
}

/// Insert shape for [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub band_id: String,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
}

/// Partial update for [`Event`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,
}

impl SyncRecord for Event {
    const TABLE: &'static str = "events";
    type New = NewEvent;
    type Patch = EventPatch;

    fn from_new(id: String, new: NewEvent) -> Self {
        Self {
            id,
            band_id: new.band_id,
            title: new.title,
            date: new.date,
            location: new.location,
            kind: new.kind,
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_as_type_column() {
        let event = Event::from_new(
            "e1".into(),
            NewEvent {
                band_id: "b1".into(),
                title: "Live at The Garage".into(),
                date: "2025-04-18".into(),
                location: "The Garage, 123 Music St".into(),
                kind: EventKind::Gig,
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("gig"));
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn patch_omits_unset_fields() {
        let patch = EventPatch {
            location: Some("Basement".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, json!({"location": "Basement"}));
    }

    #[test]
    fn deserialize_tolerates_server_extras() {
        let row = json!({
            "id": "e1",
            "band_id": "b1",
            "title": "Rehearsal",
            "date": "2025-04-15",
            "location": "",
            "type": "rehearsal",
            "created_at": "2025-04-01T00:00:00Z",
            "user_id": "u1"
        });
        let event: Event = serde_json::from_value(row).unwrap();
        assert_eq!(event.kind, EventKind::Rehearsal);
    }
}
