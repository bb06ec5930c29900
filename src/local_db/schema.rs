//! Schema constants.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Entity tables created by `schema.sql`.
pub const ENTITY_TABLES: &[&str] = &[
    "events",
    "tasks",
    "notes",
    "budget_items",
    "setlists",
    "setlist_songs",
];
