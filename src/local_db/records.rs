//! Keyed record storage.
//!
//! Records are opaque JSON field maps carrying at least an `id` and
//! usually a `band_id`. `save` is a total-replacement upsert by id and
//! `remove` is idempotent; reads against a table that has never been
//! written yield an empty result rather than an error.

use serde_json::Value;
use sqlx::Row;

use crate::local_db::{LocalDatabase, Result};
use crate::shared::error::LocalStoreError;

impl LocalDatabase {
    /// All cached records for a table, in storage (insertion) order.
    pub async fn get_all(&self, table: &str) -> Result<Vec<Value>> {
        self.ensure_table(table).await?;

        let rows = sqlx::query(&format!(
            "SELECT data FROM \"{table}\" ORDER BY rowid ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.try_get("data")?;
            let value =
                serde_json::from_str(&data).map_err(|source| LocalStoreError::Corrupt {
                    table: table.to_string(),
                    source,
                })?;
            records.push(value);
        }
        Ok(records)
    }

    /// One cached record by id.
    pub async fn get(&self, table: &str, id: &str) -> Result<Option<Value>> {
        self.ensure_table(table).await?;

        let row = sqlx::query(&format!("SELECT data FROM \"{table}\" WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                let value =
                    serde_json::from_str(&data).map_err(|source| LocalStoreError::Corrupt {
                        table: table.to_string(),
                        source,
                    })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Upsert a record by id, replacing any existing row entirely.
    pub async fn save(&self, table: &str, record: &Value) -> Result<()> {
        self.ensure_table(table).await?;

        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| LocalStoreError::MissingId {
                table: table.to_string(),
            })?;
        let band_id = record.get("band_id").and_then(Value::as_str).unwrap_or("");
        let data = serde_json::to_string(record).map_err(LocalStoreError::Encode)?;

        sqlx::query(&format!(
            "INSERT OR REPLACE INTO \"{table}\" (id, band_id, data, updated_at)
             VALUES (?, ?, ?, ?)"
        ))
        .bind(id)
        .bind(band_id)
        .bind(data)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Remove a record by id. Removing a missing id is not an error.
    pub async fn remove(&self, table: &str, id: &str) -> Result<()> {
        self.ensure_table(table).await?;

        sqlx::query(&format!("DELETE FROM \"{table}\" WHERE id = ?"))
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }
}
