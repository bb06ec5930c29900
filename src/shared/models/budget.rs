//! Budget items: income and expenses tracked per band.

use serde::{Deserialize, Serialize};

use super::{now_rfc3339, SyncRecord};

/// Direction of a budget item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetKind {
    Income,
    Expense,
}

/// One income or expense line in the band budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetItem {
    pub id: String,
    pub band_id: String,
    pub description: String,
    pub amount: f64,
    /// ISO 8601 date of the transaction
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type")]
    pub kind: BudgetKind,
    pub created_at: String,
}

/// Insert shape for [`BudgetItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudgetItem {
    pub band_id: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type")]
    pub kind: BudgetKind,
}

/// Partial update for [`BudgetItem`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<BudgetKind>,
}

impl SyncRecord for BudgetItem {
    const TABLE: &'static str = "budget_items";
    type New = NewBudgetItem;
    type Patch = BudgetItemPatch;

    fn from_new(id: String, new: NewBudgetItem) -> Self {
        Self {
            id,
            band_id: new.band_id,
            description: new.description,
            amount: new.amount,
            date: new.date,
            category: new.category,
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
    fn income_kind_round_trips_through_type_column() {
        let item = BudgetItem::from_new(
            "b1".into(),
            NewBudgetItem {
                band_id: "band-1".into(),
                description: "Merch sale".into(),
                amount: 50.0,
                date: "2025-05-01".into(),
                category: String::new(),
                kind: BudgetKind::Income,
            },
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], json!("income"));

        let back: BudgetItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }
}
