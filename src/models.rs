// Data models for taskbot

use serde::{Deserialize, Serialize};

/// One to-do item owned by a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Smallest free positive integer at insertion time, unique store-wide
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    /// Stored in the `status` column; `false` while pending
    #[serde(rename = "status")]
    pub done: bool,
}

impl Task {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            description: row.get(2)?,
            done: row.get(3)?,
        })
    }

    /// Check mark used when rendering the task in chat replies
    pub fn mark(&self) -> &'static str {
        if self.done { "✓" } else { "✗" }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.id, self.description, self.mark())
    }
}
