//! Saved format templates.

use serde::{Deserialize, Serialize};

/// A named template saved by a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatTemplate {
    pub id: i64,
    pub user_id: u64,
    pub name: String,
    pub template: String,
    /// Variables the template references.
    pub variables: Vec<String>,
    pub created_at: i64,
}
