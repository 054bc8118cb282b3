//! Dump channel model.

use serde::{Deserialize, Serialize};

/// A channel that receives a copy of every processed file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpChannel {
    pub channel_id: i64,
    pub channel_name: String,
    pub added_by: u64,
    pub added_at: i64,
    pub is_active: bool,
}
