use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssignmentMode {
    Manual,
    Automatic,
}

impl AssignmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentMode::Manual => "manual",
            AssignmentMode::Automatic => "automatic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub delivery_id: Uuid,
    pub courier_id: Uuid,
    pub mode: AssignmentMode,
    /// Courier-to-pickup distance, when both positions were known.
    pub distance_km: Option<f64>,
    pub attempts: u32,
    pub assigned_at: DateTime<Utc>,
}
