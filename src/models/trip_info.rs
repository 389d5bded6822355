use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    #[default]
    Unset,
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub fn id(self) -> i64 {
        match self {
            DifficultyLevel::Unset => 0,
            DifficultyLevel::Easy => 1,
            DifficultyLevel::Medium => 2,
            DifficultyLevel::Hard => 3,
        }
    }

    /// Unknown ids fall back to `Unset`.
    pub fn from_id(id: i64) -> Self {
        match id {
            1 => DifficultyLevel::Easy,
            2 => DifficultyLevel::Medium,
            3 => DifficultyLevel::Hard,
            _ => DifficultyLevel::Unset,
        }
    }
}

/// Supplementary trip metadata, linked 1:1 through `Trip::trip_info_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripInfo {
    pub id: i64,
    pub title: String,
    pub area: Option<String>,
    pub difficulty: DifficultyLevel,
    pub route_description: Option<String>,
}

impl TripInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            area: None,
            difficulty: DifficultyLevel::Unset,
            route_description: None,
        }
    }
}
