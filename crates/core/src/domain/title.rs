use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    #[default]
    Informational,
    Navigational,
    Transactional,
    Commercial,
}

impl SearchIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Navigational => "navigational",
            Self::Transactional => "transactional",
            Self::Commercial => "commercial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "informational" => Some(Self::Informational),
            "navigational" => Some(Self::Navigational),
            "transactional" => Some(Self::Transactional),
            "commercial" => Some(Self::Commercial),
            _ => None,
        }
    }
}

/// A candidate title. At most one per project has `is_selected` set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Title {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub search_intent: SearchIntent,
    /// 1 (easy) to 10 (hard)
    pub difficulty: u8,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

/// Title candidate as produced by a generator, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTitle {
    pub title: String,
    pub description: String,
    pub search_intent: SearchIntent,
    pub difficulty: u8,
}

impl NewTitle {
    pub fn into_title(self, project_id: Uuid) -> Title {
        Title {
            id: Uuid::new_v4(),
            project_id,
            title: self.title,
            description: self.description,
            search_intent: self.search_intent,
            difficulty: self.difficulty.clamp(1, 10),
            is_selected: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SelectTitleRequest {
    pub title_id: Uuid,
}
