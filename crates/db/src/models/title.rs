use scribe_core::{SearchIntent, Title};

use super::{datetime_to_timestamp, parse_uuid, timestamp_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TitleRow {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub search_intent: String,
    pub difficulty: i64,
    pub is_selected: bool,
    pub created_at: i64,
}

impl TitleRow {
    pub fn into_domain(self) -> Title {
        Title {
            id: parse_uuid(&self.id),
            project_id: parse_uuid(&self.project_id),
            title: self.title,
            description: self.description,
            search_intent: SearchIntent::parse(&self.search_intent).unwrap_or_default(),
            difficulty: self.difficulty.clamp(1, 10) as u8,
            is_selected: self.is_selected,
            created_at: timestamp_to_datetime(self.created_at),
        }
    }
}

impl From<&Title> for TitleRow {
    fn from(title: &Title) -> Self {
        Self {
            id: title.id.to_string(),
            project_id: title.project_id.to_string(),
            title: title.title.clone(),
            description: title.description.clone(),
            search_intent: title.search_intent.as_str().to_string(),
            difficulty: title.difficulty as i64,
            is_selected: title.is_selected,
            created_at: datetime_to_timestamp(title.created_at),
        }
    }
}
