use scribe_core::{
    ContentTone, ExpertiseLevel, Project, ProjectGoal, ProjectStatus,
};

use super::{datetime_to_timestamp, parse_optional_uuid, parse_uuid, timestamp_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub topic: String,
    pub target_audience: String,
    pub goal: String,
    pub tone: String,
    pub expertise_level: String,
    pub word_count_min: i64,
    pub word_count_max: i64,
    pub constraints: Option<String>,
    pub status: String,
    pub selected_title_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProjectRow {
    pub fn into_domain(self) -> Project {
        Project {
            id: parse_uuid(&self.id),
            topic: self.topic,
            target_audience: self.target_audience,
            goal: ProjectGoal::parse(&self.goal).unwrap_or_default(),
            tone: ContentTone::parse(&self.tone).unwrap_or_default(),
            expertise_level: ExpertiseLevel::parse(&self.expertise_level).unwrap_or_default(),
            word_count_min: self.word_count_min as u32,
            word_count_max: self.word_count_max as u32,
            constraints: self.constraints,
            status: ProjectStatus::parse(&self.status).unwrap_or_default(),
            selected_title_id: parse_optional_uuid(self.selected_title_id),
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        }
    }
}

impl From<&Project> for ProjectRow {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.to_string(),
            topic: project.topic.clone(),
            target_audience: project.target_audience.clone(),
            goal: project.goal.as_str().to_string(),
            tone: project.tone.as_str().to_string(),
            expertise_level: project.expertise_level.as_str().to_string(),
            word_count_min: project.word_count_min as i64,
            word_count_max: project.word_count_max as i64,
            constraints: project.constraints.clone(),
            status: project.status.as_str().to_string(),
            selected_title_id: project.selected_title_id.map(|id| id.to_string()),
            created_at: datetime_to_timestamp(project.created_at),
            updated_at: datetime_to_timestamp(project.updated_at),
        }
    }
}
