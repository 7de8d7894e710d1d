use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;

pub const MIN_TEXT_LEN: usize = 5;
pub const MAX_TEXT_LEN: usize = 500;
pub const DEFAULT_WORD_COUNT_MIN: u32 = 1500;
pub const DEFAULT_WORD_COUNT_MAX: u32 = 3000;

/// Lifecycle of a project. Only the orchestrator state machine writes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Created,
    TitlesGenerated,
    TitleSelected,
    PlanGenerated,
    PlanApproved,
    Researching,
    Writing,
    Editing,
    DraftReady,
    Published,
    Failed,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 11] = [
        Self::Created,
        Self::TitlesGenerated,
        Self::TitleSelected,
        Self::PlanGenerated,
        Self::PlanApproved,
        Self::Researching,
        Self::Writing,
        Self::Editing,
        Self::DraftReady,
        Self::Published,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::TitlesGenerated => "titles_generated",
            Self::TitleSelected => "title_selected",
            Self::PlanGenerated => "plan_generated",
            Self::PlanApproved => "plan_approved",
            Self::Researching => "researching",
            Self::Writing => "writing",
            Self::Editing => "editing",
            Self::DraftReady => "draft_ready",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "titles_generated" => Some(Self::TitlesGenerated),
            "title_selected" => Some(Self::TitleSelected),
            "plan_generated" => Some(Self::PlanGenerated),
            "plan_approved" => Some(Self::PlanApproved),
            "researching" => Some(Self::Researching),
            "writing" => Some(Self::Writing),
            "editing" => Some(Self::Editing),
            "draft_ready" => Some(Self::DraftReady),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// `published` and `failed` accept no forward commands (`failed` only `restart`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// True while an autonomous stage owns the project.
    pub fn is_executing(&self) -> bool {
        matches!(self, Self::Researching | Self::Writing | Self::Editing)
    }

    /// Coarse progress used when no live execution record exists.
    pub fn nominal_progress(&self) -> u8 {
        match self {
            Self::Created | Self::Failed => 0,
            Self::TitlesGenerated => 10,
            Self::TitleSelected => 20,
            Self::PlanGenerated => 30,
            Self::PlanApproved => 40,
            Self::Researching => 50,
            Self::Writing => 70,
            Self::Editing => 90,
            Self::DraftReady | Self::Published => 100,
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProjectGoal {
    #[default]
    Seo,
    ThoughtLeadership,
    Technical,
    Marketing,
}

impl ProjectGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seo => "seo",
            Self::ThoughtLeadership => "thought_leadership",
            Self::Technical => "technical",
            Self::Marketing => "marketing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seo" => Some(Self::Seo),
            "thought_leadership" => Some(Self::ThoughtLeadership),
            "technical" => Some(Self::Technical),
            "marketing" => Some(Self::Marketing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ContentTone {
    #[default]
    Authoritative,
    Conversational,
    Academic,
    Persuasive,
}

impl ContentTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authoritative => "authoritative",
            Self::Conversational => "conversational",
            Self::Academic => "academic",
            Self::Persuasive => "persuasive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authoritative" => Some(Self::Authoritative),
            "conversational" => Some(Self::Conversational),
            "academic" => Some(Self::Academic),
            "persuasive" => Some(Self::Persuasive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl ExpertiseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Project {
    pub id: Uuid,
    pub topic: String,
    pub target_audience: String,
    pub goal: ProjectGoal,
    pub tone: ContentTone,
    pub expertise_level: ExpertiseLevel,
    pub word_count_min: u32,
    pub word_count_max: u32,
    pub constraints: Option<String>,
    pub status: ProjectStatus,
    pub selected_title_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(topic: impl Into<String>, target_audience: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            target_audience: target_audience.into(),
            goal: ProjectGoal::default(),
            tone: ContentTone::default(),
            expertise_level: ExpertiseLevel::default(),
            word_count_min: DEFAULT_WORD_COUNT_MIN,
            word_count_max: DEFAULT_WORD_COUNT_MAX,
            constraints: None,
            status: ProjectStatus::default(),
            selected_title_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Midpoint of the requested length, used as the writing target.
    pub fn target_word_count(&self) -> u32 {
        (self.word_count_min + self.word_count_max) / 2
    }
}

fn default_word_count_min() -> u32 {
    DEFAULT_WORD_COUNT_MIN
}

fn default_word_count_max() -> u32 {
    DEFAULT_WORD_COUNT_MAX
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CreateProjectRequest {
    pub topic: String,
    pub target_audience: String,
    #[serde(default)]
    pub goal: ProjectGoal,
    #[serde(default)]
    pub tone: ContentTone,
    #[serde(default)]
    pub expertise_level: ExpertiseLevel,
    #[serde(default = "default_word_count_min")]
    pub word_count_min: u32,
    #[serde(default = "default_word_count_max")]
    pub word_count_max: u32,
    #[serde(default)]
    pub constraints: Option<String>,
}

impl CreateProjectRequest {
    pub fn new(topic: impl Into<String>, target_audience: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            target_audience: target_audience.into(),
            goal: ProjectGoal::default(),
            tone: ContentTone::default(),
            expertise_level: ExpertiseLevel::default(),
            word_count_min: DEFAULT_WORD_COUNT_MIN,
            word_count_max: DEFAULT_WORD_COUNT_MAX,
            constraints: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        check_text_len("topic", &self.topic)?;
        check_text_len("target_audience", &self.target_audience)?;

        if !(500..=10_000).contains(&self.word_count_min) {
            return Err(CoreError::validation(
                "word_count_min must be between 500 and 10000",
            ));
        }
        if !(500..=20_000).contains(&self.word_count_max) {
            return Err(CoreError::validation(
                "word_count_max must be between 500 and 20000",
            ));
        }
        if self.word_count_min > self.word_count_max {
            return Err(CoreError::validation(
                "word_count_min must not exceed word_count_max",
            ));
        }

        Ok(())
    }

    pub fn into_project(self) -> Project {
        let mut project = Project::new(self.topic.trim(), self.target_audience.trim());
        project.goal = self.goal;
        project.tone = self.tone;
        project.expertise_level = self.expertise_level;
        project.word_count_min = self.word_count_min;
        project.word_count_max = self.word_count_max;
        project.constraints = self.constraints.filter(|c| !c.trim().is_empty());
        project
    }
}

fn check_text_len(field: &str, value: &str) -> Result<(), CoreError> {
    let len = value.trim().chars().count();
    if !(MIN_TEXT_LEN..=MAX_TEXT_LEN).contains(&len) {
        return Err(CoreError::Validation(format!(
            "{} must be between {} and {} characters",
            field, MIN_TEXT_LEN, MAX_TEXT_LEN
        )));
    }
    Ok(())
}
