use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;

/// Quality dimensions reported by the edit stage, each scored 0..=10.
pub const QUALITY_DIMENSIONS: [&str; 7] = [
    "inspiring",
    "novel",
    "structured",
    "informative",
    "grounded",
    "helpful",
    "trustworthy",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct QualityAssessment {
    pub scores: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub primary_insight: Option<String>,
    pub feedback: Vec<String>,
    pub suggestions: Vec<String>,
}

impl QualityAssessment {
    /// Clamps each score into 0..=10 and derives `overall_score` as their mean.
    pub fn from_scores(scores: BTreeMap<String, f64>) -> Self {
        let scores: BTreeMap<String, f64> = scores
            .into_iter()
            .map(|(name, value)| (name, value.clamp(0.0, 10.0)))
            .collect();
        let overall_score = if scores.is_empty() {
            0.0
        } else {
            scores.values().sum::<f64>() / scores.len() as f64
        };
        Self {
            scores,
            overall_score,
            ..Default::default()
        }
    }

    pub fn with_insight(mut self, insight: impl Into<String>) -> Self {
        self.primary_insight = Some(insight.into());
        self
    }
}

/// One question of the FAQ structured data published with a draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Draft content produced by the write or edit stage, before it gets a version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftContent {
    pub content_markdown: String,
    pub content_html: Option<String>,
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
    pub faq_schema: Option<Vec<FaqEntry>>,
}

impl DraftContent {
    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            content_markdown: content.into(),
            ..Default::default()
        }
    }
}

/// One version of a project's article. Exactly one draft per project is current.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Draft {
    pub id: Uuid,
    pub project_id: Uuid,
    pub content_markdown: String,
    pub content_html: Option<String>,
    pub word_count: u32,
    pub version: u32,
    pub is_current: bool,
    pub is_approved: bool,
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
    pub faq_schema: Option<Vec<FaqEntry>>,
    pub assessment: Option<QualityAssessment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// Builds the next version; the repository assigns `version` when it is stored.
    pub fn from_content(project_id: Uuid, content: DraftContent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            word_count: count_words(&content.content_markdown),
            content_markdown: content.content_markdown,
            content_html: content.content_html,
            version: 0,
            is_current: true,
            is_approved: false,
            seo_title: content.seo_title,
            meta_description: content.meta_description,
            faq_schema: content.faq_schema,
            assessment: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct UpdateDraftRequest {
    pub content_markdown: Option<String>,
    pub content_html: Option<String>,
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
    pub faq_schema: Option<Vec<FaqEntry>>,
}

impl UpdateDraftRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.content_markdown.is_none()
            && self.content_html.is_none()
            && self.seo_title.is_none()
            && self.meta_description.is_none()
            && self.faq_schema.is_none()
        {
            return Err(CoreError::validation("draft update has no fields"));
        }
        let blank = self.faq_schema.iter().flatten().any(|entry| {
            entry.question.trim().is_empty() || entry.answer.trim().is_empty()
        });
        if blank {
            return Err(CoreError::validation("FAQ entries need a question and an answer"));
        }
        Ok(())
    }
}

pub fn count_words(text: &str) -> u32 {
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count() as u32
}
