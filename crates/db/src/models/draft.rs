use std::collections::BTreeMap;

use scribe_core::{Draft, FaqEntry, QualityAssessment};

use super::{datetime_to_timestamp, decode_list, encode_list, parse_uuid, timestamp_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DraftRow {
    pub id: String,
    pub project_id: String,
    pub content_markdown: String,
    pub content_html: Option<String>,
    pub word_count: i64,
    pub version: i64,
    pub is_current: bool,
    pub is_approved: bool,
    pub seo_title: Option<String>,
    pub meta_description: Option<String>,
    /// JSON array of FAQ entries
    pub faq_schema: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DraftRow {
    pub fn into_domain(self, assessment: Option<QualityAssessment>) -> Draft {
        Draft {
            id: parse_uuid(&self.id),
            project_id: parse_uuid(&self.project_id),
            content_markdown: self.content_markdown,
            content_html: self.content_html,
            word_count: self.word_count as u32,
            version: self.version as u32,
            is_current: self.is_current,
            is_approved: self.is_approved,
            seo_title: self.seo_title,
            meta_description: self.meta_description,
            faq_schema: self
                .faq_schema
                .and_then(|raw| serde_json::from_str::<Vec<FaqEntry>>(&raw).ok()),
            assessment,
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        }
    }
}

impl From<&Draft> for DraftRow {
    fn from(draft: &Draft) -> Self {
        Self {
            id: draft.id.to_string(),
            project_id: draft.project_id.to_string(),
            content_markdown: draft.content_markdown.clone(),
            content_html: draft.content_html.clone(),
            word_count: draft.word_count as i64,
            version: draft.version as i64,
            is_current: draft.is_current,
            is_approved: draft.is_approved,
            seo_title: draft.seo_title.clone(),
            meta_description: draft.meta_description.clone(),
            faq_schema: draft
                .faq_schema
                .as_ref()
                .and_then(|entries| serde_json::to_string(entries).ok()),
            created_at: datetime_to_timestamp(draft.created_at),
            updated_at: datetime_to_timestamp(draft.updated_at),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QualityAssessmentRow {
    pub draft_id: String,
    pub scores: String,
    pub overall_score: f64,
    pub primary_insight: Option<String>,
    pub feedback: String,
    pub suggestions: String,
    pub evaluated_at: i64,
}

impl QualityAssessmentRow {
    pub fn into_domain(self) -> QualityAssessment {
        let scores: BTreeMap<String, f64> = serde_json::from_str(&self.scores).unwrap_or_default();
        QualityAssessment {
            scores,
            overall_score: self.overall_score,
            primary_insight: self.primary_insight,
            feedback: decode_list(&self.feedback),
            suggestions: decode_list(&self.suggestions),
        }
    }

    pub fn from_assessment(draft_id: &str, assessment: &QualityAssessment, evaluated_at: i64) -> Self {
        Self {
            draft_id: draft_id.to_string(),
            scores: serde_json::to_string(&assessment.scores).unwrap_or_else(|_| "{}".to_string()),
            overall_score: assessment.overall_score,
            primary_insight: assessment.primary_insight.clone(),
            feedback: encode_list(&assessment.feedback),
            suggestions: encode_list(&assessment.suggestions),
            evaluated_at,
        }
    }
}
