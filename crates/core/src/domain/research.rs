use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ResearchSource {
    pub id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    pub title: String,
    pub domain: String,
    /// 0.0 to 1.0
    pub credibility_score: f64,
    pub extracted_facts: Vec<String>,
    pub section_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A source found by the research stage, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResearchSource {
    pub url: String,
    pub title: String,
    pub credibility_score: f64,
    pub extracted_facts: Vec<String>,
    pub section_id: Option<Uuid>,
}

impl NewResearchSource {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            credibility_score: 0.5,
            extracted_facts: Vec::new(),
            section_id: None,
        }
    }

    pub fn into_source(self, project_id: Uuid) -> ResearchSource {
        ResearchSource {
            id: Uuid::new_v4(),
            project_id,
            domain: domain_of(&self.url),
            url: self.url,
            title: self.title,
            credibility_score: self.credibility_score.clamp(0.0, 1.0),
            extracted_facts: self.extracted_facts,
            section_id: self.section_id,
            created_at: Utc::now(),
        }
    }
}

/// Host part of a URL, without scheme, port or `www.` prefix.
pub fn domain_of(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.trim_start_matches("www.").to_lowercase()
}
