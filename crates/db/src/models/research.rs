use scribe_core::ResearchSource;

use super::{
    datetime_to_timestamp, decode_list, encode_list, parse_optional_uuid, parse_uuid,
    timestamp_to_datetime,
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResearchSourceRow {
    pub id: String,
    pub project_id: String,
    pub url: String,
    pub title: String,
    pub domain: String,
    pub credibility_score: f64,
    pub extracted_facts: String,
    pub section_id: Option<String>,
    pub created_at: i64,
}

impl ResearchSourceRow {
    pub fn into_domain(self) -> ResearchSource {
        ResearchSource {
            id: parse_uuid(&self.id),
            project_id: parse_uuid(&self.project_id),
            url: self.url,
            title: self.title,
            domain: self.domain,
            credibility_score: self.credibility_score,
            extracted_facts: decode_list(&self.extracted_facts),
            section_id: parse_optional_uuid(self.section_id),
            created_at: timestamp_to_datetime(self.created_at),
        }
    }
}

impl From<&ResearchSource> for ResearchSourceRow {
    fn from(source: &ResearchSource) -> Self {
        Self {
            id: source.id.to_string(),
            project_id: source.project_id.to_string(),
            url: source.url.clone(),
            title: source.title.clone(),
            domain: source.domain.clone(),
            credibility_score: source.credibility_score,
            extracted_facts: encode_list(&source.extracted_facts),
            section_id: source.section_id.map(|id| id.to_string()),
            created_at: datetime_to_timestamp(source.created_at),
        }
    }
}
