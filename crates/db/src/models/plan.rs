use scribe_core::{Plan, PlanSection};

use super::{
    datetime_to_timestamp, decode_list, encode_list, parse_optional_uuid, parse_uuid,
    timestamp_to_datetime,
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanRow {
    pub id: String,
    pub project_id: String,
    pub is_approved: bool,
    pub total_estimated_words: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlanRow {
    pub fn into_domain(self, sections: Vec<PlanSection>) -> Plan {
        Plan {
            id: parse_uuid(&self.id),
            project_id: parse_uuid(&self.project_id),
            is_approved: self.is_approved,
            total_estimated_words: self.total_estimated_words as u32,
            sections,
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        }
    }
}

impl From<&Plan> for PlanRow {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id.to_string(),
            project_id: plan.project_id.to_string(),
            is_approved: plan.is_approved,
            total_estimated_words: plan.total_estimated_words as i64,
            created_at: datetime_to_timestamp(plan.created_at),
            updated_at: datetime_to_timestamp(plan.updated_at),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanSectionRow {
    pub id: String,
    pub plan_id: String,
    pub heading: String,
    pub heading_level: i64,
    pub key_points: String,
    pub suggested_sources: String,
    pub estimated_words: i64,
    pub sort_order: i64,
    pub is_locked: bool,
    pub parent_id: Option<String>,
}

impl PlanSectionRow {
    pub fn into_domain(self) -> PlanSection {
        PlanSection {
            id: parse_uuid(&self.id),
            heading: self.heading,
            heading_level: self.heading_level.clamp(1, 6) as u8,
            key_points: decode_list(&self.key_points),
            suggested_sources: decode_list(&self.suggested_sources),
            estimated_words: self.estimated_words as u32,
            order: self.sort_order as u32,
            is_locked: self.is_locked,
            parent_id: parse_optional_uuid(self.parent_id),
        }
    }

    pub fn from_section(plan_id: &str, section: &PlanSection) -> Self {
        Self {
            id: section.id.to_string(),
            plan_id: plan_id.to_string(),
            heading: section.heading.clone(),
            heading_level: section.heading_level as i64,
            key_points: encode_list(&section.key_points),
            suggested_sources: encode_list(&section.suggested_sources),
            estimated_words: section.estimated_words as i64,
            sort_order: section.order as i64,
            is_locked: section.is_locked,
            parent_id: section.parent_id.map(|id| id.to_string()),
        }
    }
}
