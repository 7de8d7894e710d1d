use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;

pub const DEFAULT_HEADING_LEVEL: u8 = 2;
pub const DEFAULT_ESTIMATED_WORDS: u32 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PlanSection {
    pub id: Uuid,
    pub heading: String,
    pub heading_level: u8,
    pub key_points: Vec<String>,
    pub suggested_sources: Vec<String>,
    pub estimated_words: u32,
    pub order: u32,
    pub is_locked: bool,
    pub parent_id: Option<Uuid>,
}

impl PlanSection {
    pub fn new(heading: impl Into<String>, estimated_words: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            heading: heading.into(),
            heading_level: DEFAULT_HEADING_LEVEL,
            key_points: Vec::new(),
            suggested_sources: Vec::new(),
            estimated_words,
            order: 0,
            is_locked: false,
            parent_id: None,
        }
    }

    pub fn with_key_points(mut self, key_points: Vec<String>) -> Self {
        self.key_points = key_points;
        self
    }
}

/// Outline for a project. `is_approved` flips once and is never reset in place.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Plan {
    pub id: Uuid,
    pub project_id: Uuid,
    pub is_approved: bool,
    pub total_estimated_words: u32,
    pub sections: Vec<PlanSection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(project_id: Uuid, sections: Vec<PlanSection>) -> Self {
        let now = Utc::now();
        let mut plan = Self {
            id: Uuid::new_v4(),
            project_id,
            is_approved: false,
            total_estimated_words: 0,
            sections,
            created_at: now,
            updated_at: now,
        };
        plan.renumber();
        plan
    }

    /// Sort by `order`, then rewrite orders as 0..n and recompute the word total.
    pub fn renumber(&mut self) {
        self.sections.sort_by_key(|s| s.order);
        for (index, section) in self.sections.iter_mut().enumerate() {
            section.order = index as u32;
        }
        self.total_estimated_words = self.sections.iter().map(|s| s.estimated_words).sum();
    }

    /// Replaces the editable sections with `inputs`.
    ///
    /// Locked sections are carried over untouched. An input that names a
    /// locked section by id keeps that section at the input's position;
    /// locked sections the input does not mention keep their previous index.
    pub fn apply_update(&mut self, inputs: Vec<PlanSectionInput>) -> Result<(), CoreError> {
        let existing: HashMap<Uuid, PlanSection> =
            self.sections.iter().map(|s| (s.id, s.clone())).collect();

        let mut merged = Vec::with_capacity(inputs.len());
        let mut seen = HashSet::new();

        for input in inputs {
            input.validate()?;
            let section = match input.id {
                Some(id) => {
                    if !seen.insert(id) {
                        return Err(CoreError::Validation(format!(
                            "section {} appears more than once",
                            id
                        )));
                    }
                    match existing.get(&id) {
                        Some(current) if current.is_locked => current.clone(),
                        Some(_) => input.into_section(id),
                        None => {
                            return Err(CoreError::Validation(format!(
                                "unknown section id: {}",
                                id
                            )))
                        }
                    }
                }
                None => input.into_section(Uuid::new_v4()),
            };
            merged.push(section);
        }

        let mut untouched_locked: Vec<&PlanSection> = self
            .sections
            .iter()
            .filter(|s| s.is_locked && !seen.contains(&s.id))
            .collect();
        untouched_locked.sort_by_key(|s| s.order);
        for locked in untouched_locked {
            let index = (locked.order as usize).min(merged.len());
            merged.insert(index, locked.clone());
        }

        let ids: HashSet<Uuid> = merged.iter().map(|s| s.id).collect();
        for section in &merged {
            if let Some(parent) = section.parent_id {
                if parent == section.id || !ids.contains(&parent) {
                    return Err(CoreError::Validation(format!(
                        "section {} has an invalid parent",
                        section.heading
                    )));
                }
            }
        }

        let parents: HashMap<Uuid, Uuid> = merged
            .iter()
            .filter_map(|s| s.parent_id.map(|parent| (s.id, parent)))
            .collect();
        for section in &merged {
            let mut visited = HashSet::from([section.id]);
            let mut current = section.id;
            while let Some(&parent) = parents.get(&current) {
                if !visited.insert(parent) {
                    return Err(CoreError::Validation(format!(
                        "section {} is part of a parent cycle",
                        section.heading
                    )));
                }
                current = parent;
            }
        }

        for (index, section) in merged.iter_mut().enumerate() {
            section.order = index as u32;
        }
        self.sections = merged;
        self.total_estimated_words = self.sections.iter().map(|s| s.estimated_words).sum();
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn default_heading_level() -> u8 {
    DEFAULT_HEADING_LEVEL
}

fn default_estimated_words() -> u32 {
    DEFAULT_ESTIMATED_WORDS
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PlanSectionInput {
    /// Existing section to keep or edit; `None` creates a new section.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub heading: String,
    #[serde(default = "default_heading_level")]
    pub heading_level: u8,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub suggested_sources: Vec<String>,
    #[serde(default = "default_estimated_words")]
    pub estimated_words: u32,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl PlanSectionInput {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            id: None,
            heading: heading.into(),
            heading_level: DEFAULT_HEADING_LEVEL,
            key_points: Vec::new(),
            suggested_sources: Vec::new(),
            estimated_words: DEFAULT_ESTIMATED_WORDS,
            is_locked: false,
            parent_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let heading = self.heading.trim();
        if heading.is_empty() || heading.chars().count() > 500 {
            return Err(CoreError::validation(
                "section heading must be between 1 and 500 characters",
            ));
        }
        if !(1..=6).contains(&self.heading_level) {
            return Err(CoreError::validation("heading_level must be between 1 and 6"));
        }
        if !(50..=5000).contains(&self.estimated_words) {
            return Err(CoreError::validation(
                "estimated_words must be between 50 and 5000",
            ));
        }
        Ok(())
    }

    fn into_section(self, id: Uuid) -> PlanSection {
        PlanSection {
            id,
            heading: self.heading.trim().to_string(),
            heading_level: self.heading_level,
            key_points: self.key_points,
            suggested_sources: self.suggested_sources,
            estimated_words: self.estimated_words,
            order: 0,
            is_locked: self.is_locked,
            parent_id: self.parent_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct UpdatePlanRequest {
    pub sections: Vec<PlanSectionInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Plan {
        let sections = vec![
            PlanSection::new("Introduction", 200),
            PlanSection::new("Body", 400),
            PlanSection::new("Conclusion", 150),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, mut s)| {
            s.order = i as u32;
            s
        })
        .collect();
        Plan::new(Uuid::new_v4(), sections)
    }

    #[test]
    fn test_new_plan_totals_and_orders() {
        let plan = sample_plan();
        assert_eq!(plan.total_estimated_words, 750);
        let orders: Vec<u32> = plan.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(!plan.is_approved);
    }

    #[test]
    fn test_update_replaces_unlocked_sections() {
        let mut plan = sample_plan();
        plan.apply_update(vec![
            PlanSectionInput::new("Hook"),
            PlanSectionInput::new("Deep dive"),
        ])
        .unwrap();

        let headings: Vec<&str> = plan.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Hook", "Deep dive"]);
        assert_eq!(plan.total_estimated_words, 600);
    }

    #[test]
    fn test_update_keeps_locked_sections_verbatim() {
        let mut plan = sample_plan();
        plan.sections[1].is_locked = true;
        let locked = plan.sections[1].clone();

        let mut edit = PlanSectionInput::new("Rewritten body");
        edit.id = Some(locked.id);
        plan.apply_update(vec![PlanSectionInput::new("Opening"), edit])
            .unwrap();

        assert_eq!(plan.sections.len(), 2);
        assert_eq!(plan.sections[1].heading, "Body");
        assert_eq!(plan.sections[1].id, locked.id);
        assert_eq!(plan.sections[1].order, 1);
    }

    #[test]
    fn test_unmentioned_locked_section_keeps_index() {
        let mut plan = sample_plan();
        plan.sections[2].is_locked = true;

        plan.apply_update(vec![PlanSectionInput::new("Only one")])
            .unwrap();

        let headings: Vec<&str> = plan.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Only one", "Conclusion"]);
        let orders: Vec<u32> = plan.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_update_rejects_bad_input() {
        let mut plan = sample_plan();

        let mut bad_level = PlanSectionInput::new("Heading");
        bad_level.heading_level = 9;
        assert!(plan.apply_update(vec![bad_level]).is_err());

        let mut unknown = PlanSectionInput::new("Heading");
        unknown.id = Some(Uuid::new_v4());
        assert!(plan.apply_update(vec![unknown]).is_err());

        let mut orphan = PlanSectionInput::new("Heading");
        orphan.parent_id = Some(Uuid::new_v4());
        assert!(plan.apply_update(vec![orphan]).is_err());

        assert_eq!(plan.sections.len(), 3);
    }

    #[test]
    fn test_update_rejects_parent_cycle() {
        let mut plan = sample_plan();
        let ids: Vec<Uuid> = plan.sections.iter().map(|s| s.id).collect();

        let section = |index: usize, parent: usize| {
            let mut input = PlanSectionInput::new(format!("Section {}", index));
            input.id = Some(ids[index]);
            input.parent_id = Some(ids[parent]);
            input
        };

        let err = plan
            .apply_update(vec![section(0, 1), section(1, 0)])
            .unwrap_err();
        assert!(err.to_string().contains("parent cycle"));

        let err = plan
            .apply_update(vec![section(0, 1), section(1, 2), section(2, 0)])
            .unwrap_err();
        assert!(err.to_string().contains("parent cycle"));
        assert_eq!(plan.sections[0].heading, "Introduction");
    }

    #[test]
    fn test_update_accepts_nested_parents() {
        let mut plan = sample_plan();
        let ids: Vec<Uuid> = plan.sections.iter().map(|s| s.id).collect();

        let root = {
            let mut input = PlanSectionInput::new("Root");
            input.id = Some(ids[0]);
            input
        };
        let mut child = PlanSectionInput::new("Child");
        child.id = Some(ids[1]);
        child.parent_id = Some(ids[0]);
        let mut grandchild = PlanSectionInput::new("Grandchild");
        grandchild.id = Some(ids[2]);
        grandchild.parent_id = Some(ids[1]);

        plan.apply_update(vec![root, child, grandchild]).unwrap();
        assert_eq!(plan.sections[2].parent_id, Some(ids[1]));
    }
}
