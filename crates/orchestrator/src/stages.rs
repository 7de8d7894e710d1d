//! Fixed ordering of the workflow stages and their progress weights.

use std::fmt;

use scribe_core::ProjectStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageName {
    TitleSelection,
    PlanApproval,
    Research,
    Write,
    Edit,
    DraftApproval,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TitleSelection => "TitleSelection",
            Self::PlanApproval => "PlanApproval",
            Self::Research => "Research",
            Self::Write => "Write",
            Self::Edit => "Edit",
            Self::DraftApproval => "DraftApproval",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Waits for a human command
    Checkpoint,
    /// Run by the pipeline executor
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: StageName,
    pub kind: StageKind,
    /// Share of overall progress, autonomous weights sum to 100
    pub estimated_weight: u8,
}

const REGISTRY: [StageDescriptor; 6] = [
    StageDescriptor {
        name: StageName::TitleSelection,
        kind: StageKind::Checkpoint,
        estimated_weight: 0,
    },
    StageDescriptor {
        name: StageName::PlanApproval,
        kind: StageKind::Checkpoint,
        estimated_weight: 0,
    },
    StageDescriptor {
        name: StageName::Research,
        kind: StageKind::Autonomous,
        estimated_weight: 30,
    },
    StageDescriptor {
        name: StageName::Write,
        kind: StageKind::Autonomous,
        estimated_weight: 50,
    },
    StageDescriptor {
        name: StageName::Edit,
        kind: StageKind::Autonomous,
        estimated_weight: 20,
    },
    StageDescriptor {
        name: StageName::DraftApproval,
        kind: StageKind::Checkpoint,
        estimated_weight: 0,
    },
];

pub fn registry() -> &'static [StageDescriptor] {
    &REGISTRY
}

/// Research, Write and Edit in execution order.
pub fn autonomous_stages() -> impl Iterator<Item = &'static StageDescriptor> {
    REGISTRY.iter().filter(|d| d.kind == StageKind::Autonomous)
}

pub fn descriptor(name: StageName) -> &'static StageDescriptor {
    // every StageName has exactly one entry
    REGISTRY
        .iter()
        .find(|d| d.name == name)
        .unwrap_or(&REGISTRY[0])
}

/// Sum of the weights of autonomous stages strictly before `name`.
pub fn completed_weight(name: StageName) -> u8 {
    autonomous_stages()
        .take_while(|d| d.name != name)
        .map(|d| d.estimated_weight)
        .sum()
}

/// Project status while the stage is running.
pub fn status_for(name: StageName) -> Option<ProjectStatus> {
    match name {
        StageName::Research => Some(ProjectStatus::Researching),
        StageName::Write => Some(ProjectStatus::Writing),
        StageName::Edit => Some(ProjectStatus::Editing),
        _ => None,
    }
}
