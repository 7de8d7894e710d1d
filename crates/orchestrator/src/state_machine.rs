use std::fmt;

use db::ProjectRepository;
use events::{Event, EventBus};
use scribe_core::{Project, ProjectStatus};
use tracing::info;

use crate::error::{OrchestratorError, Result};

/// Commands that may change a project's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GenerateTitles,
    SelectTitle,
    GeneratePlan,
    ApprovePlan,
    Run,
    /// Issued by the executor when a stage commits
    Advance,
    ApproveDraft,
    Export,
    Restart,
    /// Issued by the executor when a stage exhausts its attempts
    Fail,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateTitles => "generate-titles",
            Self::SelectTitle => "select-title",
            Self::GeneratePlan => "generate-plan",
            Self::ApprovePlan => "approve-plan",
            Self::Run => "run",
            Self::Advance => "advance",
            Self::ApproveDraft => "approve-draft",
            Self::Export => "export",
            Self::Restart => "restart",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates commands against the status table and persists accepted
/// transitions with a compare-and-swap on the stored status.
#[derive(Clone)]
pub struct ProjectStateMachine {
    projects: ProjectRepository,
    event_bus: EventBus,
}

impl ProjectStateMachine {
    pub fn new(projects: ProjectRepository, event_bus: EventBus) -> Self {
        Self {
            projects,
            event_bus,
        }
    }

    /// Target status for `command` issued in `from`.
    ///
    /// `Ok(None)` means the command is accepted but does not move the project.
    pub fn validate(command: Command, from: ProjectStatus) -> Result<Option<ProjectStatus>> {
        use ProjectStatus::*;

        let target = match (command, from) {
            (Command::GenerateTitles, Created | TitlesGenerated) => Some(TitlesGenerated),
            (Command::SelectTitle, TitlesGenerated) => Some(TitleSelected),
            (Command::GeneratePlan, TitleSelected) => Some(PlanGenerated),
            (Command::ApprovePlan, PlanGenerated) => Some(PlanApproved),
            (Command::Run, PlanApproved) => Some(Researching),
            (Command::Advance, Researching) => Some(Writing),
            (Command::Advance, Writing) => Some(Editing),
            (Command::Advance, Editing) => Some(DraftReady),
            (Command::ApproveDraft, DraftReady) => Some(Published),
            (Command::Export, DraftReady | Published) => None,
            (Command::Restart, Researching | Writing | Editing | Failed) => Some(Researching),
            (Command::Fail, status) if !status.is_terminal() => Some(Failed),
            (command, from) => return Err(OrchestratorError::invalid(command, from)),
        };
        Ok(target)
    }

    pub fn accepts(command: Command, from: ProjectStatus) -> bool {
        Self::validate(command, from).is_ok()
    }

    /// Validate `command` and persist the resulting status.
    ///
    /// Callers hold the project lock. A lost compare-and-swap is reported as
    /// an invalid transition and nothing is published.
    pub async fn apply(&self, project: &mut Project, command: Command) -> Result<ProjectStatus> {
        let from = project.status;
        let Some(to) = Self::validate(command, from)? else {
            return Ok(from);
        };

        if !self
            .projects
            .compare_and_set_status(project.id, from, to)
            .await?
        {
            let current = self
                .projects
                .find_by_id(project.id)
                .await?
                .map(|p| p.status)
                .unwrap_or(from);
            return Err(OrchestratorError::invalid(command, current));
        }

        info!(
            project_id = %project.id,
            command = %command,
            from = %from,
            to = %to,
            "Project state transition"
        );

        project.status = to;
        project.updated_at = chrono::Utc::now();
        self.event_bus
            .publish(project.id, Event::StatusChanged { from, to });
        Ok(to)
    }
}
