//! Human-facing commands over a project.
//!
//! Every mutating command takes the project lock for its whole duration, so
//! chained commands (`approve-plan` followed by `run`) are atomic with
//! respect to other commands and to executor commits.

use std::collections::BTreeMap;
use std::sync::Arc;

use db::{ProjectLog, Repositories};
use events::{Event, EventBus, RunState, DEFAULT_LOG_LIMIT};
use scribe_core::{
    CreateProjectRequest, Draft, ExportRequest, ExportResponse, LogEntry, Plan, Project,
    ProjectStatus, ResearchSource, SelectTitleRequest, Title, UpdateDraftRequest,
    UpdatePlanRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::{OrchestratorError, Result};
use crate::executor::PipelineExecutor;
use crate::export;
use crate::generators::{
    PlanGenerator, TemplatePlanGenerator, TemplateTitleGenerator, TitleGenerator,
};
use crate::locks::ProjectLocks;
use crate::stage::StageSet;
use crate::stages::StageName;
use crate::state_machine::{Command, ProjectStateMachine};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Execution state of a project as reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExecutionStatus {
    pub project_id: Uuid,
    pub run_id: Option<Uuid>,
    pub status: ProjectStatus,
    pub run_state: Option<RunState>,
    pub current_agent: Option<String>,
    pub progress_percent: u8,
    pub logs: Vec<LogEntry>,
    pub sources_discovered: u32,
    pub draft_version: Option<u32>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub overall_score: Option<f64>,
    pub error: Option<String>,
    pub is_complete: bool,
    pub is_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ApprovePlanOutcome {
    pub plan: Plan,
    /// Set when approval started the pipeline
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SelectTitleOutcome {
    pub title: Title,
    /// Set when selection also generated the plan
    pub plan: Option<Plan>,
}

#[derive(Clone)]
pub struct ProjectService {
    repos: Repositories,
    event_bus: EventBus,
    locks: ProjectLocks,
    state_machine: ProjectStateMachine,
    executor: PipelineExecutor,
    title_generator: Arc<dyn TitleGenerator>,
    plan_generator: Arc<dyn PlanGenerator>,
    config: ExecutorConfig,
}

impl ProjectService {
    /// Service backed by the template producers.
    pub fn new(repos: Repositories, event_bus: EventBus, config: ExecutorConfig) -> Self {
        let locks = ProjectLocks::new();
        Self {
            state_machine: ProjectStateMachine::new(repos.projects.clone(), event_bus.clone()),
            executor: PipelineExecutor::new(
                repos.clone(),
                event_bus.clone(),
                locks.clone(),
                StageSet::templates(),
                config.clone(),
            ),
            repos,
            event_bus,
            locks,
            title_generator: Arc::new(TemplateTitleGenerator),
            plan_generator: Arc::new(TemplatePlanGenerator),
            config,
        }
    }

    pub fn with_stages(mut self, stages: StageSet) -> Self {
        self.executor = PipelineExecutor::new(
            self.repos.clone(),
            self.event_bus.clone(),
            self.locks.clone(),
            stages,
            self.config.clone(),
        );
        self
    }

    pub fn with_title_generator(mut self, generator: Arc<dyn TitleGenerator>) -> Self {
        self.title_generator = generator;
        self
    }

    pub fn with_plan_generator(mut self, generator: Arc<dyn PlanGenerator>) -> Self {
        self.plan_generator = generator;
        self
    }

    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // Projects

    pub async fn create_project(&self, request: CreateProjectRequest) -> Result<Project> {
        request.validate()?;
        let project = self.repos.projects.create(&request.into_project()).await?;
        info!(project_id = %project.id, topic = %project.topic, "Project created");
        Ok(project)
    }

    pub async fn get_project(&self, project_id: Uuid) -> Result<Project> {
        Ok(self.repos.projects.get(project_id).await?)
    }

    /// Newest first. `page` starts at 1.
    pub async fn list_projects(&self, page: u32, per_page: u32) -> Result<ProjectPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(page - 1) * u64::from(per_page);
        let projects = self.repos.projects.find_page(per_page, offset).await?;
        let total = self.repos.projects.count().await?;
        Ok(ProjectPage {
            projects,
            total,
            page,
            per_page,
        })
    }

    pub async fn delete_project(&self, project_id: Uuid) -> Result<()> {
        {
            let _guard = self.locks.lock(project_id).await;
            self.executor.cancel_locked(project_id);
            if !self.repos.projects.delete(project_id).await? {
                return Err(OrchestratorError::ProjectNotFound(project_id));
            }
            self.event_bus.remove(project_id);
        }
        self.locks.remove_if_idle(project_id);
        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    // Titles

    pub async fn generate_titles(&self, project_id: Uuid) -> Result<Vec<Title>> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        ProjectStateMachine::validate(Command::GenerateTitles, project.status)?;

        let generated = self
            .title_generator
            .generate(&project)
            .await
            .map_err(|e| {
                OrchestratorError::stage_failed(StageName::TitleSelection.as_str(), 1, e.to_string())
            })?;
        if generated.is_empty() {
            return Err(OrchestratorError::stage_failed(
                StageName::TitleSelection.as_str(),
                1,
                "no titles were generated",
            ));
        }

        let titles: Vec<Title> = generated
            .into_iter()
            .map(|t| t.into_title(project_id))
            .collect();
        let titles = self
            .repos
            .titles
            .replace_for_project(project_id, &titles)
            .await?;

        self.state_machine
            .apply(&mut project, Command::GenerateTitles)
            .await?;
        self.checkpoint_log(
            project_id,
            StageName::TitleSelection,
            format!("Generated {} title candidates", titles.len()),
        )
        .await?;
        Ok(titles)
    }

    pub async fn list_titles(&self, project_id: Uuid) -> Result<Vec<Title>> {
        self.repos.projects.get(project_id).await?;
        Ok(self.repos.titles.find_by_project(project_id).await?)
    }

    pub async fn select_title(
        &self,
        project_id: Uuid,
        request: SelectTitleRequest,
    ) -> Result<SelectTitleOutcome> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        ProjectStateMachine::validate(Command::SelectTitle, project.status)?;

        let title = self.repos.titles.select(project_id, request.title_id).await?;
        project.selected_title_id = Some(title.id);
        self.state_machine
            .apply(&mut project, Command::SelectTitle)
            .await?;
        self.checkpoint_log(
            project_id,
            StageName::TitleSelection,
            format!("Selected title: {}", title.title),
        )
        .await?;

        let plan = if self.config.auto_plan_on_title_select {
            Some(self.generate_plan_locked(&mut project).await?)
        } else {
            None
        };
        Ok(SelectTitleOutcome { title, plan })
    }

    // Plan

    pub async fn generate_plan(&self, project_id: Uuid) -> Result<Plan> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        self.generate_plan_locked(&mut project).await
    }

    async fn generate_plan_locked(&self, project: &mut Project) -> Result<Plan> {
        ProjectStateMachine::validate(Command::GeneratePlan, project.status)?;
        let title = self
            .repos
            .titles
            .find_selected(project.id)
            .await?
            .ok_or_else(|| OrchestratorError::validation("no title has been selected"))?;

        let sections = self
            .plan_generator
            .generate(project, &title)
            .await
            .map_err(|e| {
                OrchestratorError::stage_failed(StageName::PlanApproval.as_str(), 1, e.to_string())
            })?;
        let plan = self
            .repos
            .plans
            .replace_for_project(&Plan::new(project.id, sections))
            .await?;

        self.state_machine
            .apply(project, Command::GeneratePlan)
            .await?;
        self.checkpoint_log(
            project.id,
            StageName::PlanApproval,
            format!(
                "Generated plan with {} sections ({} words)",
                plan.sections.len(),
                plan.total_estimated_words
            ),
        )
        .await?;
        Ok(plan)
    }

    pub async fn get_plan(&self, project_id: Uuid) -> Result<Plan> {
        self.repos.projects.get(project_id).await?;
        self.repos
            .plans
            .find_by_project(project_id)
            .await?
            .ok_or(OrchestratorError::PlanNotFound(project_id))
    }

    /// Edit the sections of a generated, unapproved plan. Locked sections
    /// are kept as they are.
    pub async fn update_plan(&self, project_id: Uuid, request: UpdatePlanRequest) -> Result<Plan> {
        let _guard = self.locks.lock(project_id).await;
        let project = self.repos.projects.get(project_id).await?;
        if project.status != ProjectStatus::PlanGenerated {
            return Err(OrchestratorError::validation(format!(
                "plan can only be edited while the project is plan_generated, not {}",
                project.status
            )));
        }

        let mut plan = self
            .repos
            .plans
            .find_by_project(project_id)
            .await?
            .ok_or(OrchestratorError::PlanNotFound(project_id))?;
        if plan.is_approved {
            return Err(OrchestratorError::validation("plan is already approved"));
        }

        plan.apply_update(request.sections)?;
        if !self.repos.plans.update_sections(&plan).await? {
            return Err(OrchestratorError::validation("plan is already approved"));
        }
        Ok(plan)
    }

    pub async fn approve_plan(&self, project_id: Uuid) -> Result<ApprovePlanOutcome> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        ProjectStateMachine::validate(Command::ApprovePlan, project.status)?;

        let plan = self
            .repos
            .plans
            .find_by_project(project_id)
            .await?
            .ok_or(OrchestratorError::PlanNotFound(project_id))?;
        // An approved plan under plan_generated is a transition that did not
        // persist; finish it instead of rejecting.
        if plan.is_approved {
            warn!(project_id = %project_id, "Plan already approved, completing transition");
        } else if !self.repos.plans.approve(plan.id).await? {
            return Err(OrchestratorError::validation("plan is already approved"));
        }
        self.state_machine
            .apply(&mut project, Command::ApprovePlan)
            .await?;
        self.checkpoint_log(project_id, StageName::PlanApproval, "Plan approved")
            .await?;

        let run_id = if self.config.auto_run_on_plan_approval {
            Some(self.executor.start_locked(&mut project, Command::Run).await?)
        } else {
            None
        };
        let plan = self
            .repos
            .plans
            .find_by_project(project_id)
            .await?
            .ok_or(OrchestratorError::PlanNotFound(project_id))?;
        Ok(ApprovePlanOutcome { plan, run_id })
    }

    // Execution

    pub async fn run(&self, project_id: Uuid) -> Result<Uuid> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        self.executor.start_locked(&mut project, Command::Run).await
    }

    /// Cancel any run, discard its unapproved draft and sources, and start
    /// again from research with the approved plan.
    pub async fn restart(&self, project_id: Uuid) -> Result<Uuid> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        ProjectStateMachine::validate(Command::Restart, project.status)?;

        self.executor.cancel_locked(project_id);
        let superseded = self.repos.drafts.supersede_unapproved(project_id).await?;
        let removed = self.repos.sources.delete_by_project(project_id).await?;
        info!(
            project_id = %project_id,
            superseded_drafts = superseded,
            removed_sources = removed,
            "Restarting pipeline"
        );

        self.executor
            .start_locked(&mut project, Command::Restart)
            .await
    }

    pub async fn status(&self, project_id: Uuid) -> Result<ExecutionStatus> {
        let project = self.repos.projects.get(project_id).await?;
        let is_running = self.executor.is_running(project_id);

        if let Some(record) = self.event_bus.snapshot(project_id) {
            return Ok(ExecutionStatus {
                project_id,
                run_id: Some(record.run_id),
                status: record.status,
                run_state: Some(record.run_state),
                current_agent: record.current_agent,
                progress_percent: record.progress_percent,
                logs: record.logs,
                sources_discovered: record.sources_discovered,
                draft_version: record.draft_version,
                confidence_scores: record.confidence_scores,
                overall_score: record.overall_score,
                error: record.error,
                is_complete: record.is_complete,
                is_running,
            });
        }

        // No run since this process started: rebuild from storage.
        let logs = self
            .repos
            .logs
            .find_recent(project_id, DEFAULT_LOG_LIMIT as u32)
            .await?
            .into_iter()
            .map(|log| log.entry)
            .collect();
        let sources = self.repos.sources.find_by_project(project_id).await?;
        let draft = self.repos.drafts.find_current(project_id).await?;
        let assessment = draft.as_ref().and_then(|d| d.assessment.clone());

        Ok(ExecutionStatus {
            project_id,
            run_id: None,
            status: project.status,
            run_state: None,
            current_agent: None,
            progress_percent: project.status.nominal_progress(),
            logs,
            sources_discovered: sources.len() as u32,
            draft_version: draft.as_ref().map(|d| d.version),
            confidence_scores: assessment
                .as_ref()
                .map(|a| a.scores.clone())
                .unwrap_or_default(),
            overall_score: assessment.map(|a| a.overall_score),
            error: None,
            is_complete: matches!(
                project.status,
                ProjectStatus::DraftReady | ProjectStatus::Published | ProjectStatus::Failed
            ),
            is_running,
        })
    }

    pub async fn logs(&self, project_id: Uuid, limit: u32) -> Result<Vec<ProjectLog>> {
        self.repos.projects.get(project_id).await?;
        Ok(self
            .repos
            .logs
            .find_recent(project_id, limit.clamp(1, 1000))
            .await?)
    }

    pub async fn sources(&self, project_id: Uuid) -> Result<Vec<ResearchSource>> {
        self.repos.projects.get(project_id).await?;
        Ok(self.repos.sources.find_by_project(project_id).await?)
    }

    // Draft

    pub async fn current_draft(&self, project_id: Uuid) -> Result<Draft> {
        self.repos.projects.get(project_id).await?;
        self.repos
            .drafts
            .find_current(project_id)
            .await?
            .ok_or(OrchestratorError::DraftNotFound(project_id))
    }

    /// Edit the current draft in place while it awaits approval.
    pub async fn update_draft(&self, project_id: Uuid, request: UpdateDraftRequest) -> Result<Draft> {
        request.validate()?;
        let _guard = self.locks.lock(project_id).await;
        let project = self.repos.projects.get(project_id).await?;
        if project.status != ProjectStatus::DraftReady {
            return Err(OrchestratorError::validation(format!(
                "draft can only be edited while the project is draft_ready, not {}",
                project.status
            )));
        }

        let draft = self
            .repos
            .drafts
            .update_current(project_id, &request)
            .await?
            .ok_or(OrchestratorError::DraftNotFound(project_id))?;
        self.event_bus.publish(
            project_id,
            Event::DraftUpdated {
                draft_id: draft.id,
                version: draft.version,
                word_count: draft.word_count,
            },
        );
        Ok(draft)
    }

    pub async fn approve_draft(&self, project_id: Uuid) -> Result<Draft> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        ProjectStateMachine::validate(Command::ApproveDraft, project.status)?;

        let mut draft = self
            .repos
            .drafts
            .find_current(project_id)
            .await?
            .ok_or(OrchestratorError::DraftNotFound(project_id))?;
        if !self.repos.drafts.approve(draft.id).await? {
            return Err(OrchestratorError::validation("draft is already approved"));
        }
        draft.is_approved = true;

        self.state_machine
            .apply(&mut project, Command::ApproveDraft)
            .await?;
        self.checkpoint_log(
            project_id,
            StageName::DraftApproval,
            format!("Draft v{} approved", draft.version),
        )
        .await?;
        Ok(draft)
    }

    pub async fn export(&self, project_id: Uuid, request: ExportRequest) -> Result<ExportResponse> {
        let project = self.repos.projects.get(project_id).await?;
        ProjectStateMachine::validate(Command::Export, project.status)?;
        let draft = self
            .repos
            .drafts
            .find_current(project_id)
            .await?
            .ok_or(OrchestratorError::DraftNotFound(project_id))?;
        Ok(export::render(&draft, &request))
    }

    async fn checkpoint_log(
        &self,
        project_id: Uuid,
        stage: StageName,
        message: impl Into<String>,
    ) -> Result<()> {
        self.executor
            .record_log(project_id, None, LogEntry::success(stage.as_str(), message))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::{ExportFormat, LogLevel, PlanSectionInput};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    use crate::executor::tests::{
        approved_project, fast_config, repos, wait_for, wait_idle, ScriptedStage,
    };

    async fn service() -> ProjectService {
        ProjectService::new(repos().await, EventBus::new(), fast_config())
    }

    async fn project_with_plan(service: &ProjectService) -> Project {
        let project = service
            .create_project(CreateProjectRequest::new(
                "Observability for async Rust",
                "Platform engineers",
            ))
            .await
            .unwrap();
        let titles = service.generate_titles(project.id).await.unwrap();
        service
            .select_title(
                project.id,
                SelectTitleRequest {
                    title_id: titles[1].id,
                },
            )
            .await
            .unwrap();
        service.generate_plan(project.id).await.unwrap();
        service.get_project(project.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_workflow() {
        let service = service().await;
        let project = project_with_plan(&service).await;
        assert_eq!(project.status, ProjectStatus::PlanGenerated);

        let outcome = service.approve_plan(project.id).await.unwrap();
        assert!(outcome.plan.is_approved);
        assert!(outcome.plan.sections.iter().all(|s| s.is_locked));
        assert!(outcome.run_id.is_some());

        wait_idle(service.executor(), project.id).await;
        let status = service.status(project.id).await.unwrap();
        assert_eq!(status.status, ProjectStatus::DraftReady);
        assert_eq!(status.progress_percent, 100);
        assert!(status.is_complete);

        let edited = service
            .update_draft(
                project.id,
                UpdateDraftRequest {
                    seo_title: Some("Custom SEO title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.seo_title.as_deref(), Some("Custom SEO title"));

        let approved = service.approve_draft(project.id).await.unwrap();
        assert!(approved.is_approved);
        assert_eq!(
            service.get_project(project.id).await.unwrap().status,
            ProjectStatus::Published
        );

        let exported = service
            .export(
                project.id,
                ExportRequest {
                    format: ExportFormat::Html,
                    include_metadata: true,
                },
            )
            .await
            .unwrap();
        assert!(exported.content.contains("<h2>"));
        assert_eq!(
            exported.metadata.unwrap().seo_title.as_deref(),
            Some("Custom SEO title")
        );
    }

    #[tokio::test]
    async fn test_rejected_command_leaves_state() {
        let service = service().await;
        let project = service
            .create_project(CreateProjectRequest::new("Async traits", "Library authors"))
            .await
            .unwrap();

        let err = service.approve_plan(project.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        let err = service.run(project.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        let err = service
            .export(project.id, ExportRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        assert_eq!(
            service.get_project(project.id).await.unwrap().status,
            ProjectStatus::Created
        );
    }

    #[tokio::test]
    async fn test_regenerating_titles_keeps_single_selection() {
        let service = service().await;
        let project = service
            .create_project(CreateProjectRequest::new("Error handling", "Rust beginners"))
            .await
            .unwrap();

        let first = service.generate_titles(project.id).await.unwrap();
        let second = service.generate_titles(project.id).await.unwrap();
        assert_ne!(first[0].id, second[0].id);

        service
            .select_title(project.id, SelectTitleRequest { title_id: second[2].id })
            .await
            .unwrap();
        let err = service
            .select_title(project.id, SelectTitleRequest { title_id: second[3].id })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

        let titles = service.list_titles(project.id).await.unwrap();
        assert_eq!(titles.len(), 5);
        assert_eq!(titles.iter().filter(|t| t.is_selected).count(), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_title() {
        let service = service().await;
        let project = service
            .create_project(CreateProjectRequest::new("Error handling", "Rust beginners"))
            .await
            .unwrap();
        service.generate_titles(project.id).await.unwrap();

        let missing = Uuid::new_v4();
        let err = service
            .select_title(project.id, SelectTitleRequest { title_id: missing })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TitleNotFound(id) if id == missing));
        assert_eq!(
            service.get_project(project.id).await.unwrap().status,
            ProjectStatus::TitlesGenerated
        );
    }

    #[tokio::test]
    async fn test_auto_plan_on_title_select() {
        let config = fast_config().with_auto_plan(true);
        let service = ProjectService::new(repos().await, EventBus::new(), config);
        let project = service
            .create_project(CreateProjectRequest::new("Const generics", "Library authors"))
            .await
            .unwrap();
        let titles = service.generate_titles(project.id).await.unwrap();

        let outcome = service
            .select_title(project.id, SelectTitleRequest { title_id: titles[0].id })
            .await
            .unwrap();
        assert!(outcome.plan.is_some());
        assert_eq!(
            service.get_project(project.id).await.unwrap().status,
            ProjectStatus::PlanGenerated
        );
    }

    #[tokio::test]
    async fn test_update_plan_keeps_locked_sections() {
        let service = ProjectService::new(repos().await, EventBus::new(), fast_config().with_auto_run(false));
        let project = project_with_plan(&service).await;
        let plan = service.get_plan(project.id).await.unwrap();

        let mut locked = PlanSectionInput::new("Locked intro");
        locked.id = Some(plan.sections[0].id);
        locked.is_locked = true;
        let locked_plan = service
            .update_plan(
                project.id,
                UpdatePlanRequest {
                    sections: vec![locked, PlanSectionInput::new("Fresh section")],
                },
            )
            .await
            .unwrap();
        assert_eq!(locked_plan.sections.len(), 2);
        assert!(locked_plan.sections[0].is_locked);

        let updated = service
            .update_plan(
                project.id,
                UpdatePlanRequest {
                    sections: vec![PlanSectionInput::new("Replacement")],
                },
            )
            .await
            .unwrap();
        let headings: Vec<&str> = updated.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Locked intro", "Replacement"]);
        let orders: Vec<u32> = updated.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1]);

        let outcome = service.approve_plan(project.id).await.unwrap();
        assert!(outcome.run_id.is_none());
        let err = service
            .update_plan(project.id, UpdatePlanRequest { sections: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approve_plan_completes_interrupted_approval() {
        let repos = repos().await;
        let service = ProjectService::new(repos.clone(), EventBus::new(), fast_config().with_auto_run(false));
        let project = project_with_plan(&service).await;
        let plan = service.get_plan(project.id).await.unwrap();

        // plan row approved, status write lost
        assert!(repos.plans.approve(plan.id).await.unwrap());
        assert_eq!(
            service.get_project(project.id).await.unwrap().status,
            ProjectStatus::PlanGenerated
        );

        let outcome = service.approve_plan(project.id).await.unwrap();
        assert!(outcome.plan.is_approved);
        assert_eq!(
            service.get_project(project.id).await.unwrap().status,
            ProjectStatus::PlanApproved
        );

        let err = service.approve_plan(project.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_restart_during_writing() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let gate = Arc::new(Semaphore::new(0));
        let service = ProjectService::new(repos.clone(), bus.clone(), fast_config()).with_stages(
            StageSet::new(
                Arc::new(ScriptedStage::new(StageName::Research)),
                Arc::new(ScriptedStage::new(StageName::Write).gated(Arc::clone(&gate))),
                Arc::new(ScriptedStage::new(StageName::Edit)),
            ),
        );
        let mut rx = bus.subscribe(project.id);

        let first = service.run(project.id).await.unwrap();
        wait_for(&mut rx, |e| matches!(e, Event::StageStarted { stage, .. } if stage == "Write")).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(bus.snapshot(project.id).unwrap().progress_percent >= 30);

        let second = service.restart(project.id).await.unwrap();
        assert_ne!(first, second);
        let snapshot = bus.snapshot(project.id).unwrap();
        assert_eq!(snapshot.run_id, second);
        assert!(snapshot.progress_percent < 30);
        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::Researching
        );

        gate.add_permits(2);
        wait_idle(service.executor(), project.id).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let drafts = repos.drafts.find_by_project(project.id).await.unwrap();
        let versions: Vec<u32> = drafts.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![2, 1]);
        assert_eq!(drafts.iter().filter(|d| d.is_current).count(), 1);
        assert_eq!(repos.sources.find_by_project(project.id).await.unwrap().len(), 1);
        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::DraftReady
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_run_and_restart_keep_one_execution() {
        const CALLERS: usize = 8;

        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let gate = Arc::new(Semaphore::new(0));
        let service = ProjectService::new(repos.clone(), bus.clone(), fast_config()).with_stages(
            StageSet::new(
                Arc::new(ScriptedStage::new(StageName::Research).gated(Arc::clone(&gate))),
                Arc::new(ScriptedStage::new(StageName::Write)),
                Arc::new(ScriptedStage::new(StageName::Edit)),
            ),
        );

        let project_id = project.id;
        let runs: Vec<_> = (0..CALLERS)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.run(project_id).await })
            })
            .collect();
        let mut started = 0;
        for handle in runs {
            match handle.await.unwrap() {
                Ok(_) => started += 1,
                Err(err) => assert!(matches!(
                    err,
                    OrchestratorError::AlreadyRunning(_) | OrchestratorError::InvalidTransition { .. }
                )),
            }
        }
        assert_eq!(started, 1);
        assert_eq!(service.executor().registry().len(), 1);

        let restarts: Vec<_> = (0..CALLERS)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.restart(project_id).await })
            })
            .collect();
        let mut run_ids = Vec::new();
        for handle in restarts {
            run_ids.push(handle.await.unwrap().unwrap());
        }
        run_ids.sort();
        run_ids.dedup();
        assert_eq!(run_ids.len(), CALLERS);
        assert_eq!(service.executor().registry().len(), 1);

        let current_run = bus.snapshot(project.id).unwrap().run_id;
        assert!(service.executor().registry().is_current(project.id, current_run));

        gate.add_permits(CALLERS * 2);
        wait_idle(service.executor(), project.id).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(service.executor().registry().is_empty());
        let drafts = repos.drafts.find_by_project(project.id).await.unwrap();
        assert_eq!(drafts.iter().filter(|d| d.is_current).count(), 1);
        assert!(drafts.windows(2).all(|w| w[0].version > w[1].version));
        assert_eq!(drafts[0].version, 2);
        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::DraftReady
        );
    }

    #[tokio::test]
    async fn test_restart_after_failure_reuses_plan() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let plan_before = repos.plans.find_by_project(project.id).await.unwrap().unwrap();
        let service = ProjectService::new(repos.clone(), bus.clone(), fast_config()).with_stages(
            StageSet::new(
                Arc::new(ScriptedStage::new(StageName::Research)),
                Arc::new(ScriptedStage::new(StageName::Write)),
                Arc::new(ScriptedStage::new(StageName::Edit).failing(3)),
            ),
        );

        service.run(project.id).await.unwrap();
        wait_idle(service.executor(), project.id).await;
        let failed = service.status(project.id).await.unwrap();
        assert_eq!(failed.status, ProjectStatus::Failed);
        assert_eq!(failed.run_state, Some(RunState::Failed));

        service.restart(project.id).await.unwrap();
        wait_idle(service.executor(), project.id).await;

        let status = service.status(project.id).await.unwrap();
        assert_eq!(status.status, ProjectStatus::DraftReady);
        let plan_after = repos.plans.find_by_project(project.id).await.unwrap().unwrap();
        assert_eq!(plan_before.id, plan_after.id);

        let current = repos.drafts.find_current(project.id).await.unwrap().unwrap();
        assert_eq!(current.version, 3);
    }

    #[tokio::test]
    async fn test_restart_rejected_before_run() {
        let service = service().await;
        let project = project_with_plan(&service).await;
        let err = service.restart(project.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_status_falls_back_to_storage() {
        let repos = repos().await;
        let project = approved_project(&repos).await;
        repos
            .logs
            .append(project.id, None, &LogEntry::error("Research", "old failure"))
            .await
            .unwrap();

        let service = ProjectService::new(repos, EventBus::new(), fast_config());
        let status = service.status(project.id).await.unwrap();
        assert_eq!(status.run_id, None);
        assert_eq!(status.status, ProjectStatus::PlanApproved);
        assert_eq!(status.progress_percent, ProjectStatus::PlanApproved.nominal_progress());
        assert_eq!(status.logs.len(), 1);
        assert_eq!(status.logs[0].level, LogLevel::Error);
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_list_and_delete_projects() {
        let service = service().await;
        for topic in ["First topic", "Second topic", "Third topic"] {
            service
                .create_project(CreateProjectRequest::new(topic, "General readers"))
                .await
                .unwrap();
        }

        let page = service.list_projects(1, 2).await.unwrap();
        assert_eq!(page.projects.len(), 2);
        assert_eq!(page.total, 3);

        let id = page.projects[0].id;
        service.delete_project(id).await.unwrap();
        assert!(matches!(
            service.get_project(id).await.unwrap_err(),
            OrchestratorError::ProjectNotFound(_)
        ));
        assert!(matches!(
            service.delete_project(id).await.unwrap_err(),
            OrchestratorError::ProjectNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let service = service().await;
        service
            .create_project(CreateProjectRequest::new("Only topic", "General readers"))
            .await
            .unwrap();

        let page = service.list_projects(100_000_000, MAX_PAGE_SIZE).await.unwrap();
        assert!(page.projects.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page, 100_000_000);

        let last = service.list_projects(u32::MAX, u32::MAX).await.unwrap();
        assert!(last.projects.is_empty());
        assert_eq!(last.per_page, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_create_project_validation() {
        let service = service().await;
        let err = service
            .create_project(CreateProjectRequest::new("abc", "General readers"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }
}
