//! Asynchronous runner for the Research, Write and Edit stages.
//!
//! A run is a spawned task that walks the autonomous stages in order. Every
//! write it makes (artifacts, logs, status changes) happens under the project
//! lock and only while the registry still maps the project to the run, so a
//! cancelled or restarted run can never commit.

use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use db::Repositories;
use events::{Event, EventBus};
use scribe_core::{Draft, LogEntry, Project, ProjectStatus, ResearchSource, Title};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::{OrchestratorError, Result};
use crate::locks::ProjectLocks;
use crate::registry::{ExecutionHandle, ExecutionRegistry};
use crate::stage::{ProgressReporter, Stage, StageInput, StageOutput, StageSet};
use crate::stages::{self, StageName};
use crate::state_machine::{Command, ProjectStateMachine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Failed,
    /// Cancelled or replaced by a newer run
    Superseded,
}

enum AttemptsOutcome {
    Output(StageOutput),
    Exhausted(u32),
    Cancelled,
}

#[derive(Clone)]
pub struct PipelineExecutor {
    repos: Repositories,
    state_machine: ProjectStateMachine,
    event_bus: EventBus,
    registry: Arc<ExecutionRegistry>,
    locks: ProjectLocks,
    stages: StageSet,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    pub fn new(
        repos: Repositories,
        event_bus: EventBus,
        locks: ProjectLocks,
        stages: StageSet,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            state_machine: ProjectStateMachine::new(repos.projects.clone(), event_bus.clone()),
            repos,
            event_bus,
            registry: Arc::new(ExecutionRegistry::new()),
            locks,
            stages,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    pub fn is_running(&self, project_id: Uuid) -> bool {
        self.registry.is_running(project_id)
    }

    /// Run the pipeline for a project in `plan_approved`.
    pub async fn start(&self, project_id: Uuid) -> Result<Uuid> {
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.repos.projects.get(project_id).await?;
        self.start_locked(&mut project, Command::Run).await
    }

    /// Register and spawn a run, moving the project into `researching`
    /// through `command` (`Run` or `Restart`).
    ///
    /// The caller holds the project lock. Returns as soon as the task is
    /// spawned.
    pub async fn start_locked(&self, project: &mut Project, command: Command) -> Result<Uuid> {
        if self.registry.is_running(project.id) {
            return Err(OrchestratorError::AlreadyRunning(project.id));
        }
        ProjectStateMachine::validate(command, project.status)?;

        let project_id = project.id;
        let run_id = Uuid::new_v4();
        let token = self
            .registry
            .register(project_id, ExecutionHandle::new(run_id))?;

        self.event_bus.begin_run(project_id, run_id, project.status);
        self.event_bus
            .publish(project_id, Event::ExecutionStarted { run_id });

        if let Err(err) = self.state_machine.apply(project, command).await {
            self.registry.retire(project_id, run_id);
            self.event_bus.publish(
                project_id,
                Event::ExecutionFailed {
                    run_id,
                    error: err.to_string(),
                },
            );
            return Err(err);
        }

        let executor = self.clone();
        let handle = tokio::spawn(async move {
            executor.run(project_id, run_id, token).await;
        });
        self.registry.attach(project_id, run_id, handle);

        info!(project_id = %project_id, run_id = %run_id, "Pipeline started");
        Ok(run_id)
    }

    /// Cancel the project's run, if any. The caller holds the project lock.
    ///
    /// The task notices at its next stage boundary; a stage already running
    /// is left to finish but its result is discarded.
    pub fn cancel_locked(&self, project_id: Uuid) -> Option<Uuid> {
        let run_id = self.registry.cancel(project_id)?;
        self.event_bus
            .publish(project_id, Event::ExecutionCancelled { run_id });
        info!(project_id = %project_id, run_id = %run_id, "Pipeline cancelled");
        Some(run_id)
    }

    pub async fn cancel(&self, project_id: Uuid) -> Option<Uuid> {
        let _guard = self.locks.lock(project_id).await;
        self.cancel_locked(project_id)
    }

    /// Persist a log entry and publish it. The caller holds the project lock.
    pub async fn record_log(
        &self,
        project_id: Uuid,
        run_id: Option<Uuid>,
        entry: LogEntry,
    ) -> Result<()> {
        self.repos.logs.append(project_id, run_id, &entry).await?;
        self.event_bus
            .publish(project_id, Event::AgentLog { entry });
        Ok(())
    }

    async fn run(self, project_id: Uuid, run_id: Uuid, token: CancellationToken) {
        match self.drive(project_id, run_id, &token).await {
            Ok(RunOutcome::Completed) => {
                info!(project_id = %project_id, run_id = %run_id, "Pipeline completed");
            }
            Ok(RunOutcome::Failed) => {
                warn!(project_id = %project_id, run_id = %run_id, "Pipeline failed");
            }
            Ok(RunOutcome::Superseded) => {
                debug!(project_id = %project_id, run_id = %run_id, "Pipeline run superseded");
            }
            Err(err) => {
                error!(
                    project_id = %project_id,
                    run_id = %run_id,
                    error = %err,
                    "Pipeline aborted"
                );
                if let Err(fail_err) = self.fail(project_id, run_id, err.to_string()).await {
                    error!(
                        project_id = %project_id,
                        error = %fail_err,
                        "Failed to record pipeline failure"
                    );
                    self.registry.retire(project_id, run_id);
                }
            }
        }
    }

    async fn drive(
        &self,
        project_id: Uuid,
        run_id: Uuid,
        token: &CancellationToken,
    ) -> Result<RunOutcome> {
        let high_water = Arc::new(AtomicU8::new(0));

        for descriptor in stages::autonomous_stages() {
            if token.is_cancelled() {
                return Ok(RunOutcome::Superseded);
            }
            let Some(stage) = self.stages.get(descriptor.name) else {
                continue;
            };

            let reporter = ProgressReporter::new(
                self.event_bus.clone(),
                project_id,
                run_id,
                descriptor.name,
                Arc::clone(&high_water),
                token.clone(),
            );

            match self
                .attempt_stage(project_id, run_id, descriptor.name, stage.as_ref(), &reporter, token)
                .await?
            {
                AttemptsOutcome::Output(output) => {
                    if !self
                        .commit(project_id, run_id, descriptor.name, output, &reporter)
                        .await?
                    {
                        return Ok(RunOutcome::Superseded);
                    }
                }
                AttemptsOutcome::Exhausted(attempts) => {
                    let exhausted = OrchestratorError::PipelineExhausted {
                        stage: descriptor.name.to_string(),
                        attempts,
                    };
                    return Ok(if self.fail(project_id, run_id, exhausted.to_string()).await? {
                        RunOutcome::Failed
                    } else {
                        RunOutcome::Superseded
                    });
                }
                AttemptsOutcome::Cancelled => return Ok(RunOutcome::Superseded),
            }
        }

        Ok(RunOutcome::Completed)
    }

    async fn attempt_stage(
        &self,
        project_id: Uuid,
        run_id: Uuid,
        name: StageName,
        stage: &dyn Stage,
        reporter: &ProgressReporter,
        token: &CancellationToken,
    ) -> Result<AttemptsOutcome> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self
                .begin_attempt(project_id, run_id, name, attempt, max_attempts)
                .await?
            {
                return Ok(AttemptsOutcome::Cancelled);
            }
            let input = self.load_input(project_id, attempt).await?;

            let result = tokio::time::timeout(self.config.stage_timeout(), stage.run(&input, reporter)).await;
            let reason = match result {
                Ok(Ok(output)) if output.fits(name) => return Ok(AttemptsOutcome::Output(output)),
                Ok(Ok(_)) => format!("{} produced an unexpected artifact", name),
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("timed out after {}ms", self.config.stage_timeout_ms),
            };

            let failure = OrchestratorError::stage_failed(name.as_str(), attempt, reason);
            warn!(
                project_id = %project_id,
                stage = %name,
                attempt,
                error = %failure,
                "Stage attempt failed"
            );
            if !self
                .log_fenced(project_id, run_id, LogEntry::error(name.as_str(), failure.to_string()))
                .await?
            {
                return Ok(AttemptsOutcome::Cancelled);
            }

            if attempt >= max_attempts {
                return Ok(AttemptsOutcome::Exhausted(attempt));
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(AttemptsOutcome::Cancelled),
                _ = tokio::time::sleep(self.config.backoff_for(attempt)) => {}
            }
        }
    }

    async fn begin_attempt(
        &self,
        project_id: Uuid,
        run_id: Uuid,
        name: StageName,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<bool> {
        let _guard = self.locks.lock(project_id).await;
        if !self.registry.is_current(project_id, run_id) {
            return Ok(false);
        }

        self.event_bus.publish(
            project_id,
            Event::StageStarted {
                stage: name.to_string(),
                attempt,
            },
        );
        self.record_log(
            project_id,
            Some(run_id),
            LogEntry::info(
                name.as_str(),
                format!("Starting attempt {}/{}", attempt, max_attempts),
            ),
        )
        .await?;
        Ok(true)
    }

    async fn log_fenced(&self, project_id: Uuid, run_id: Uuid, entry: LogEntry) -> Result<bool> {
        let _guard = self.locks.lock(project_id).await;
        if !self.registry.is_current(project_id, run_id) {
            return Ok(false);
        }
        self.record_log(project_id, Some(run_id), entry).await?;
        Ok(true)
    }

    async fn load_input(&self, project_id: Uuid, attempt: u32) -> Result<StageInput> {
        let project = self.repos.projects.get(project_id).await?;
        let title = self
            .repos
            .titles
            .find_selected(project_id)
            .await?
            .map(|t: Title| t.title)
            .unwrap_or_else(|| project.topic.clone());
        let plan = self
            .repos
            .plans
            .find_by_project(project_id)
            .await?
            .ok_or(OrchestratorError::PlanNotFound(project_id))?;
        let sources = self.repos.sources.find_by_project(project_id).await?;
        let draft = self.repos.drafts.find_current(project_id).await?;

        Ok(StageInput {
            project,
            title,
            plan,
            sources,
            draft,
            attempt,
        })
    }

    /// Persist a stage's artifact and advance the project.
    ///
    /// Returns `false` without writing anything if the run is no longer current.
    async fn commit(
        &self,
        project_id: Uuid,
        run_id: Uuid,
        name: StageName,
        output: StageOutput,
        reporter: &ProgressReporter,
    ) -> Result<bool> {
        let _guard = self.locks.lock(project_id).await;
        if !self.registry.is_current(project_id, run_id) {
            debug!(project_id = %project_id, stage = %name, "Discarding output of stale run");
            return Ok(false);
        }

        let mut project = self.repos.projects.get(project_id).await?;
        if stages::status_for(name) != Some(project.status) {
            return Err(OrchestratorError::invalid(Command::Advance, project.status));
        }

        let summary = match output {
            StageOutput::Research(found) => {
                let sources: Vec<ResearchSource> = found
                    .into_iter()
                    .map(|source| source.into_source(project_id))
                    .collect();
                self.repos.sources.create_many(&sources).await?;
                for source in &sources {
                    self.event_bus.publish(
                        project_id,
                        Event::SourceDiscovered {
                            url: source.url.clone(),
                            title: source.title.clone(),
                            domain: source.domain.clone(),
                            credibility_score: source.credibility_score,
                        },
                    );
                }
                format!("Collected {} sources", sources.len())
            }
            StageOutput::Draft(content) => {
                let draft = self
                    .repos
                    .drafts
                    .create_current(&Draft::from_content(project_id, content))
                    .await?;
                self.publish_draft(&draft);
                format!("Wrote draft v{} ({} words)", draft.version, draft.word_count)
            }
            StageOutput::Edited(content, assessment) => {
                let mut draft = Draft::from_content(project_id, content);
                draft.assessment = Some(assessment);
                let draft = self.repos.drafts.create_current(&draft).await?;
                self.publish_draft(&draft);

                let mut overall = 0.0;
                if let Some(scored) = &draft.assessment {
                    overall = scored.overall_score;
                    self.event_bus.publish(
                        project_id,
                        Event::ScoresUpdated {
                            scores: scored.scores.clone(),
                            overall_score: scored.overall_score,
                        },
                    );
                }
                format!("Edited draft v{} (overall score {:.1})", draft.version, overall)
            }
        };

        self.record_log(project_id, Some(run_id), LogEntry::success(name.as_str(), summary))
            .await?;
        reporter.complete();

        let status = self
            .state_machine
            .apply(&mut project, Command::Advance)
            .await?;
        if status == ProjectStatus::DraftReady {
            self.event_bus
                .publish(project_id, Event::ExecutionCompleted { run_id });
            self.registry.retire(project_id, run_id);
        }

        Ok(true)
    }

    fn publish_draft(&self, draft: &Draft) {
        self.event_bus.publish(
            draft.project_id,
            Event::DraftUpdated {
                draft_id: draft.id,
                version: draft.version,
                word_count: draft.word_count,
            },
        );
    }

    /// Move the project to `failed` and retire the run.
    async fn fail(&self, project_id: Uuid, run_id: Uuid, error: String) -> Result<bool> {
        let _guard = self.locks.lock(project_id).await;
        if !self.registry.is_current(project_id, run_id) {
            return Ok(false);
        }

        let mut project = self.repos.projects.get(project_id).await?;
        if ProjectStateMachine::accepts(Command::Fail, project.status) {
            self.state_machine.apply(&mut project, Command::Fail).await?;
        }
        self.event_bus
            .publish(project_id, Event::ExecutionFailed { run_id, error });
        self.registry.retire(project_id, run_id);
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use db::{create_pool, run_migrations};
    use events::{EventEnvelope, RunState};
    use scribe_core::{
        DraftContent, LogLevel, NewResearchSource, NewTitle, Plan, PlanSection,
        QualityAssessment, SearchIntent,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::sync::Semaphore;

    use crate::stage::StageError;

    /// Fails `failures` times, then returns the artifact for its stage.
    pub(crate) struct ScriptedStage {
        name: StageName,
        failures: u32,
        delay: Duration,
        gate: Option<Arc<Semaphore>>,
        calls: AtomicU32,
    }

    impl ScriptedStage {
        pub(crate) fn new(name: StageName) -> Self {
            Self {
                name,
                failures: 0,
                delay: Duration::ZERO,
                gate: None,
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn failing(mut self, failures: u32) -> Self {
            self.failures = failures;
            self
        }

        pub(crate) fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Stage for ScriptedStage {
        async fn run(
            &self,
            input: &StageInput,
            progress: &ProgressReporter,
        ) -> std::result::Result<StageOutput, StageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            progress.report(0.5);
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.map_err(|e| StageError::new(e.to_string()))?;
                permit.forget();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call <= self.failures {
                return Err(StageError::new(format!("scripted failure {}", call)));
            }

            Ok(match self.name {
                StageName::Research => StageOutput::Research(vec![NewResearchSource::new(
                    "https://docs.rs/tokio",
                    "Tokio docs",
                )]),
                StageName::Write => {
                    StageOutput::Draft(DraftContent::markdown(format!("# {}\n\nBody", input.title)))
                }
                _ => {
                    let mut scores = BTreeMap::new();
                    scores.insert("helpful".to_string(), 8.0);
                    StageOutput::Edited(
                        DraftContent::markdown("# Edited\n\nBody"),
                        QualityAssessment::from_scores(scores),
                    )
                }
            })
        }
    }

    pub(crate) async fn repos() -> Repositories {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        Repositories::new(pool)
    }

    /// A project with a selected title and an approved plan.
    pub(crate) async fn approved_project(repos: &Repositories) -> Project {
        let mut project = Project::new("Structured concurrency", "Rust developers");
        project.status = ProjectStatus::PlanApproved;
        let project = repos.projects.create(&project).await.unwrap();

        let title = NewTitle {
            title: "Structured concurrency with Tokio".to_string(),
            description: "Guide".to_string(),
            search_intent: SearchIntent::Informational,
            difficulty: 5,
        }
        .into_title(project.id);
        repos
            .titles
            .replace_for_project(project.id, &[title.clone()])
            .await
            .unwrap();
        repos.titles.select(project.id, title.id).await.unwrap();

        let plan = Plan::new(
            project.id,
            vec![
                PlanSection::new("Introduction", 200),
                PlanSection::new("Task groups", 400),
            ],
        );
        let plan = repos.plans.replace_for_project(&plan).await.unwrap();
        repos.plans.approve(plan.id).await.unwrap();
        repos.projects.get(project.id).await.unwrap()
    }

    pub(crate) fn fast_config() -> ExecutorConfig {
        ExecutorConfig::default()
            .with_stage_timeout(Duration::from_secs(5))
            .with_retry_backoff(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn executor(repos: &Repositories, bus: &EventBus, stages: StageSet, config: ExecutorConfig) -> PipelineExecutor {
        PipelineExecutor::new(repos.clone(), bus.clone(), ProjectLocks::new(), stages, config)
    }

    fn scripted() -> StageSet {
        StageSet::new(
            Arc::new(ScriptedStage::new(StageName::Research)),
            Arc::new(ScriptedStage::new(StageName::Write)),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        )
    }

    pub(crate) async fn wait_idle(executor: &PipelineExecutor, project_id: Uuid) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while executor.is_running(project_id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pipeline did not finish");
    }

    pub(crate) async fn wait_for<F>(rx: &mut broadcast::Receiver<EventEnvelope>, mut matches: F) -> EventEnvelope
    where
        F: FnMut(&Event) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let envelope = rx.recv().await.unwrap();
                if matches(&envelope.event) {
                    return envelope;
                }
            }
        })
        .await
        .expect("event not received")
    }

    #[tokio::test]
    async fn test_pipeline_reaches_draft_ready() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let executor = executor(&repos, &bus, scripted(), fast_config());

        executor.start(project.id).await.unwrap();
        wait_idle(&executor, project.id).await;

        let stored = repos.projects.get(project.id).await.unwrap();
        assert_eq!(stored.status, ProjectStatus::DraftReady);

        let drafts = repos.drafts.find_by_project(project.id).await.unwrap();
        let versions: Vec<u32> = drafts.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![2, 1]);
        assert!(drafts[0].is_current && drafts[0].assessment.is_some());
        assert!(!drafts[1].is_current);
        assert_eq!(repos.sources.find_by_project(project.id).await.unwrap().len(), 1);

        let snapshot = bus.snapshot(project.id).unwrap();
        assert_eq!(snapshot.run_state, RunState::Completed);
        assert_eq!(snapshot.status, ProjectStatus::DraftReady);
        assert_eq!(snapshot.progress_percent, 100);
        assert_eq!(snapshot.sources_discovered, 1);
        assert!(snapshot.is_complete);
        assert!(executor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_template_stages_complete() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let executor = executor(&repos, &bus, StageSet::templates(), fast_config());

        executor.start(project.id).await.unwrap();
        wait_idle(&executor, project.id).await;

        let draft = repos.drafts.find_current(project.id).await.unwrap().unwrap();
        assert!(draft.content_markdown.contains("## Task groups"));
        assert!(draft.seo_title.is_some());
        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::DraftReady
        );
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let gate = Arc::new(Semaphore::new(0));
        let stages = StageSet::new(
            Arc::new(ScriptedStage::new(StageName::Research).gated(Arc::clone(&gate))),
            Arc::new(ScriptedStage::new(StageName::Write)),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        );
        let executor = executor(&repos, &bus, stages, fast_config());

        executor.start(project.id).await.unwrap();
        let err = executor.start(project.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyRunning(id) if id == project.id));

        gate.add_permits(1);
        wait_idle(&executor, project.id).await;
    }

    #[tokio::test]
    async fn test_start_requires_approved_plan_status() {
        let repos = repos().await;
        let project = repos
            .projects
            .create(&Project::new("Not ready yet", "Anyone at all"))
            .await
            .unwrap();
        let executor = executor(&repos, &EventBus::new(), scripted(), fast_config());

        let err = executor.start(project.id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert!(executor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_thirty_after_research() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let gate = Arc::new(Semaphore::new(0));
        let stages = StageSet::new(
            Arc::new(ScriptedStage::new(StageName::Research)),
            Arc::new(ScriptedStage::new(StageName::Write).gated(Arc::clone(&gate))),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        );
        let executor = executor(&repos, &bus, stages, fast_config());
        let mut rx = bus.subscribe(project.id);

        let run_id = executor.start(project.id).await.unwrap();
        wait_for(&mut rx, |e| {
            matches!(e, Event::AgentLog { entry } if entry.agent == "Research" && entry.level == LogLevel::Success)
        })
        .await;

        let progress = rx.recv().await.unwrap();
        assert_eq!(
            progress.event,
            Event::Progress {
                run_id,
                percent: 30,
                stage: Some("Research".to_string()),
            }
        );
        let advanced = rx.recv().await.unwrap();
        assert!(matches!(
            advanced.event,
            Event::StatusChanged {
                from: ProjectStatus::Researching,
                to: ProjectStatus::Writing,
            }
        ));

        gate.add_permits(1);
        wait_idle(&executor, project.id).await;
    }

    #[tokio::test]
    async fn test_permanent_failure_logs_each_attempt() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let research = Arc::new(ScriptedStage::new(StageName::Research).failing(u32::MAX));
        let stages = StageSet::new(
            research.clone(),
            Arc::new(ScriptedStage::new(StageName::Write)),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        );
        let executor = executor(&repos, &bus, stages, fast_config());

        executor.start(project.id).await.unwrap();
        wait_idle(&executor, project.id).await;

        assert_eq!(research.calls(), 3);
        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::Failed
        );

        let logs = repos.logs.find_recent(project.id, 100).await.unwrap();
        let errors: Vec<_> = logs
            .iter()
            .filter(|l| l.entry.level == LogLevel::Error)
            .collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|l| l.entry.agent == "Research"));

        let snapshot = bus.snapshot(project.id).unwrap();
        assert_eq!(snapshot.run_state, RunState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("Research failed after 3 attempts"));
    }

    #[tokio::test]
    async fn test_flaky_stage_recovers() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let stages = StageSet::new(
            Arc::new(ScriptedStage::new(StageName::Research)),
            Arc::new(ScriptedStage::new(StageName::Write).failing(1)),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        );
        let executor = executor(&repos, &bus, stages, fast_config());

        executor.start(project.id).await.unwrap();
        wait_idle(&executor, project.id).await;

        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::DraftReady
        );
        let logs = repos.logs.find_recent(project.id, 100).await.unwrap();
        let errors = logs.iter().filter(|l| l.entry.level == LogLevel::Error).count();
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let stages = StageSet::new(
            Arc::new(ScriptedStage::new(StageName::Research).slow(Duration::from_millis(500))),
            Arc::new(ScriptedStage::new(StageName::Write)),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        );
        let config = fast_config()
            .with_stage_timeout(Duration::from_millis(20))
            .with_max_attempts(2);
        let executor = executor(&repos, &bus, stages, config);

        executor.start(project.id).await.unwrap();
        wait_idle(&executor, project.id).await;

        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::Failed
        );
        let logs = repos.logs.find_recent(project.id, 100).await.unwrap();
        let timeouts = logs
            .iter()
            .filter(|l| l.entry.level == LogLevel::Error && l.entry.message.contains("timed out"))
            .count();
        assert_eq!(timeouts, 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_identical_order() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let executor = executor(&repos, &bus, scripted(), fast_config());
        let mut rx1 = bus.subscribe(project.id);
        let mut rx2 = bus.subscribe(project.id);

        executor.start(project.id).await.unwrap();
        wait_idle(&executor, project.id).await;

        let mut first = Vec::new();
        while let Ok(envelope) = rx1.try_recv() {
            first.push(envelope.sequence);
        }
        let mut second = Vec::new();
        while let Ok(envelope) = rx2.try_recv() {
            second.push(envelope.sequence);
        }

        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_cancelled_run_cannot_commit() {
        let repos = repos().await;
        let bus = EventBus::new();
        let project = approved_project(&repos).await;
        let gate = Arc::new(Semaphore::new(0));
        let stages = StageSet::new(
            Arc::new(ScriptedStage::new(StageName::Research)),
            Arc::new(ScriptedStage::new(StageName::Write).gated(Arc::clone(&gate))),
            Arc::new(ScriptedStage::new(StageName::Edit)),
        );
        let executor = executor(&repos, &bus, stages, fast_config());
        let mut rx = bus.subscribe(project.id);

        let run_id = executor.start(project.id).await.unwrap();
        wait_for(&mut rx, |e| matches!(e, Event::StageStarted { stage, .. } if stage == "Write")).await;

        assert_eq!(executor.cancel(project.id).await, Some(run_id));
        wait_for(&mut rx, |e| matches!(e, Event::ExecutionCancelled { .. })).await;
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(repos.drafts.find_current(project.id).await.unwrap().is_none());
        assert_eq!(
            repos.projects.get(project.id).await.unwrap().status,
            ProjectStatus::Writing
        );
        assert_eq!(bus.snapshot(project.id).unwrap().run_state, RunState::Cancelled);
    }
}
