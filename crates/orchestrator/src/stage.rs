//! Stage trait for the autonomous part of the pipeline.
//!
//! Research, Write and Edit each implement [`Stage`]. The executor owns
//! retries, timeouts, persistence and status changes; a stage only turns its
//! input into an output.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use events::{Event, EventBus};
use scribe_core::{
    Draft, DraftContent, NewResearchSource, Plan, Project, QualityAssessment, ResearchSource,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::stages::{completed_weight, descriptor, StageName};

/// Failure reported by a stage or generator. Counts as one failed attempt.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StageError(pub String);

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything a stage may read.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub project: Project,
    /// Text of the selected title
    pub title: String,
    /// Approved plan, sections sorted by order
    pub plan: Plan,
    pub sources: Vec<ResearchSource>,
    pub draft: Option<Draft>,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub enum StageOutput {
    Research(Vec<NewResearchSource>),
    Draft(DraftContent),
    Edited(DraftContent, QualityAssessment),
}

impl StageOutput {
    /// Whether this output is the artifact `stage` is expected to produce.
    pub fn fits(&self, stage: StageName) -> bool {
        matches!(
            (self, stage),
            (Self::Research(_), StageName::Research)
                | (Self::Draft(_), StageName::Write)
                | (Self::Edited(..), StageName::Edit)
        )
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    /// Produce the stage artifact from `input`.
    ///
    /// Sub-step progress may be reported through `progress`.
    async fn run(
        &self,
        input: &StageInput,
        progress: &ProgressReporter,
    ) -> std::result::Result<StageOutput, StageError>;
}

/// The three autonomous stages in use.
#[derive(Clone)]
pub struct StageSet {
    pub research: Arc<dyn Stage>,
    pub write: Arc<dyn Stage>,
    pub edit: Arc<dyn Stage>,
}

impl StageSet {
    pub fn new(research: Arc<dyn Stage>, write: Arc<dyn Stage>, edit: Arc<dyn Stage>) -> Self {
        Self {
            research,
            write,
            edit,
        }
    }

    pub fn get(&self, name: StageName) -> Option<Arc<dyn Stage>> {
        match name {
            StageName::Research => Some(Arc::clone(&self.research)),
            StageName::Write => Some(Arc::clone(&self.write)),
            StageName::Edit => Some(Arc::clone(&self.edit)),
            _ => None,
        }
    }
}

/// Publishes overall progress for one stage of one run.
///
/// The high-water mark is shared by every reporter of the run, so published
/// percentages never go down. Once the run is cancelled nothing is published.
#[derive(Clone)]
pub struct ProgressReporter {
    event_bus: EventBus,
    project_id: Uuid,
    run_id: Uuid,
    stage: StageName,
    high_water: Arc<AtomicU8>,
    cancel_token: CancellationToken,
}

impl ProgressReporter {
    pub fn new(
        event_bus: EventBus,
        project_id: Uuid,
        run_id: Uuid,
        stage: StageName,
        high_water: Arc<AtomicU8>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            event_bus,
            project_id,
            run_id,
            stage,
            high_water,
            cancel_token,
        }
    }

    pub fn stage(&self) -> StageName {
        self.stage
    }

    /// Report that `fraction` (0.0..=1.0) of this stage is done.
    pub fn report(&self, fraction: f64) {
        let weight = descriptor(self.stage).estimated_weight as f64;
        let within = (fraction.clamp(0.0, 1.0) * weight).round() as u8;
        self.publish(completed_weight(self.stage).saturating_add(within));
    }

    /// Progress once the stage has committed.
    pub(crate) fn complete(&self) {
        self.report(1.0);
    }

    fn publish(&self, percent: u8) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        let percent = percent.min(100);
        let previous = self.high_water.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            self.event_bus.publish(
                self.project_id,
                Event::Progress {
                    run_id: self.run_id,
                    percent,
                    stage: Some(self.stage.to_string()),
                },
            );
        }
    }

    pub fn current(&self) -> u8 {
        self.high_water.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(bus: &EventBus, project_id: Uuid, stage: StageName, high: &Arc<AtomicU8>) -> ProgressReporter {
        ProgressReporter::new(
            bus.clone(),
            project_id,
            Uuid::new_v4(),
            stage,
            Arc::clone(high),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_progress_is_weighted() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let high = Arc::new(AtomicU8::new(0));

        let research = reporter(&bus, project_id, StageName::Research, &high);
        research.report(0.5);
        assert_eq!(research.current(), 15);
        research.complete();
        assert_eq!(research.current(), 30);

        let write = reporter(&bus, project_id, StageName::Write, &high);
        write.report(0.5);
        assert_eq!(write.current(), 55);
    }

    #[test]
    fn test_progress_never_decreases() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let high = Arc::new(AtomicU8::new(0));
        let mut rx = bus.subscribe(project_id);

        let write = reporter(&bus, project_id, StageName::Write, &high);
        write.report(0.8);
        write.report(0.2);
        write.report(0.8);

        let first = rx.try_recv().unwrap();
        assert!(matches!(first.event, Event::Progress { percent: 70, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancelled_reporter_is_silent() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let token = CancellationToken::new();
        let reporter = ProgressReporter::new(
            bus.clone(),
            project_id,
            Uuid::new_v4(),
            StageName::Edit,
            Arc::new(AtomicU8::new(0)),
            token.clone(),
        );

        token.cancel();
        reporter.report(1.0);
        assert_eq!(reporter.current(), 0);
        assert_eq!(bus.event_count(), 0);
    }

    #[test]
    fn test_report_from_replaced_run_is_not_folded() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let old_run = Uuid::new_v4();
        bus.begin_run(project_id, old_run, scribe_core::ProjectStatus::Researching);
        let stale = ProgressReporter::new(
            bus.clone(),
            project_id,
            old_run,
            StageName::Write,
            Arc::new(AtomicU8::new(0)),
            CancellationToken::new(),
        );

        let new_run = Uuid::new_v4();
        bus.begin_run(project_id, new_run, scribe_core::ProjectStatus::Researching);
        stale.report(1.0);

        let snapshot = bus.snapshot(project_id).unwrap();
        assert_eq!(snapshot.run_id, new_run);
        assert_eq!(snapshot.progress_percent, 0);
    }

    #[test]
    fn test_output_fits_stage() {
        let output = StageOutput::Draft(DraftContent::markdown("text"));
        assert!(output.fits(StageName::Write));
        assert!(!output.fits(StageName::Edit));
    }
}
