pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod generators;
pub mod locks;
pub mod registry;
pub mod service;
pub mod stage;
pub mod stages;
pub mod state_machine;
pub mod templates;

pub use config::ExecutorConfig;
pub use error::{OrchestratorError, Result};
pub use executor::PipelineExecutor;
pub use generators::{PlanGenerator, TemplatePlanGenerator, TemplateTitleGenerator, TitleGenerator};
pub use locks::ProjectLocks;
pub use registry::{ExecutionHandle, ExecutionRegistry};
pub use service::{
    ApprovePlanOutcome, ExecutionStatus, ProjectPage, ProjectService, SelectTitleOutcome,
};
pub use stage::{ProgressReporter, Stage, StageError, StageInput, StageOutput, StageSet};
pub use stages::{StageDescriptor, StageKind, StageName};
pub use state_machine::{Command, ProjectStateMachine};
pub use templates::{TemplateEditor, TemplateResearch, TemplateWriter};
