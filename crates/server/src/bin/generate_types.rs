//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

#[cfg(feature = "typescript")]
fn export(out_dir: &Path) -> Result<(), ts_rs::ExportError> {
    use ts_rs::TS;

    scribe_core::ProjectStatus::export_all_to(out_dir)?;
    scribe_core::Project::export_all_to(out_dir)?;
    scribe_core::CreateProjectRequest::export_all_to(out_dir)?;
    scribe_core::Title::export_all_to(out_dir)?;
    scribe_core::SelectTitleRequest::export_all_to(out_dir)?;
    scribe_core::Plan::export_all_to(out_dir)?;
    scribe_core::PlanSectionInput::export_all_to(out_dir)?;
    scribe_core::UpdatePlanRequest::export_all_to(out_dir)?;
    scribe_core::ResearchSource::export_all_to(out_dir)?;
    scribe_core::Draft::export_all_to(out_dir)?;
    scribe_core::FaqEntry::export_all_to(out_dir)?;
    scribe_core::UpdateDraftRequest::export_all_to(out_dir)?;
    scribe_core::ExportRequest::export_all_to(out_dir)?;
    scribe_core::ExportResponse::export_all_to(out_dir)?;

    events::EventEnvelope::export_all_to(out_dir)?;
    events::Event::export_all_to(out_dir)?;
    events::ExecutionRecord::export_all_to(out_dir)?;

    orchestrator::ExecutionStatus::export_all_to(out_dir)?;
    orchestrator::ProjectPage::export_all_to(out_dir)?;
    orchestrator::ApprovePlanOutcome::export_all_to(out_dir)?;
    orchestrator::SelectTitleOutcome::export_all_to(out_dir)?;

    websocket::ServerMessage::export_all_to(out_dir)?;

    server::routes::execution::RunResponse::export_all_to(out_dir)?;
    server::routes::execution::LogResponse::export_all_to(out_dir)?;

    Ok(())
}

fn main() {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("frontend/src/types/generated");

    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "typescript")]
    if let Err(e) = export(out_dir) {
        eprintln!("Failed to export types: {}", e);
        std::process::exit(1);
    }

    println!("TypeScript types generated in {}", out_dir.display());
}
