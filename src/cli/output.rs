//! CLI output formatting

use crate::{
    core::{PipelinePhase, RunStatus, Stage},
    execution::PipelineEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Progress bar over the six stages
pub fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(Stage::ALL.len() as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format the final phase of a run
pub fn format_phase(phase: PipelinePhase) -> String {
    match phase {
        PipelinePhase::Pushed => style("promoted").green().to_string(),
        PipelinePhase::Skipped => style("not promoted").yellow().to_string(),
        other => style(format!("{:?}", other).to_lowercase()).dim().to_string(),
    }
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Completed => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };
    let score = match (summary.candidate_f1, summary.difference) {
        (Some(f1), Some(delta)) => format!("f1 {:.4} ({:+.4})", f1, delta),
        _ => String::new(),
    };

    format!(
        "{} {} - {} - {} - {} - {} {}",
        status_icon,
        style(&summary.run_id.simple().to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        format_status(summary.status),
        format_phase(summary.phase),
        style(score).cyan()
    )
}

/// Format a pipeline event for display
pub fn format_pipeline_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::RunStarted {
            run_id,
            pipeline_name,
            run_dir,
        } => format!(
            "{} Starting pipeline {} ({}) in {}",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.simple().to_string()[..8]).dim(),
            style(run_dir.display()).dim()
        ),
        PipelineEvent::StageStarted { stage } => format!("{} {}", SPINNER, style(stage).cyan()),
        PipelineEvent::StageCompleted { stage, summary } => {
            format!("{} {}: {}", CHECK, style(stage).green(), summary)
        }
        PipelineEvent::StageFailed { stage, error } => {
            format!("{} {}: {}", CROSS, style(stage).red(), style(error).dim())
        }
        PipelineEvent::PromotionSkipped { difference } => format!(
            "{} Candidate did not beat the production model (delta {:+.4}), promotion skipped",
            WARN, difference
        ),
        PipelineEvent::RunFinished {
            run_id,
            status,
            phase,
        } => format!(
            "{} Run ({}) {} - {}",
            INFO,
            style(&run_id.simple().to_string()[..8]).dim(),
            format_status(*status),
            format_phase(*phase)
        ),
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_stage_events_name_the_stage() {
        let text = format_pipeline_event(&PipelineEvent::StageFailed {
            stage: Stage::Training,
            error: "no model reached the expected score".to_string(),
        });
        assert!(text.contains("model_trainer"));
        assert!(text.contains("expected score"));
    }
}
