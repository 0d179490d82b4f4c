use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;
use visa_pipeline::cli::commands::{
    HistoryCommand, PredictCommand, ServeCommand, TrainCommand, ValidateCommand,
};
use visa_pipeline::cli::output::*;
use visa_pipeline::cli::{Cli, Command};
use visa_pipeline::core::{RunStatus, TrainingConfig};
use visa_pipeline::execution::{PipelineEvent, TrainingPipeline};
use visa_pipeline::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use visa_pipeline::serving::{self, ModelPredictor, PredictionRequest};
use visa_pipeline::store::{JsonDocumentStore, LocalObjectStore, ObjectStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Train(cmd) => train(cmd, &cli).await?,
        Command::Validate(cmd) => validate_config(cmd, &cli)?,
        Command::Predict(cmd) => predict(cmd, &cli).await?,
        Command::Serve(cmd) => serve(cmd, &cli).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<TrainingConfig> {
    TrainingConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load pipeline config {}", cli.config.display()))
}

fn object_store(config: &TrainingConfig) -> Arc<dyn ObjectStore> {
    Arc::new(LocalObjectStore::new(&config.connections.object_store))
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    let store = visa_pipeline::persistence::SqliteExecutionStore::with_default_path().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn train(cmd: &TrainCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?.with_overrides(cmd.overrides())?;
    println!(
        "{} Loaded pipeline: {}",
        INFO,
        style(&config.pipeline_name).bold()
    );

    let history: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let pipeline_name = config.pipeline_name.clone();
    let documents = Arc::new(JsonDocumentStore::new(&config.connections.document_store));
    let objects = object_store(&config);
    let mut pipeline = TrainingPipeline::new(config, documents, objects);

    let progress = create_progress_bar();
    let bar = progress.clone();
    pipeline.add_event_handler(move |event| {
        bar.println(format_pipeline_event(event));
        match event {
            PipelineEvent::StageStarted { stage } => bar.set_message(stage.to_string()),
            PipelineEvent::StageCompleted { .. } | PipelineEvent::PromotionSkipped { .. } => {
                bar.inc(1)
            }
            _ => {}
        }
    });

    let result = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .context("Pipeline task panicked")?;
    progress.finish_and_clear();

    let summary = match &result {
        Ok(outcome) => RunSummary::from_outcome(&pipeline_name, outcome),
        Err(failure) => RunSummary::from_failure(&pipeline_name, failure),
    };
    if !cmd.no_history {
        history.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.simple().to_string()[..8]).dim()
        );
    }

    match result {
        Ok(outcome) => {
            let verdict = if outcome.promoted() {
                style("promoted").green()
            } else {
                style("kept the production model").yellow()
            };
            println!(
                "\n{} {} completed: {} (f1 {:.4}, delta {:+.4})",
                CHECK,
                style(&pipeline_name).bold(),
                verdict,
                outcome.evaluation.candidate_f1,
                outcome.evaluation.difference
            );
            Ok(())
        }
        Err(failure) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline_name).bold(),
                style("failed").red()
            );
            if let Some(dir) = &failure.run_dir {
                println!("  Artifacts kept in {}", style(dir.display()).dim());
            }
            error!("{}", failure.error);
            std::process::exit(1);
        }
    }
}

fn validate_config(cmd: &ValidateCommand, cli: &Cli) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    match load_config(cli) {
        Ok(config) => {
            println!("{} Configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.pipeline_name).bold());
            println!("  Columns: {}", style(config.schema.column_count()).cyan());
            println!(
                "  Model candidates: {}",
                style(config.trainer.model_space.expand().len()).cyan()
            );
            println!(
                "  Registry: {}/{}",
                style(&config.registry.bucket).cyan(),
                style(&config.registry.model_key).cyan()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn predict(cmd: &PredictCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let content = std::fs::read_to_string(&cmd.input)
        .with_context(|| format!("Failed to read {}", cmd.input.display()))?;
    let request: PredictionRequest =
        serde_json::from_str(&content).context("Invalid prediction request")?;

    let predictor = ModelPredictor::new(object_store(&config), config.registry.clone());
    let response = predictor.predict(&request).await?;
    println!("{} {}", CHECK, style(&response.prediction).bold());
    Ok(())
}

async fn serve(cmd: &ServeCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let predictor = Arc::new(ModelPredictor::new(
        object_store(&config),
        config.registry.clone(),
    ));
    let address = cmd.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    println!("{} Serving predictions on http://{}", ROCKET, address);
    axum::serve(listener, serving::router(predictor))
        .await
        .context("Server error")?;
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = if let Some(pipeline_name) = &cmd.pipeline {
        store.list_runs(pipeline_name).await?
    } else {
        let mut all_runs = Vec::new();
        for pipeline in store.list_pipelines().await? {
            all_runs.extend(store.list_runs(&pipeline).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Phase: {}", format_phase(summary.phase));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    if let Some(dir) = &summary.run_dir {
        println!("  Artifacts: {}", style(dir.display()).dim());
    }
    if let (Some(f1), Some(delta)) = (summary.candidate_f1, summary.difference) {
        println!("  Candidate f1: {} (delta {:+.4})", style(format!("{:.4}", f1)).cyan(), delta);
    }
    if summary.status == RunStatus::Failed {
        if let Some(error) = &summary.error {
            println!("  Error: {}", style(error).red());
        }
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
