use anyhow::{Context, Result};
use loanflow::builder::DefinitionBuilder;
use loanflow::cli::commands::{
    CatalogCommand, EditCommand, HistoryCommand, PipelinesAction, PipelinesCommand, RunCommand,
    ValidateCommand,
};
use loanflow::cli::output::*;
use loanflow::cli::{Cli, Command};
use loanflow::core::{catalog, Application, PipelineDefinition, Run};
use loanflow::execution::ExecutionEngine;
use loanflow::persistence::{InMemoryPersistence, PersistenceBackend, RunFilter, SqliteStore};
use loanflow::steps::BuiltinEvaluator;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Edit(cmd) => edit_pipeline(cmd)?,
        Command::Catalog(cmd) => show_catalog(cmd)?,
        Command::Pipelines(cmd) => manage_pipelines(cmd, &cli).await?,
        Command::History(cmd) => show_history(cmd, &cli).await?,
    }

    Ok(())
}

async fn open_store(cli: &Cli) -> Result<SqliteStore> {
    match &cli.db {
        Some(path) => SqliteStore::new(path).await,
        None => SqliteStore::with_default_path().await,
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let definition = match PipelineDefinition::from_file(&cmd.file) {
        Ok(definition) => definition,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let builder = DefinitionBuilder::from_definition(definition.clone())?;
    let problems = builder.validate();

    if cmd.json {
        let data = serde_json::json!({
            "valid": problems.is_empty(),
            "problems": problems,
            "definition": definition,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else if problems.is_empty() {
        println!("{} Pipeline definition is valid!", CHECK);
        println!("{}", format_definition(&definition));
    } else {
        println!("{} Pipeline loads but cannot run as is:", WARN);
        for problem in &problems {
            println!("  - {}", style(problem).yellow());
        }
    }

    if !problems.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let application =
        Application::from_file(&cmd.application).context("Failed to load application")?;

    // Stored pipelines always come from the database
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history && cmd.pipeline.is_none() {
        Arc::new(InMemoryPersistence::new())
    } else {
        Arc::new(open_store(cli).await?)
    };

    let (definition, pipeline_id) = match (&cmd.file, cmd.pipeline) {
        (_, Some(id)) => {
            let record = store
                .load_pipeline(id)
                .await?
                .with_context(|| format!("Pipeline {} not found", id))?;
            (record.definition, record.id)
        }
        (Some(file), None) => (
            PipelineDefinition::from_file(file).context("Failed to load pipeline definition")?,
            0,
        ),
        (None, None) => anyhow::bail!("Pass --file or --pipeline"),
    };

    if !cmd.json {
        println!(
            "{} Loaded pipeline: {}",
            INFO,
            style(&definition.name).bold()
        );
    }

    let engine = ExecutionEngine::new(BuiltinEvaluator::new());
    if !cmd.json {
        engine
            .add_event_handler(|event| println!("{}", format_execution_event(&event)))
            .await;
    }

    let result = engine.execute(&definition, &application, pipeline_id).await;
    let run = match result {
        Ok(run) => run,
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&definition.name).bold(),
                style("produced no verdict").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if !cmd.no_history {
        store.save_run(&run).await?;
        debug!("Run {} saved to history", run.id);
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run_details(&run);
        if !cmd.no_history {
            println!(
                "\n{} Run saved to history (ID: {})",
                INFO,
                style(&run.id.to_string()[..8]).dim()
            );
        }
    }

    Ok(())
}

fn edit_pipeline(cmd: &EditCommand) -> Result<()> {
    let mut builder = if cmd.file.exists() {
        let definition = PipelineDefinition::from_file(&cmd.file)?;
        DefinitionBuilder::from_definition(definition)?
    } else {
        println!(
            "{} Creating new pipeline at {}",
            INFO,
            style(cmd.file.display()).dim()
        );
        DefinitionBuilder::new()
    };

    let command = cmd.action.to_command(&builder)?;
    builder.apply(command)?;

    if builder.is_dirty() {
        write_definition(&cmd.file, &builder)?;
        builder.mark_saved();
    }

    let definition = builder.snapshot();
    println!("{} Updated {}", CHECK, style(cmd.file.display()).bold());
    println!("{}", format_definition(&definition));

    for problem in builder.validate() {
        println!("{} {}", WARN, style(problem).yellow());
    }
    Ok(())
}

fn write_definition(path: &Path, builder: &DefinitionBuilder) -> Result<()> {
    builder
        .snapshot()
        .write_file(path)
        .with_context(|| format!("Failed to save {}", path.display()))
}

fn show_catalog(cmd: &CatalogCommand) -> Result<()> {
    let definitions: Vec<_> = catalog::all_step_types()
        .into_iter()
        .map(catalog::step_definition)
        .collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    println!("{} Available step types:", INFO);
    for definition in &definitions {
        println!("  {}", format_step_definition(definition));
    }
    Ok(())
}

async fn manage_pipelines(cmd: &PipelinesCommand, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;

    match &cmd.action {
        PipelinesAction::Save { file, id } => {
            let definition = PipelineDefinition::from_file(file)?;
            let record = match id {
                Some(id) => store.update_pipeline(*id, &definition).await?,
                None => store.create_pipeline(&definition).await?,
            };
            println!(
                "{} Stored {} as pipeline {}",
                CHECK,
                style(&record.definition.name).bold(),
                style(record.id).cyan()
            );
        }
        PipelinesAction::Delete { id } => {
            store.delete_pipeline(*id).await?;
            println!("{} Deleted pipeline {}", CHECK, style(id).cyan());
        }
        PipelinesAction::List { json } => {
            let records = store.list_pipelines().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("{} No stored pipelines", INFO);
            } else {
                println!("{} Stored pipelines:", INFO);
                for record in &records {
                    println!("  {}", format_pipeline_record(record));
                }
            }
        }
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(run) if cmd.json => println!("{}", serde_json::to_string_pretty(&run)?),
            Some(run) => print_run_details(&run),
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let filter = RunFilter {
        pipeline_id: cmd.pipeline,
        application_id: cmd.application,
    };
    let runs: Vec<Run> = store
        .list_runs(filter)
        .await?
        .into_iter()
        .take(cmd.limit)
        .collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, runs.len());
    for run in &runs {
        println!("  {}", format_run_summary(run));
    }
    Ok(())
}

fn print_run_details(run: &Run) {
    println!("\n{} Run Details", INFO);
    println!("  ID: {}", style(run.id).cyan());
    println!("  Application: {}", run.application_id);
    if run.pipeline_id > 0 {
        println!("  Pipeline: {}", run.pipeline_id);
    }
    println!("  Outcome: {}", format_outcome(run.status));
    println!("  Reason: {}", style(&run.verdict.reason).dim());
    if let Some(score) = run.risk_score() {
        println!("  Risk score: {}", style(score).cyan());
    }
    if let Ok(duration) = run.completed_at.signed_duration_since(run.started_at).to_std() {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    println!("  Steps:");
    for log in &run.step_logs {
        println!("    {}", format_step_log(log));
    }
}
