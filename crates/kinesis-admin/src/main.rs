//! Operator tooling for the checklist engine: publish templates and
//! inspect instances against the configured store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use kinesis_audit::sink::TracingSink;
use kinesis_core::models::template::{TemplateDraft, VisitType};
use kinesis_engine::config::{self, EngineConfig};
use kinesis_engine::orchestrator::ChecklistEngine;
use kinesis_storage::store::AnyStore;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kinesis-admin")]
#[command(about = "Manage visit checklist templates and inspect instances")]
struct Cli {
    /// Path to the engine config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "KINESIS_LOG_JSON")]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective config (defaults plus environment) to disk
    InitConfig,
    /// Publish a template draft read from a JSON file
    Publish {
        /// Path to the draft JSON
        draft: PathBuf,
    },
    /// Show the current template for a clinic, code and visit type
    Current {
        clinic_id: Uuid,
        code: String,
        visit_type: VisitType,
    },
    /// List every current template of a clinic
    List { clinic_id: Uuid },
    /// Show the version chain of a template, newest first
    History { template_id: Uuid },
    /// Show an instance's status and progress
    Progress { instance_id: Uuid },
    /// Print the generated note of an instance
    Note {
        instance_id: Uuid,
        /// Print the secondary-locale rendering
        #[arg(long)]
        localized: bool,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config = config::load_or_default(&config_path)?;
    config.validate()?;

    if let Commands::InitConfig = cli.command {
        config::save_config(&config, &config_path)?;
        println!("{}", config_path.display());
        return Ok(());
    }

    config.storage.require_durable()?;
    let engine = build_engine(&config).await?;
    let result = run(&engine, cli.command).await;
    engine.shutdown().await;
    result
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_engine(config: &EngineConfig) -> eyre::Result<ChecklistEngine<AnyStore>> {
    let store = config::build_store(&config.storage).await?;
    let engine = ChecklistEngine::new(Arc::new(store), config, Arc::new(TracingSink))?;
    Ok(engine)
}

async fn run(engine: &ChecklistEngine<AnyStore>, command: Commands) -> eyre::Result<()> {
    match command {
        Commands::InitConfig => Ok(()),
        Commands::Publish { draft } => {
            let bytes = std::fs::read(&draft)
                .wrap_err_with(|| format!("failed to read {}", draft.display()))?;
            let draft: TemplateDraft =
                serde_json::from_slice(&bytes).wrap_err("draft is not a valid template draft")?;
            let template = engine.publish_template(draft).await?;
            tracing::info!(
                template_id = %template.id,
                code = %template.code,
                version = template.version,
                "template published"
            );
            print_json(&template)
        }
        Commands::Current {
            clinic_id,
            code,
            visit_type,
        } => print_json(&engine.get_template(&code, clinic_id, visit_type).await?),
        Commands::List { clinic_id } => {
            print_json(&engine.templates().list_current(clinic_id).await?)
        }
        Commands::History { template_id } => {
            print_json(&engine.templates().version_history(template_id).await?)
        }
        Commands::Progress { instance_id } => {
            let checklist = engine.checklist(instance_id).await?;
            let progress = engine.progress(instance_id).await?;
            print_json(&serde_json::json!({
                "instance_id": instance_id,
                "status": checklist.status,
                "progress": progress,
            }))
        }
        Commands::Note {
            instance_id,
            localized,
        } => {
            let note = engine.get_generated_note(instance_id).await?;
            if localized {
                println!("{}", note.note_localized);
            } else {
                println!("{}", note.note);
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
