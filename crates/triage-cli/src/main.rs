//! Symptom triage command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use triage_core::models::SymptomQuery;
use triage_engine::{TriageConfig, TriageSystem};
use triage_llm::Message;

#[derive(Parser, Debug)]
#[command(name = "triage", version, about = "Symptom triage assistant", author)]
struct Cli {
    /// TOML or JSON configuration file
    #[arg(short, long, env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,
    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
    /// Skip the reasoning service
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assess a symptom description and print the result as JSON
    Assess {
        text: String,
        #[arg(long)]
        age: Option<u8>,
        #[arg(long)]
        allergies: Option<String>,
    },
    /// Ask a question; without one, start an interactive session
    Chat { question: Option<String> },
    /// Report loaded data and reasoning service status
    Doctor,
    /// Print the effective configuration
    Config,
}

fn init_tracing(level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn load_config(cli: &Cli) -> Result<TriageConfig> {
    let mut config = TriageConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    if cli.offline {
        config.offline = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    let config = load_config(&cli)?;

    match cli.cmd {
        Commands::Assess {
            text,
            age,
            allergies,
        } => cmd_assess(&config, text, age, allergies).await,
        Commands::Chat { question } => cmd_chat(&config, question).await,
        Commands::Doctor => cmd_doctor(&config).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn cmd_assess(
    config: &TriageConfig,
    text: String,
    age: Option<u8>,
    allergies: Option<String>,
) -> Result<()> {
    let mut query = SymptomQuery::new(text);
    query.age = age;
    query.allergies = allergies;
    query.validate()?;

    let system = TriageSystem::bootstrap(config).await?;
    let result = system.engine.triage(&query).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_chat(config: &TriageConfig, question: Option<String>) -> Result<()> {
    let system = TriageSystem::bootstrap(config).await?;

    if let Some(question) = question {
        println!("{}", system.engine.chat(&question).await);
        return Ok(());
    }

    info!("Interactive chat started");
    let mut context: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let answer = system.engine.chat_with_context(question, &context).await;
        println!("{answer}\n");
        context.push(Message::user(question));
        context.push(Message::assistant(answer));
    }
    Ok(())
}

async fn cmd_doctor(config: &TriageConfig) -> Result<()> {
    let system = TriageSystem::bootstrap(config).await?;
    let report = system.report().await;

    println!("Knowledge records: {}", report.knowledge_records);
    println!(
        "Graph: {} symptoms, {} conditions, {} relationships",
        report.graph.symptoms, report.graph.conditions, report.graph.relationships
    );
    match &report.model {
        Some(model) if report.model_available => println!("Reasoning model: {model} (available)"),
        Some(model) => println!(
            "Reasoning model: {model} (NOT available at {})",
            config.ollama.base_url
        ),
        None => println!("Reasoning model: disabled (offline)"),
    }
    if let Some(path) = &config.data.history_file {
        println!("History: {}", path.display());
    }
    Ok(())
}
