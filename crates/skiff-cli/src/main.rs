use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skiff::agent::Agent;
use skiff::prompt_template::system_prompt;
use skiff::providers::factory::{get_provider, ProviderType};
use skiff::skills::SkillLibrary;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod configuration;
mod error;
mod progress;
mod prompt;
mod session;

use configuration::{Overrides, Settings};
use progress::ConsoleProgress;
use prompt::CliclackPrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider to use: anthropic, openai or gemini (overrides SKIFF_PROVIDER__TYPE)
    #[arg(short, long)]
    provider: Option<ProviderType>,

    /// Model to use (overrides SKIFF_PROVIDER__MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Directory the agent works in. Defaults to the current directory
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Maximum model turns per request
    #[arg(long)]
    max_turns: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session
    Session,
    /// Run a single request and print the answer
    Run {
        /// The request to send
        #[arg(short, long)]
        text: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    let settings = Settings::new(&Overrides {
        provider: cli.provider,
        model: cli.model.clone(),
        max_turns: cli.max_turns,
    })?;

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Workspace root '{}' does not exist", root.display()))?;

    let skills = match settings.skills_dir() {
        Some(dir) => SkillLibrary::load_dir(&dir)?,
        None => SkillLibrary::default(),
    };
    let skills = Arc::new(skills);

    let provider_type = settings.provider.provider_type();
    let client = get_provider(settings.provider.into_config()?)?;
    info!(provider = %provider_type, root = %root.display(), skills = skills.skills().len(), "starting skiff");

    let progress = Arc::new(ConsoleProgress::new());
    let agent = Agent::with_standard_tools(
        client,
        root.clone(),
        settings.agent,
        Arc::clone(&skills),
        progress.clone(),
    )?;
    let system = system_prompt(&root, &agent.tools(), &skills)?;

    let mut session = Session::new(agent, system, CliclackPrompt::new(), progress);
    match cli.command.unwrap_or(Command::Session) {
        Command::Session => session.start().await,
        Command::Run { text } => session.headless_start(&text).await,
    }
}
