use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use octoform::api::{InMemoryApi, OctopusApi, OctopusClient};
use octoform::config::Config;
use octoform::logging;
use octoform::state::StateFile;
use octoform::Provider;

#[derive(Parser)]
#[command(name = "octoform")]
#[command(about = "Declarative Octopus Deploy steps, feeds and accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Use an in-memory server instead of the configured one
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List resource types
    Resources,

    /// Print resource schemas as JSON
    Schema {
        /// Resource type (all types when omitted)
        resource_type: Option<String>,
    },

    /// Create a resource and write its state file
    Create {
        resource_type: String,

        /// JSON file with the resource configuration
        #[arg(long = "config-file", short = 'f')]
        config_file: PathBuf,

        /// State file to write
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Refresh a state file from the server
    Read {
        resource_type: String,

        #[arg(short, long)]
        state: PathBuf,
    },

    /// Apply changed configuration to an existing resource
    Update {
        resource_type: String,

        #[arg(long = "config-file", short = 'f')]
        config_file: PathBuf,

        #[arg(short, long)]
        state: PathBuf,
    },

    /// Delete a resource and remove its state file
    Delete {
        resource_type: String,

        #[arg(short, long)]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let _logging_handle = logging::init_logging(&config, cli.debug)?;

    // Offline runs share one saved in-memory server
    let offline = if cli.offline {
        let path = config.offline_store_path();
        let memory = Arc::new(InMemoryApi::load(&path)?);
        for project_id in &config.offline.projects {
            memory.ensure_project(project_id);
        }
        Some((memory, path))
    } else {
        None
    };

    let api: Arc<dyn OctopusApi> = match &offline {
        Some((memory, _)) => Arc::clone(memory) as Arc<dyn OctopusApi>,
        None => Arc::new(OctopusClient::from_config(&config).context("Failed to create Octopus client")?),
    };
    tracing::debug!(backend = api.name(), "API backend ready");
    let provider = Provider::new(api);

    let result = run(&provider, cli.command).await;

    // Keep whatever the command managed to write, even when it failed afterwards
    if let Some((memory, path)) = offline {
        memory.save(&path)?;
        tracing::debug!(store = %path.display(), "Saved offline store");
    }

    result
}

async fn run(provider: &Provider, command: Commands) -> Result<()> {
    match command {
        Commands::Resources => cmd_resources(provider),
        Commands::Schema { resource_type } => cmd_schema(provider, resource_type.as_deref())?,
        Commands::Create {
            resource_type,
            config_file,
            state,
        } => cmd_create(provider, &resource_type, &config_file, &state).await?,
        Commands::Read {
            resource_type,
            state,
        } => cmd_read(provider, &resource_type, &state).await?,
        Commands::Update {
            resource_type,
            config_file,
            state,
        } => cmd_update(provider, &resource_type, &config_file, &state).await?,
        Commands::Delete {
            resource_type,
            state,
        } => cmd_delete(provider, &resource_type, &state).await?,
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn cmd_resources(provider: &Provider) {
    for name in provider.resource_types() {
        println!("{}", name);
    }
}

fn cmd_schema(provider: &Provider, resource_type: Option<&str>) -> Result<()> {
    let output = match resource_type {
        Some(name) => serde_json::to_string_pretty(provider.resource(name)?.schema())?,
        None => serde_json::to_string_pretty(&provider.schemas())?,
    };
    println!("{}", output);
    Ok(())
}

async fn cmd_create(
    provider: &Provider,
    resource_type: &str,
    config_file: &Path,
    state_path: &Path,
) -> Result<()> {
    if state_path.exists() {
        anyhow::bail!(
            "state file {} already exists; use update or delete",
            state_path.display()
        );
    }

    let config = read_json(config_file)?;
    let data = provider.create(resource_type, &config).await?;

    let id = data.id().unwrap_or_default().to_string();
    StateFile::new(resource_type, data).save(state_path)?;
    println!("Created {} {}", resource_type, id);
    Ok(())
}

async fn cmd_read(provider: &Provider, resource_type: &str, state_path: &Path) -> Result<()> {
    let mut state = StateFile::load_for(state_path, resource_type)?;
    provider.read(resource_type, &mut state.data).await?;

    match state.data.id() {
        Some(id) => {
            let id = id.to_string();
            state.save(state_path)?;
            println!("Refreshed {} {}", resource_type, id);
        }
        None => {
            StateFile::remove(state_path)?;
            println!("{} no longer exists; removed {}", resource_type, state_path.display());
        }
    }
    Ok(())
}

async fn cmd_update(
    provider: &Provider,
    resource_type: &str,
    config_file: &Path,
    state_path: &Path,
) -> Result<()> {
    let mut state = StateFile::load_for(state_path, resource_type)?;
    let config = read_json(config_file)?;

    state.data = provider.update(resource_type, &config, &state.data).await?;

    match state.data.id() {
        Some(id) => {
            let id = id.to_string();
            state.save(state_path)?;
            println!("Updated {} {}", resource_type, id);
        }
        None => {
            StateFile::remove(state_path)?;
            println!("{} no longer exists; removed {}", resource_type, state_path.display());
        }
    }
    Ok(())
}

async fn cmd_delete(provider: &Provider, resource_type: &str, state_path: &Path) -> Result<()> {
    let mut state = StateFile::load_for(state_path, resource_type)?;
    provider.delete(resource_type, &mut state.data).await?;

    StateFile::remove(state_path)?;
    println!("Deleted {}", resource_type);
    Ok(())
}
