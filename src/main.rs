use anyhow::{bail, Context, Result};
use azrm::arm::environment::Environment;
use azrm::arm::http::format_arm_error;
use azrm::arm::registry::{ClientRegistry, RegistryOptions};
use azrm::config::Config;
use azrm::error::ProviderError;
use azrm::resource::{require_resource, Resource, ResourceData};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Azure Resource Manager provider
#[derive(Parser, Debug)]
#[command(name = "azrm", version, about, long_about = None)]
struct Args {
    /// Config file (defaults to <config dir>/azrm/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cloud environment, overrides config and ARM_ENVIRONMENT
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Subscription to operate on, overrides config and ARM_SUBSCRIPTION_ID
    #[arg(long, global = true)]
    subscription: Option<String>,

    /// Output format for resource state
    #[arg(long, value_enum, default_value = "yaml", global = true)]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the known cloud environments
    Environments,
    /// Create or update a resource from a manifest
    Apply {
        /// YAML or JSON manifest: `type`, optional `id`, `attributes`
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Read the current state of a resource
    Read {
        #[arg(long = "type")]
        resource_type: String,
        id: String,
    },
    /// Adopt an existing remote resource
    Import {
        #[arg(long = "type")]
        resource_type: String,
        id: String,
    },
    /// Delete a resource
    Delete {
        #[arg(long = "type")]
        resource_type: String,
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Resource manifest consumed by `apply`
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azrm started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azrm").join("azrm.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azrm").join("azrm.log");
    }
    PathBuf::from("azrm.log")
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?.with_env(|key| std::env::var(key).ok()),
        None => Config::load()?,
    };

    if let Some(environment) = &args.environment {
        config.environment = Some(environment.clone());
    }
    if let Some(subscription) = &args.subscription {
        config.subscription_id = Some(subscription.clone());
    }
    Ok(config)
}

async fn connect(config: &Config) -> Result<ClientRegistry> {
    let credentials = config.credentials()?;
    let environment = Environment::resolve(credentials.environment())?;
    let mut options = RegistryOptions::default();
    if let Some(interval) = config.poll_interval() {
        options.poll_interval = interval;
    }

    let registry = ClientRegistry::build_with(&credentials, environment, options)
        .await
        .context("Failed to authenticate with Azure")?;

    // Ctrl-C aborts pending long-running waits
    let cancel = registry.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling pending operations");
            cancel.cancel();
        }
    });

    Ok(registry)
}

fn print_state(adapter: &dyn Resource, d: &ResourceData, format: OutputFormat) -> Result<()> {
    let attributes = match adapter.schema() {
        Ok(schema) => schema.redact(d.attributes()),
        Err(_) => d.attributes().clone(),
    };
    let state = json!({
        "type": adapter.type_name(),
        "id": d.id(),
        "attributes": attributes,
    });

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&state)?),
    }
    Ok(())
}

async fn apply(registry: &ClientRegistry, file: &Path, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read manifest {:?}", file))?;
    let manifest: Manifest = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest {:?}", file))?;

    let adapter = require_resource(&manifest.resource_type)?;
    let mut d = ResourceData::new(manifest.attributes);

    match manifest.id {
        Some(id) => {
            d.set_id(id);
            adapter.update(&mut d, registry).await?;
        }
        None => adapter.create(&mut d, registry).await?,
    }

    print_state(adapter, &d, format)
}

async fn run(args: Args) -> Result<()> {
    if let Command::Environments = args.command {
        for name in Environment::known_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = load_config(&args)?;
    let registry = connect(&config).await?;

    match &args.command {
        Command::Environments => {}
        Command::Apply { file } => apply(&registry, file, args.output).await?,
        Command::Read { resource_type, id } => {
            let adapter = require_resource(resource_type)?;
            let mut d = ResourceData::with_id(id.clone());
            if !adapter.read(&mut d, &registry).await? {
                bail!("{} {} not found", resource_type, id);
            }
            print_state(adapter, &d, args.output)?;
        }
        Command::Import { resource_type, id } => {
            let adapter = require_resource(resource_type)?;
            let d = adapter
                .import(id, &registry)
                .await
                .with_context(|| format!("Failed to import {}", id))?;
            print_state(adapter, &d, args.output)?;
        }
        Command::Delete { resource_type, id } => {
            let adapter = require_resource(resource_type)?;
            let mut d = ResourceData::with_id(id.clone());
            match adapter.delete(&mut d, &registry).await {
                Ok(()) => println!("Deleted {}", id),
                Err(e) if e.is_not_found() => println!("{} is already gone", id),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let result = run(args).await;
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
        if let Some(err @ ProviderError::Api { .. }) = e.downcast_ref::<ProviderError>().map(|p| p.root()) {
            eprintln!("hint: {}", format_arm_error(err));
        }
    }
    result
}
