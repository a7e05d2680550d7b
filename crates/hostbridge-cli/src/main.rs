//! Command-line interface for the HostBridge agent.

mod config;
mod run;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use hostbridge_commands::{CommandStore, CommandType, JsonFileStore, describe_command_type};
use hostbridge_mqtt::sanitize;

use crate::config::{AgentConfig, env_vars};

/// HostBridge - Expose host commands to Home Assistant over MQTT.
#[derive(Parser, Debug)]
#[command(name = "hostbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the broker and publish the configured commands.
    Run,
    /// List the supported command types.
    Types,
    /// Validate a commands file.
    Check {
        /// Path to the commands file.
        #[arg(required = true)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    match args.command {
        Command::Run => {
            let config = AgentConfig::load(args.config.as_deref())?;
            run::run(config).await
        }
        Command::Types => {
            print_types();
            Ok(())
        }
        Command::Check { path } => check_commands_file(&path).await,
    }
}

fn init_logging(verbose: bool) {
    // JSON format for service/container environments
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose {
        "hostbridge=debug"
    } else {
        "hostbridge=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init();
    }
}

fn print_types() {
    println!("Supported command types:");
    println!();
    for command_type in CommandType::all() {
        println!(
            "  {:<22} {}",
            command_type.type_name(),
            describe_command_type(command_type)
        );
    }
}

async fn check_commands_file(path: &Path) -> Result<()> {
    let specs = JsonFileStore::new(path)
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

    let mut seen = HashSet::new();
    // (component, sanitised name) -> first entry using those topics
    let mut topics: HashMap<(&str, String), &str> = HashMap::new();
    let mut problems = 0usize;

    for (index, spec) in specs.iter().enumerate() {
        let mut errors = Vec::new();
        if let Err(e) = spec.validate() {
            errors.push(e);
        }
        if let Some(id) = spec.id() {
            if !seen.insert(id.to_string()) {
                errors.push(format!("duplicate id {}", id));
            }
        }
        let key = (spec.entity_type.component(), sanitize(&spec.name));
        if let Some(owner) = topics.get(&key) {
            errors.push(format!("topics already used by '{}'", owner));
        } else {
            topics.insert(key, spec.name.as_str());
        }

        if errors.is_empty() {
            println!("  ok     #{} {} ({})", index, spec.name, spec.command_type);
        } else {
            problems += 1;
            println!("  error  #{} {}: {}", index, spec.name, errors.join("; "));
        }
    }

    println!();
    println!("{} command(s), {} with problems", specs.len(), problems);

    if problems > 0 {
        anyhow::bail!("{} malformed command(s) in {}", problems, path.display());
    }
    Ok(())
}
