//! The `run` subcommand: connect, publish and reconcile until interrupted.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use hostbridge_commands::{CommandManager, CommandStore, JsonFileStore};
use hostbridge_mqtt::{CommandInvocation, DiscoveryContext, HassCommandFactory, MqttGateway};

use crate::config::AgentConfig;

pub async fn run(config: AgentConfig) -> Result<()> {
    let gateway = Arc::new(MqttGateway::new(config.mqtt.clone()));
    let context = gateway.context().clone();
    let factory = Arc::new(HassCommandFactory::new(context.clone(), gateway.clone()));
    let store = Arc::new(JsonFileStore::new(&config.commands_file));

    let manager = Arc::new(CommandManager::new(
        config.engine.clone(),
        gateway.clone(),
        factory,
        store,
    ));

    gateway
        .connect()
        .await
        .context("Failed to start MQTT gateway")?;

    let loaded = manager
        .load_stored()
        .await
        .with_context(|| format!("Failed to load {}", config.commands_file.display()))?;
    tracing::info!(
        "Announcing {} command(s) as device '{}'",
        loaded,
        config.mqtt.device_name
    );

    manager.initialize().await;

    let invocation_task = spawn_invocation_logger(
        gateway.invocations(),
        Arc::clone(&manager),
        context,
    );

    wait_for_shutdown(&manager, &config.commands_file).await?;

    tracing::info!("Shutting down");
    manager.shutdown().await;
    invocation_task.abort();
    gateway.disconnect().await?;

    Ok(())
}

/// Log every invocation together with the command it targets.
fn spawn_invocation_logger(
    mut invocations: broadcast::Receiver<CommandInvocation>,
    manager: Arc<CommandManager>,
    context: DiscoveryContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match invocations.recv().await {
                Ok(invocation) => {
                    let command = manager
                        .commands()
                        .await
                        .into_iter()
                        .find(|spec| context.topics(spec).command == invocation.topic);

                    match command {
                        Some(spec) => tracing::info!(
                            "Command '{}' ({}) invoked with payload '{}'",
                            spec.name,
                            spec.command_type,
                            invocation.payload
                        ),
                        None => tracing::warn!(
                            "Invocation on unknown topic {}",
                            invocation.topic
                        ),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} invocation(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Wait for Ctrl-C, reloading the commands file on every SIGHUP.
#[cfg(unix)]
async fn wait_for_shutdown(manager: &Arc<CommandManager>, commands_file: &Path) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            _ = hangup.recv() => reload(manager, commands_file).await,
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_manager: &Arc<CommandManager>, _commands_file: &Path) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}

/// Apply the commands file as the new desired state.
#[cfg_attr(not(unix), allow(dead_code))]
async fn reload(manager: &Arc<CommandManager>, commands_file: &Path) {
    tracing::info!("Reloading {}", commands_file.display());

    let specs = match JsonFileStore::new(commands_file).load().await {
        Ok(specs) => specs,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", commands_file.display(), e);
            return;
        }
    };

    match manager.process_received_desired_state(specs).await {
        Ok(true) => tracing::info!("Commands reloaded"),
        Ok(false) => tracing::warn!("Reload was not fully applied"),
        Err(e) => tracing::error!("Reload task failed: {}", e),
    }
}
