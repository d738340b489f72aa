//! # qpush CLI
//!
//! Command-line access to configured qpush queues.
//!
//! This module provides CLI commands for:
//! - Creating and destroying queues
//! - Publishing and receiving messages
//! - Reaping expired messages
//! - Running a simple worker loop that prints and acknowledges messages
//!
//! Queues are defined in configuration (see [`load_configuration`]). Messages
//! received by a command are held until the command exits; unless they are
//! acknowledged they become receivable again afterwards.

use clap::{CommandFactory, Parser, Subcommand};
use qpush_runtime::{
    AwsProviderConfig, CleanupPolicy, ConfigurationError, FileProviderConfig, MessageEvent,
    MessageHandler, MessagePipeline, OptionOverrides, PollReport, ProviderConfig, ProviderFactory,
    ProviderOptions, QueueError, QueueName, QueueProvider, TracingLogSink,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// qpush CLI - publish and consume queue messages
#[derive(Parser)]
#[command(name = "qpush")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish and consume messages on file and SQS/SNS queues")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QPUSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// List configured queues
    Queues,

    /// Create a queue
    Create {
        /// Queue name from configuration
        queue: String,
    },

    /// Destroy a queue and every message in it
    Destroy {
        /// Queue name from configuration
        queue: String,
    },

    /// Publish a JSON message
    Publish {
        /// Queue name from configuration
        queue: String,

        /// Message body as JSON
        body: String,

        /// Delay in seconds before the message becomes visible
        #[arg(short, long)]
        delay: Option<u64>,
    },

    /// Receive messages and print them as JSON lines
    Receive {
        /// Queue name from configuration
        queue: String,

        /// Maximum number of messages to receive
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Acknowledge (delete) the messages after printing them
        #[arg(long)]
        ack: bool,
    },

    /// Remove expired messages
    Cleanup {
        /// Queue name from configuration
        queue: String,
    },

    /// Poll a queue, printing and acknowledging every message
    Work {
        /// Queue name from configuration
        queue: String,

        /// Stop after this many polls
        #[arg(short, long)]
        batches: Option<u64>,

        /// Pause between polls that returned nothing, in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Unknown queue: {name}")]
    UnknownQueue { name: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid configuration for queue '{queue}': {source}")]
    InvalidQueue {
        queue: String,
        #[source]
        source: ConfigurationError,
    },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Backend kind of a configured queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    File,
    Aws,
}

/// One queue in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDefinition {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Root directory of a file queue
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub queue_url: Option<String>,

    #[serde(default)]
    pub topic_arn: Option<String>,

    #[serde(default)]
    pub options: ProviderOptions,

    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

impl QueueDefinition {
    /// File queue at `path` with default options
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            provider: ProviderKind::File,
            path: Some(path.into()),
            queue_url: None,
            topic_arn: None,
            options: ProviderOptions::default(),
            cleanup: CleanupPolicy::default(),
        }
    }

    /// Convert to the runtime's provider configuration
    pub fn to_provider_config(&self, queue: &str) -> Result<ProviderConfig, ConfigError> {
        let config = match self.provider {
            ProviderKind::File => {
                let path = self.path.clone().ok_or_else(|| ConfigError::MissingRequired {
                    key: format!("queues.{}.path", queue),
                })?;
                ProviderConfig::File(
                    FileProviderConfig::new(path)
                        .with_options(self.options.clone())
                        .with_cleanup(self.cleanup),
                )
            }
            ProviderKind::Aws => ProviderConfig::AwsPreconfigured(AwsProviderConfig {
                queue_url: self.queue_url.clone(),
                topic_arn: self.topic_arn.clone(),
                options: self.options.clone(),
            }),
        };

        config.validate().map_err(|source| ConfigError::InvalidQueue {
            queue: queue.to_string(),
            source,
        })?;
        Ok(config)
    }

    fn location(&self) -> String {
        match self.provider {
            ProviderKind::File => self
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            ProviderKind::Aws => self
                .topic_arn
                .clone()
                .or_else(|| self.queue_url.clone())
                .unwrap_or_default(),
        }
    }
}

/// Complete CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QpushConfig {
    pub queues: BTreeMap<String, QueueDefinition>,
}

impl QpushConfig {
    pub fn with_queue(mut self, name: impl Into<String>, definition: QueueDefinition) -> Self {
        self.queues.insert(name.into(), definition);
        self
    }

    /// Look up a queue definition by name
    pub fn queue(&self, name: &str) -> Result<&QueueDefinition, CliError> {
        self.queues.get(name).ok_or_else(|| CliError::UnknownQueue {
            name: name.to_string(),
        })
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli.log_level, cli.json_logs)?;

    let mut stdout = std::io::stdout().lock();
    if let Commands::Completions { shell } = cli.command {
        return write_completions(shell, &mut stdout);
    }

    let config = load_configuration(cli.config.as_deref())?;
    execute(cli.command, &config, &mut stdout).await
}

/// Initialize logging to stderr; `RUST_LOG` overrides `level`
pub fn initialize_logging(level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::InvalidArgument {
            arg: "--log-level".to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Load configuration.
///
/// Sources (later sources override earlier ones):
///  1. `./config/qpush.yaml`, when present
///  2. The explicit file from `--config` / `QPUSH_CONFIG` (format taken from
///     the extension: yaml, json or toml)
///  3. Environment variables prefixed `QPUSH__` with `__` as separator, e.g.
///     `QPUSH__QUEUES__ORDERS__PATH=/var/qpush/orders`
pub fn load_configuration(explicit: Option<&Path>) -> Result<QpushConfig, ConfigError> {
    let mut builder = config::Config::builder().add_source(
        config::File::with_name("config/qpush")
            .required(false)
            .format(config::FileFormat::Yaml),
    );

    if let Some(path) = explicit {
        info!(path = %path.display(), "Loading configuration from explicit path");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config = builder
        .add_source(config::Environment::with_prefix("QPUSH").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Run a command against the configured queues, writing results to `out`
pub async fn execute<W: Write>(
    command: Commands,
    config: &QpushConfig,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Commands::Queues => execute_queues_command(config, out),
        Commands::Create { queue } => {
            let provider = build_provider(config, &queue)?;
            provider.create().await?;
            writeln!(out, "Queue '{}' created", queue)?;
            Ok(())
        }
        Commands::Destroy { queue } => {
            let provider = build_provider(config, &queue)?;
            provider.destroy().await?;
            writeln!(out, "Queue '{}' destroyed", queue)?;
            Ok(())
        }
        Commands::Publish { queue, body, delay } => {
            execute_publish_command(config, &queue, &body, delay, out).await
        }
        Commands::Receive { queue, limit, ack } => {
            execute_receive_command(config, &queue, limit, ack, out).await
        }
        Commands::Cleanup { queue } => {
            let provider = build_provider(config, &queue)?;
            let removed = provider.cleanup().await?;
            writeln!(out, "Removed {} expired message(s)", removed)?;
            Ok(())
        }
        Commands::Work {
            queue,
            batches,
            interval_ms,
        } => execute_work_command(config, &queue, batches, interval_ms, out).await,
        Commands::Completions { shell } => write_completions(shell, out),
    }
}

/// Build the provider for a configured queue
pub fn build_provider(config: &QpushConfig, queue: &str) -> Result<Arc<dyn QueueProvider>, CliError> {
    let definition = config.queue(queue)?;
    let provider_config = definition.to_provider_config(queue)?;
    let name = QueueName::new(queue.to_string()).map_err(QueueError::from)?;

    Ok(ProviderFactory::create(
        name,
        &provider_config,
        Arc::new(TracingLogSink),
    )?)
}

fn execute_queues_command<W: Write>(config: &QpushConfig, out: &mut W) -> Result<(), CliError> {
    for (name, definition) in &config.queues {
        let kind = match definition.provider {
            ProviderKind::File => "file",
            ProviderKind::Aws => "aws",
        };
        writeln!(out, "{}\t{}\t{}", name, kind, definition.location())?;
    }
    Ok(())
}

async fn execute_publish_command<W: Write>(
    config: &QpushConfig,
    queue: &str,
    body: &str,
    delay: Option<u64>,
    out: &mut W,
) -> Result<(), CliError> {
    let body: serde_json::Value =
        serde_json::from_str(body).map_err(|e| CliError::InvalidArgument {
            arg: "body".to_string(),
            message: e.to_string(),
        })?;

    let mut overrides = OptionOverrides::new();
    if let Some(seconds) = delay {
        overrides = overrides.with_message_delay(seconds);
    }

    let provider = build_provider(config, queue)?;
    let id = provider.publish(&body, &overrides).await?;
    writeln!(out, "{}", id)?;
    Ok(())
}

async fn execute_receive_command<W: Write>(
    config: &QpushConfig,
    queue: &str,
    limit: Option<u32>,
    ack: bool,
    out: &mut W,
) -> Result<(), CliError> {
    let mut overrides = OptionOverrides::new();
    if let Some(limit) = limit {
        overrides = overrides.with_messages_to_receive(limit);
    }

    let provider = build_provider(config, queue)?;
    let messages = provider.receive(&overrides).await?;

    for message in messages {
        writeln!(out, "{}", serde_json::to_string(&message).map_err(QueueError::from)?)?;
        if ack {
            let event = MessageEvent::new(provider.queue_name().clone(), message);
            provider.on_message_received(&event).await?;
        }
    }

    Ok(())
}

async fn execute_work_command<W: Write>(
    config: &QpushConfig,
    queue: &str,
    batches: Option<u64>,
    interval_ms: u64,
    out: &mut W,
) -> Result<(), CliError> {
    let provider = build_provider(config, queue)?;
    let printer = Arc::new(PrintHandler::default());
    let pipeline = MessagePipeline::new(provider).with_handler(printer.clone());
    let idle_pause = Duration::from_millis(interval_ms);
    let long_polling = pipeline.provider().provider_type().supports_long_polling();

    info!(queue = %queue, batches = ?batches, "Worker started");

    let mut polls = 0u64;
    let mut acknowledged = 0usize;
    loop {
        let result = tokio::select! {
            result = pipeline.poll_once() => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping worker");
                break;
            }
        };
        let (report, failed) = match result {
            Ok(report) => (report, false),
            Err(e) if e.should_retry() => {
                warn!(error = %e, "Poll failed, retrying");
                (PollReport::default(), true)
            }
            Err(e) => return Err(e.into()),
        };

        for line in printer.take_lines() {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        acknowledged += report.acknowledged;
        polls += 1;
        if batches.is_some_and(|max| polls >= max) {
            break;
        }

        // Long-polling backends already waited inside the receive call
        if failed || (report.received == 0 && !long_polling) {
            tokio::select! {
                _ = tokio::time::sleep(idle_pause) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping worker");
                    break;
                }
            }
        }
    }

    info!(queue = %queue, polls, acknowledged, "Worker stopped");
    Ok(())
}

fn write_completions<W: Write>(shell: clap_complete::Shell, out: &mut W) -> Result<(), CliError> {
    clap_complete::generate(shell, &mut Cli::command(), "qpush", out);
    Ok(())
}

/// Handler that renders each message as a JSON line for the worker loop
#[derive(Debug, Default)]
struct PrintHandler {
    lines: Mutex<Vec<String>>,
}

impl PrintHandler {
    fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

#[async_trait::async_trait]
impl MessageHandler for PrintHandler {
    fn name(&self) -> &str {
        "print"
    }

    async fn handle(&self, event: &MessageEvent) -> Result<(), qpush_runtime::HandlerError> {
        let line = serde_json::to_string(event.message())
            .map_err(|e| qpush_runtime::HandlerError::failed(e.to_string()))?;
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(line);
        Ok(())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
