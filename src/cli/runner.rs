//! CLI runner - executes commands

use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{Message, SyncEngine};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use futures::StreamExt;
use serde_json::json;
use std::fs;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover().await,
            Commands::Read { streams, catalog } => {
                self.read(streams.as_deref(), catalog.as_deref()).await
            }
        }
    }

    /// Load tap configuration from --config or --config-json
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(inline) = &self.cli.config_json {
            return TapConfig::from_json(inline);
        }
        if let Some(path) = &self.cli.config {
            let contents = fs::read_to_string(path)?;
            return TapConfig::from_json(&contents);
        }
        Err(Error::config(
            "No configuration given (use --config or --config-json)",
        ))
    }

    /// Hit the ping endpoint with the configured credentials
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = HttpClient::new(&config)?;

        match client.get_json("/ping", RequestConfig::new()).await {
            Ok(body) => {
                let status = body
                    .get("health_status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("ok");
                self.emit(&json!({
                    "type": "CONNECTION_STATUS",
                    "status": "SUCCEEDED",
                    "message": status,
                }))?;
                Ok(())
            }
            Err(e) => {
                self.emit(&json!({
                    "type": "CONNECTION_STATUS",
                    "status": "FAILED",
                    "message": e.to_string(),
                }))?;
                Err(e)
            }
        }
    }

    /// Print the discovered catalog
    async fn discover(&self) -> Result<()> {
        let config = self.load_config()?;
        let engine = SyncEngine::new(&config)?;
        let catalog = engine.discover().await?;

        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&catalog)?),
            OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(&catalog)?),
        }
        Ok(())
    }

    /// Run extraction and print messages to stdout
    async fn read(&self, streams: Option<&str>, catalog_path: Option<&std::path::Path>) -> Result<()> {
        let config = self.load_config()?;
        let mut engine = SyncEngine::new(&config)?;

        if let Some(path) = catalog_path {
            engine = engine.with_catalog(Catalog::from_file(path)?);
        }
        if let Some(streams) = streams {
            let names: Vec<String> = streams
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            engine = engine.with_stream_filter(names);
        }

        let mut messages = engine.run();
        while let Some(message) = messages.next().await {
            self.output_message(&message?)?;
        }
        Ok(())
    }

    fn output_message(&self, message: &Message) -> Result<()> {
        match message {
            Message::Schema {
                stream,
                schema,
                key_properties,
            } => self.emit(&json!({
                "type": "SCHEMA",
                "stream": stream,
                "schema": schema.as_ref(),
                "key_properties": key_properties,
            })),
            Message::Record {
                stream,
                record,
                time_extracted,
            } => self.emit(&json!({
                "type": "RECORD",
                "stream": stream,
                "record": record,
                "time_extracted": time_extracted.to_rfc3339(),
            })),
            Message::Summary(stats) => {
                if stats.failed_contexts > 0 || stats.skipped_records > 0 {
                    warn!(
                        failed_contexts = stats.failed_contexts,
                        skipped_records = stats.skipped_records,
                        "Sync completed with partial failures"
                    );
                }
                info!(
                    records = stats.total_records(),
                    pages = stats.total_pages(),
                    "Sync complete"
                );
                Ok(())
            }
        }
    }

    fn emit(&self, value: &serde_json::Value) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
            OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }
}
