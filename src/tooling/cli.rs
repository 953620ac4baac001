//! CLI Tooling
//!
//! Command-line front end over the [`StateController`]. Every mutating command
//! navigates to its target folder first and then issues the same intent a
//! presentation layer would.

use crate::config::{ConfigLoader, NodeVaultConfig};
use crate::error::ApiError;
use crate::state::{StateController, UploadFile};
use crate::store::{NodeRecord, SledNodeRecordStore};
use crate::types::NodeId;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// NodeVault CLI - hierarchical file and folder store
#[derive(Parser)]
#[command(name = "nodevault")]
#[command(about = "Browse and edit a hierarchical file store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database directory (overrides storage.path)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the contents of a folder (top level by default)
    Ls {
        folder: Option<String>,
    },
    /// Create a folder
    Mkdir {
        name: String,
        /// Parent folder id (top level by default)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Upload a local file
    Upload {
        path: PathBuf,
        /// Parent folder id (top level by default)
        #[arg(long)]
        parent: Option<String>,
        /// Name in the store (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        /// Content type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Delete a node and everything below it
    Rm {
        id: String,
    },
    /// Rename a node
    Rename {
        id: String,
        name: String,
    },
    /// Search names (case-insensitive substring)
    Find {
        query: String,
    },
    /// Show the ancestor path of a node
    Path {
        id: String,
    },
    /// Print a file's content
    Cat {
        id: String,
    },
    /// Print the effective configuration
    Config,
}

impl Cli {
    /// Load configuration and fold command-line overrides into it.
    pub fn load_config(&self) -> Result<NodeVaultConfig, ApiError> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        if let Some(store) = &self.store {
            config.storage.path = Some(store.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        Ok(config)
    }
}

/// CLI context: an opened store and a controller driving it.
pub struct CliContext {
    store: Arc<SledNodeRecordStore>,
    controller: StateController,
    config: NodeVaultConfig,
    format: OutputFormat,
}

impl CliContext {
    pub fn new(config: NodeVaultConfig, format: OutputFormat) -> Result<Self, ApiError> {
        let store = Arc::new(SledNodeRecordStore::open_with(&config.storage)?);
        Ok(Self::with_store(store, config, format))
    }

    pub fn with_store(
        store: Arc<SledNodeRecordStore>,
        config: NodeVaultConfig,
        format: OutputFormat,
    ) -> Self {
        let controller = StateController::new(store.clone(), config.controller.clone());
        Self {
            store,
            controller,
            config,
            format,
        }
    }

    pub fn controller(&self) -> &StateController {
        &self.controller
    }

    /// Execute a CLI command and return what should be printed.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        // Only a successful write needs to reach disk
        let result = match self.execute_inner(command).await {
            Ok(output) if is_mutating(command) => self.store.flush().await.map(|_| output),
            other => other,
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(command = command_name(command), duration_ms, "Command finished"),
            Err(err) if err.is_user_error() => {
                warn!(command = command_name(command), duration_ms, error = %err, "Command rejected")
            }
            Err(err) => {
                error!(command = command_name(command), duration_ms, error = %err, "Command failed")
            }
        }
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Ls { folder } => {
                let folder = folder_arg(folder.as_deref());
                self.controller.navigate(&folder).await?;
                let snapshot = self.controller.snapshot();
                match self.format {
                    OutputFormat::Json => to_json(&json!({
                        "folder": snapshot.current_folder_id,
                        "breadcrumbs": snapshot.breadcrumbs,
                        "items": snapshot.items,
                    })),
                    OutputFormat::Text => {
                        let mut out = format!("/{}\n", trail_text(&snapshot.breadcrumbs));
                        if snapshot.items.is_empty() {
                            out.push_str("(empty)");
                        } else {
                            out.push_str(&records_table(&snapshot.items));
                        }
                        Ok(out)
                    }
                }
            }
            Commands::Mkdir { name, parent } => {
                self.controller
                    .navigate(&folder_arg(parent.as_deref()))
                    .await?;
                let created = self.controller.create_folder(name).await?;
                self.render_record("Created folder", &created)
            }
            Commands::Upload {
                path,
                parent,
                name,
                mime,
            } => {
                let content = std::fs::read(path).map_err(|e| {
                    ApiError::ValidationError(format!("Cannot read {}: {}", path.display(), e))
                })?;
                let name = match name {
                    Some(name) => name.clone(),
                    None => local_file_name(path)?,
                };
                let mime = mime.clone().unwrap_or_else(|| guess_mime(&name).to_string());

                self.controller
                    .navigate(&folder_arg(parent.as_deref()))
                    .await?;
                let created = self
                    .controller
                    .upload_file(UploadFile::new(name, mime, content))
                    .await?;
                self.render_record("Uploaded", &created)
            }
            Commands::Rm { id } => {
                let id = NodeId::from(id.as_str());
                let removed = self.controller.delete_node(&id).await?;
                match self.format {
                    OutputFormat::Json => to_json(&json!({ "deleted": id, "removed": removed })),
                    OutputFormat::Text => Ok(format!("Deleted {} ({} removed)", id, removed)),
                }
            }
            Commands::Rename { id, name } => {
                let renamed = self
                    .controller
                    .rename_node(&NodeId::from(id.as_str()), name)
                    .await?;
                self.render_record("Renamed", &renamed)
            }
            Commands::Find { query } => {
                let results = self.controller.search_files(query).await?;
                match self.format {
                    OutputFormat::Json => to_json(&results),
                    OutputFormat::Text if results.is_empty() => {
                        Ok(format!("No names match \"{}\"", query))
                    }
                    OutputFormat::Text => Ok(records_table(&results)),
                }
            }
            Commands::Path { id } => {
                let id = NodeId::from(id.as_str());
                let trail = crate::tree::PathResolver::new(self.store.clone())
                    .breadcrumbs(&id)
                    .await?;
                if !id.is_root() && trail.last().map(|r| &r.id) != Some(&id) {
                    return Err(ApiError::NotFound(format!("Node not found: {}", id)));
                }
                match self.format {
                    OutputFormat::Json => to_json(&trail),
                    OutputFormat::Text => Ok(format!("/{}", trail_text(&trail))),
                }
            }
            Commands::Cat { id } => {
                let bytes = self.controller.read_file(&NodeId::from(id.as_str())).await?;
                match self.format {
                    OutputFormat::Json => to_json(&json!({
                        "id": id,
                        "size": bytes.len(),
                        "content_hex": hex::encode(&bytes),
                    })),
                    OutputFormat::Text => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                }
            }
            Commands::Config => match self.format {
                OutputFormat::Json => to_json(&self.config),
                OutputFormat::Text => toml::to_string_pretty(&self.config)
                    .map_err(|e| ApiError::ConfigError(format!("Cannot render config: {}", e))),
            },
        }
    }

    fn render_record(&self, verb: &str, record: &NodeRecord) -> Result<String, ApiError> {
        match self.format {
            OutputFormat::Json => to_json(record),
            OutputFormat::Text => Ok(format!("{} \"{}\" ({})", verb, record.name, record.id)),
        }
    }
}

fn folder_arg(folder: Option<&str>) -> NodeId {
    folder.map(NodeId::from).unwrap_or_else(NodeId::root)
}

fn is_mutating(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Mkdir { .. }
            | Commands::Upload { .. }
            | Commands::Rm { .. }
            | Commands::Rename { .. }
    )
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Ls { .. } => "ls",
        Commands::Mkdir { .. } => "mkdir",
        Commands::Upload { .. } => "upload",
        Commands::Rm { .. } => "rm",
        Commands::Rename { .. } => "rename",
        Commands::Find { .. } => "find",
        Commands::Path { .. } => "path",
        Commands::Cat { .. } => "cat",
        Commands::Config => "config",
    }
}

fn local_file_name(path: &Path) -> Result<String, ApiError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ApiError::ValidationError(format!("{} has no file name", path.display()))
        })
}

fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "toml" => "application/toml",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn trail_text(trail: &[NodeRecord]) -> String {
    trail
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

fn records_table(records: &[NodeRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Name", "Kind", "Size", "Node ID", "Updated"]);
    for record in records {
        let kind = if record.is_folder() { "folder" } else { "file" };
        let size = record
            .payload
            .as_ref()
            .map(|p| p.size.to_string())
            .unwrap_or_else(|| "-".to_string());
        let updated = chrono::DateTime::from_timestamp_millis(record.updated_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| record.updated_at.to_string());
        table.add_row(vec![
            record.name.clone(),
            kind.to_string(),
            size,
            record.id.to_string(),
            updated,
        ]);
    }
    table.to_string()
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ValidationError(format!("Cannot render JSON: {}", e)))
}
