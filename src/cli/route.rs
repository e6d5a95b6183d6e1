//! CLI route: single route table and run context.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_config, format_record_list_json, format_record_list_text};
use crate::config::{ConfigLoader, MemogenConfig};
use crate::error::{DispenseError, StorageError};
use crate::params::Pars;
use crate::store::ArtifactStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Runtime context for CLI execution: workspace, effective config and store.
pub struct RunContext {
    workspace_root: PathBuf,
    config: MemogenConfig,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, DispenseError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(workspace_root, config)
    }

    pub fn from_config(workspace_root: PathBuf, config: MemogenConfig) -> Result<Self, DispenseError> {
        let config = config.validated()?;
        let store = config.store.open(&workspace_root)?;
        debug!(
            workspace = %workspace_root.display(),
            backend = ?config.store.backend,
            "CLI context initialized"
        );
        Ok(Self {
            workspace_root,
            config,
            store,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &MemogenConfig {
        &self.config
    }

    /// Execute a command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, DispenseError> {
        match command {
            Commands::List { dataname, format } => {
                let mut records = self.store()?.list()?;
                if let Some(dataname) = dataname {
                    records.retain(|r| &r.dataname == dataname);
                }
                match format.as_str() {
                    "json" => format_record_list_json(&records),
                    "text" => Ok(format_record_list_text(&records)),
                    other => Err(DispenseError::Configuration(format!(
                        "Unknown format '{}' (expected text or json)",
                        other
                    ))),
                }
            }
            Commands::Show { dataname, idpars } => {
                let idpars = parse_idpars(idpars)?;
                let artifact = self.store()?.fetch(dataname, &idpars)?;
                serde_json::to_string_pretty(&artifact)
                    .map_err(|e| StorageError::Serialization(e.to_string()).into())
            }
            Commands::Path {
                dataname,
                idpars,
                extension,
            } => {
                let idpars = parse_idpars(idpars)?;
                let path = self.store()?.path_for(dataname, &idpars, extension)?;
                Ok(path.display().to_string())
            }
            Commands::Exists { dataname, idpars } => {
                let idpars = parse_idpars(idpars)?;
                Ok(self.store()?.exists(dataname, &idpars)?.to_string())
            }
            Commands::Config => format_config(&self.config),
        }
    }

    fn store(&self) -> Result<&Arc<dyn ArtifactStore>, DispenseError> {
        self.store.as_ref().ok_or_else(|| {
            DispenseError::Configuration("No store configured (store.backend = \"none\")".to_string())
        })
    }
}

fn parse_idpars(text: &str) -> Result<Pars, DispenseError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        DispenseError::Configuration(format!("Identity parameters are not valid JSON: {}", e))
    })?;
    Pars::from_json(value)
}
