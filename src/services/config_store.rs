// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::detection::metadata_analyzer::MetadataPolicy;
use super::detection::validator::MAX_UPLOAD_BYTES;
use crate::models::EnsembleThresholds;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const BACKUPS_TO_KEEP: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Per-engine overrides keyed by engine id (e.g. `sightengine/genai`)
    #[serde(default)]
    pub engines: HashMap<String, EngineConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            detection: DetectionConfig::default(),
            engines: HashMap::new(),
            api_keys: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Engines are on unless explicitly disabled.
    pub fn engine_enabled(&self, engine_id: &str) -> bool {
        self.engines.get(engine_id).map_or(true, |e| e.enabled)
    }

    /// Bind address, with `REALCHECK_BIND` taking precedence over the file.
    pub fn bind_addr(&self) -> String {
        match env::var("REALCHECK_BIND") {
            Ok(addr) if !addr.trim().is_empty() => addr.trim().to_string(),
            _ => self.server.bind_addr.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,
    #[serde(default)]
    pub metadata: MetadataPolicy,
    #[serde(default)]
    pub ensemble: EnsembleThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            engine_timeout_secs: default_engine_timeout_secs(),
            metadata: MetadataPolicy::default(),
            ensemble: EnsembleThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: Option<String>,
}

fn default_version() -> String { "1.0.0".to_string() }
fn default_bind_addr() -> String { DEFAULT_BIND_ADDR.to_string() }
fn default_max_upload_bytes() -> usize { MAX_UPLOAD_BYTES }
fn default_engine_timeout_secs() -> u64 { 20 }
fn default_true() -> bool { true }

/// A single edit to the stored configuration, as issued from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    SetKey { name: String, value: String },
    DeleteKey { name: String },
    SetEngineUrl { engine_id: String, url: String },
}

impl ConfigCommand {
    /// Recognize `--set-key <name> <value>`, `--delete-key <name>` and
    /// `--set-engine-url <engine_id> <url>`. `Ok(None)` when no edit flag is present.
    pub fn parse(args: &[String]) -> Result<Option<Self>, String> {
        let operands = |flag: &str, count: usize| -> Option<Result<Vec<String>, String>> {
            let i = args.iter().position(|a| a == flag)?;
            let values: Vec<String> = args.iter().skip(i + 1).take(count).cloned().collect();
            if values.len() < count || values.iter().any(|v| v.starts_with("--")) {
                return Some(Err(format!("{} expects {} argument(s)", flag, count)));
            }
            Some(Ok(values))
        };

        if let Some(values) = operands("--set-key", 2) {
            let mut values = values?.into_iter();
            return Ok(Some(Self::SetKey {
                name: values.next().unwrap_or_default(),
                value: values.next().unwrap_or_default(),
            }));
        }
        if let Some(values) = operands("--delete-key", 1) {
            return Ok(Some(Self::DeleteKey {
                name: values?.into_iter().next().unwrap_or_default(),
            }));
        }
        if let Some(values) = operands("--set-engine-url", 2) {
            let mut values = values?.into_iter();
            return Ok(Some(Self::SetEngineUrl {
                engine_id: values.next().unwrap_or_default(),
                url: values.next().unwrap_or_default(),
            }));
        }
        Ok(None)
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory (`REALCHECK_CONFIG_DIR` wins over the platform dir)
    pub fn default_config_dir() -> Option<PathBuf> {
        match env::var("REALCHECK_CONFIG_DIR") {
            Ok(p) if !p.trim().is_empty() => Some(PathBuf::from(p)),
            _ => dirs::config_dir().map(|p| p.join("realcheck")),
        }
    }

    /// Load from the default location, or defaults when there is none
    pub fn load_default() -> Result<AppConfig, String> {
        match Self::default_config_dir() {
            Some(dir) => Self::new(dir).load(),
            None => Ok(AppConfig::default()),
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        self.cleanup_old_backups(&backup_dir, BACKUPS_TO_KEEP)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; file names carry the timestamp
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Store a credential in the config file
    pub fn set_api_key(&self, name: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(name.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete a credential from the config file
    pub fn delete_api_key(&self, name: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(name);
        self.save(&config)
    }

    /// Apply one edit and persist it (previous file goes to `backups/`)
    pub fn apply(&self, command: &ConfigCommand) -> Result<(), String> {
        match command {
            ConfigCommand::SetKey { name, value } => self.set_api_key(name, value),
            ConfigCommand::DeleteKey { name } => self.delete_api_key(name),
            ConfigCommand::SetEngineUrl { engine_id, url } => self.set_engine_url(engine_id, url),
        }
    }

    /// Point an engine at a different endpoint
    pub fn set_engine_url(&self, engine_id: &str, url: &str) -> Result<(), String> {
        let mut config = self.load()?;
        let engine = config
            .engines
            .entry(engine_id.to_string())
            .or_insert_with(|| EngineConfig {
                enabled: true,
                base_url: None,
            });
        engine.base_url = Some(url.to_string());
        self.save(&config)
    }
}
