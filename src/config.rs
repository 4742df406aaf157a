//! Configuration management for docintel using the prefer crate.
//!
//! Settings are resolved in layers: built-in defaults, then a config file
//! (explicit `--config` path or discovered by prefer), then environment
//! variables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::ocr::OcrBackendType;

/// Default project name shown on the dashboard.
pub const DEFAULT_PROJECT_NAME: &str = "Ultimate RAG";

/// Default Stage 1 OCR model.
pub const DEFAULT_OCR_MODEL: &str = "Chandra-OCR-INT8";

/// Default Stage 2 reasoning model.
///
/// This is the Ollama tag for Qwen3-VL-8B-Instruct at Q4_K_M quantization,
/// and it is the name the dashboard sidebar shows.
pub const DEFAULT_REASONING_MODEL: &str = "qwen3-vl:8b";

/// Approximate accelerator footprint of the OCR model in GB.
pub const DEFAULT_OCR_FOOTPRINT_GB: f64 = 2.5;

/// Approximate accelerator footprint of the reasoning model in GB.
pub const DEFAULT_REASONING_FOOTPRINT_GB: f64 = 4.8;

/// Default VRAM budget in GB.
pub const DEFAULT_VRAM_LIMIT_GB: f64 = 6.0;

/// Default database name (the SQLite file is `<name>.db`).
pub const DEFAULT_DB_NAME: &str = "ultimate_rag_db";

/// Fusion confidence below which thinking mode runs.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Maximum stored embedding width.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Application settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Display name of the project.
    pub project_name: String,
    /// Stage 1 OCR model name.
    pub ocr_model_version: String,
    /// OCR model footprint in GB.
    pub ocr_footprint_gb: f64,
    /// Stage 2 reasoning model name.
    pub reasoning_llm_version: String,
    /// Reasoning model footprint in GB.
    pub reasoning_footprint_gb: f64,
    /// Accelerator memory budget in GB.
    pub vram_limit_gb: f64,
    /// Accelerator device identifier.
    pub gpu_device: String,
    /// Folder scanned for incoming documents.
    pub data_dir: PathBuf,
    /// Folder holding the database.
    pub storage_dir: PathBuf,
    /// Database name.
    pub db_name: String,
    /// OCR backend used for Stage 1.
    pub ocr_backend: OcrBackendType,
    /// Tesseract language(s).
    pub ocr_language: String,
    /// Thinking-mode threshold.
    pub confidence_threshold: f32,
    /// Embedding model; embeddings are skipped when unset.
    pub embedding_model: Option<String>,
    /// Embedding width cap.
    pub embedding_dim: usize,
    /// Model server connection.
    pub llm: LlmConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_base_dir(&cwd)
    }
}

impl Settings {
    /// Default settings with `data/` and `storage/` under `base_dir`.
    pub fn with_base_dir(base_dir: &Path) -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            ocr_model_version: DEFAULT_OCR_MODEL.to_string(),
            ocr_footprint_gb: DEFAULT_OCR_FOOTPRINT_GB,
            reasoning_llm_version: DEFAULT_REASONING_MODEL.to_string(),
            reasoning_footprint_gb: DEFAULT_REASONING_FOOTPRINT_GB,
            vram_limit_gb: DEFAULT_VRAM_LIMIT_GB,
            gpu_device: "cuda:0".to_string(),
            data_dir: base_dir.join("data"),
            storage_dir: base_dir.join("storage"),
            db_name: DEFAULT_DB_NAME.to_string(),
            ocr_backend: OcrBackendType::Tesseract,
            ocr_language: "eng".to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            embedding_model: None,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            llm: LlmConfig::default(),
        }
    }

    /// Full path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}.db", self.db_name))
    }

    /// Check if the database file has been created.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data and storage directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [("data", &self.data_dir), ("storage", &self.storage_dir)] {
            tracing::debug!("Ensuring {} directory {}", label, dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }

    /// Apply `DOCINTEL_*` overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("DOCINTEL_DATA_DIR") {
            self.data_dir = expand_path(&dir);
        }
        if let Some(dir) = var("DOCINTEL_STORAGE_DIR") {
            self.storage_dir = expand_path(&dir);
        }
        if let Some(name) = var("DOCINTEL_DB_NAME") {
            self.db_name = name;
        }
        if let Some(backend) = var("DOCINTEL_OCR_BACKEND") {
            match OcrBackendType::from_str(&backend) {
                Some(b) => self.ocr_backend = b,
                None => tracing::warn!("Ignoring unknown DOCINTEL_OCR_BACKEND '{}'", backend),
            }
        }
        if let Some(model) = var("DOCINTEL_OCR_MODEL") {
            self.ocr_model_version = model;
        }
        if let Some(model) = var("DOCINTEL_REASONING_MODEL") {
            self.reasoning_llm_version = model;
        }
        if let Some(limit) = var("DOCINTEL_VRAM_LIMIT_GB").and_then(|v| v.parse().ok()) {
            self.vram_limit_gb = limit;
        }
        if let Some(device) = var("DOCINTEL_GPU_DEVICE") {
            self.gpu_device = device;
        }
        if let Some(model) = var("DOCINTEL_EMBEDDING_MODEL") {
            self.embedding_model = Some(model);
        }
    }
}

/// Configuration file structure. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Folder scanned for incoming documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Folder holding the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_footprint_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_footprint_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vram_limit_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_device: Option<String>,
    /// "tesseract" or "vision".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,
    /// Model server configuration.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Self {
        match prefer::load("docintel").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        config.llm = config.llm.with_env_overrides();
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Directory of the config file, if it came from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to `base_dir`. `~` is expanded.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let path = expand_path(path_str);
        if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        }
    }

    /// Apply file values on top of `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref name) = self.project_name {
            settings.project_name = name.clone();
        }
        if let Some(ref dir) = self.data_dir {
            settings.data_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.storage_dir {
            settings.storage_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref name) = self.db_name {
            settings.db_name = name.clone();
        }
        if let Some(ref model) = self.ocr_model {
            settings.ocr_model_version = model.clone();
        }
        if let Some(gb) = self.ocr_footprint_gb {
            settings.ocr_footprint_gb = gb;
        }
        if let Some(ref model) = self.reasoning_model {
            settings.reasoning_llm_version = model.clone();
        }
        if let Some(gb) = self.reasoning_footprint_gb {
            settings.reasoning_footprint_gb = gb;
        }
        if let Some(limit) = self.vram_limit_gb {
            settings.vram_limit_gb = limit;
        }
        if let Some(ref device) = self.gpu_device {
            settings.gpu_device = device.clone();
        }
        if let Some(ref backend) = self.ocr_backend {
            match OcrBackendType::from_str(backend) {
                Some(b) => settings.ocr_backend = b,
                None => tracing::warn!("Ignoring unknown ocr_backend '{}' in config", backend),
            }
        }
        if let Some(ref lang) = self.ocr_language {
            settings.ocr_language = lang.clone();
        }
        if let Some(threshold) = self.confidence_threshold {
            settings.confidence_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(ref model) = self.embedding_model {
            settings.embedding_model = Some(model.clone());
        }
        if let Some(dim) = self.embedding_dim {
            settings.embedding_dim = dim;
        }
        settings.llm = self.llm.clone();
    }
}

/// Expand `~` and environment variables in a path.
fn expand_path(path_str: &str) -> PathBuf {
    match shellexpand::full(path_str) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path_str).as_ref()),
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default()
            }
        },
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd.clone()
    } else {
        config.base_dir().unwrap_or_else(|| cwd.clone())
    };

    let mut settings = Settings::with_base_dir(&cwd);
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env_overrides(|name| std::env::var(name).ok());

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::with_base_dir(Path::new("/srv/rag"));
        assert_eq!(settings.project_name, "Ultimate RAG");
        assert_eq!(settings.ocr_model_version, "Chandra-OCR-INT8");
        assert_eq!(settings.vram_limit_gb, 6.0);
        assert_eq!(settings.data_dir, PathBuf::from("/srv/rag/data"));
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/srv/rag/storage/ultimate_rag_db.db")
        );
        assert!(settings.ocr_footprint_gb + settings.reasoning_footprint_gb > settings.vram_limit_gb);
        assert_eq!(settings.confidence_threshold, 0.7);
    }

    #[test]
    fn test_parse_by_extension() {
        let toml = "data_dir = \"inbox\"\nvram_limit_gb = 8.0\nocr_backend = \"vision\"\n";
        let config = Config::parse(toml, Path::new("docintel.toml")).unwrap();
        assert_eq!(config.data_dir.as_deref(), Some("inbox"));
        assert_eq!(config.vram_limit_gb, Some(8.0));

        let yaml = "db_name: tenders\nllm:\n  endpoint: http://gpu-box:11434\n";
        let config = Config::parse(yaml, Path::new("docintel.yaml")).unwrap();
        assert_eq!(config.db_name.as_deref(), Some("tenders"));
        assert_eq!(config.llm.endpoint, "http://gpu-box:11434");

        let json = r#"{"confidence_threshold": 0.8}"#;
        let config = Config::parse(json, Path::new("docintel.json")).unwrap();
        assert_eq!(config.confidence_threshold, Some(0.8));

        assert!(Config::parse("not = [valid", Path::new("bad.toml")).is_err());
    }

    #[test]
    fn test_apply_resolves_relative_paths() {
        let config = Config {
            data_dir: Some("inbox".to_string()),
            storage_dir: Some("/var/lib/docintel".to_string()),
            ocr_backend: Some("chandra".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::with_base_dir(Path::new("/tmp"));
        config.apply_to_settings(&mut settings, Path::new("/etc/docintel"));

        assert_eq!(settings.data_dir, PathBuf::from("/etc/docintel/inbox"));
        assert_eq!(settings.storage_dir, PathBuf::from("/var/lib/docintel"));
        assert_eq!(settings.ocr_backend, OcrBackendType::Vision);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCINTEL_DB_NAME", "tenders"),
            ("DOCINTEL_VRAM_LIMIT_GB", "12"),
            ("DOCINTEL_OCR_BACKEND", "bogus"),
            ("DOCINTEL_EMBEDDING_MODEL", "nomic-embed-text"),
            ("DOCINTEL_GPU_DEVICE", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::with_base_dir(Path::new("/tmp"));
        settings.apply_env_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(settings.db_name, "tenders");
        assert_eq!(settings.vram_limit_gb, 12.0);
        assert_eq!(settings.ocr_backend, OcrBackendType::Tesseract);
        assert_eq!(settings.embedding_model.as_deref(), Some("nomic-embed-text"));
        assert_eq!(settings.gpu_device, "cuda:0");
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docintel.json");
        std::fs::write(&path, r#"{"data_dir": "./incoming"}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));

        let mut settings = Settings::with_base_dir(Path::new("/tmp"));
        config.apply_to_settings(&mut settings, dir.path());
        assert_eq!(settings.data_dir, dir.path().join("./incoming"));
    }
}
