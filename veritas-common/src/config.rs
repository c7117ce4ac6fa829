//! Configuration loading and root folder resolution
//!
//! Resolution order for the root folder:
//! 1. Command-line argument (highest priority)
//! 2. `VERITAS_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: the service logs a warning and
//! starts on compiled defaults. A TOML file that exists but does not parse
//! is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "VERITAS_ROOT_FOLDER";

/// Name of the scratch directory created under the root folder
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: CompiledDefaults::for_current_platform().log_level,
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body on upload routes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

/// `[staging]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSection {
    /// Scratch directory; defaults to `<root_folder>/uploads`
    pub dir: Option<PathBuf>,
    /// Upper bound on simultaneously staged uploads
    pub max_staged_files: Option<usize>,
}

/// `[engine]` section
///
/// Every engine must end its stdout with one JSON object line. The stock
/// `python/analyze.py` prints its result with `print(dict)`, which is not
/// JSON and is always rejected as a malformed result; point `audio_command`
/// at an engine that emits `json.dumps` output (as `videoanalyze.py` does)
/// before serving audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Program plus fixed arguments for audio analysis; must print JSON
    pub audio_command: Vec<String>,
    /// Program plus fixed arguments for video analysis
    pub video_command: Vec<String>,
    /// Working directory for the engine process
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Engine processes allowed to run at once
    pub max_concurrent: usize,
    /// Captured bytes per output stream
    pub max_output_bytes: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            audio_command: vec!["python".to_string(), "python/analyze.py".to_string()],
            video_command: vec!["python".to_string(), "python/videoanalyze.py".to_string()],
            working_dir: None,
            timeout_secs: 300,
            max_concurrent: 2,
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Contents of a service TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub staging: StagingSection,
    pub engine: EngineSection,
}

impl TomlConfig {
    /// Load a TOML config file
    ///
    /// Returns compiled defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file not found at {}, using compiled defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Default config file location for a module: `<config_dir>/veritas/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("veritas").join(format!("{}.toml", module_name)))
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_root(mut self, path: Option<PathBuf>) -> Self {
        self.toml_root = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder on first start
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Default scratch directory for staged uploads
    pub fn uploads_path(&self) -> PathBuf {
        self.root_folder.join(UPLOADS_DIR_NAME)
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/veritas (or /var/lib/veritas for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("veritas"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/veritas"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("veritas"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/veritas"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("veritas"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\veritas"))
    } else {
        PathBuf::from("./veritas_data")
    }
}
