//! Service configuration for veritas-ad
//!
//! Combines the TOML file, environment and command-line overrides into a
//! validated [`ServiceConfig`], and builds the analysis pipeline from it.
//! Nothing in the pipeline reads ambient process state; everything it
//! needs is threaded through here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use veritas_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use veritas_common::{Error, Result};

use crate::services::{
    AnalysisOrchestrator, EngineCommand, EngineConfig, EnginePool, ProcessEngine, StagingConfig, StagingStore,
};

/// Module name used for config lookup and health reporting
pub const MODULE_NAME: &str = "veritas-ad";

/// Default cap on simultaneously staged uploads
const DEFAULT_MAX_STAGED_FILES: usize = 32;

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub staging: StagingConfig,
    pub engine: EngineConfig,
    pub max_concurrent_engines: usize,
}

impl ServiceConfig {
    /// Resolve and validate configuration
    pub fn resolve(toml: TomlConfig, cli: CliOverrides) -> Result<Self> {
        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(cli.root_folder)
            .with_toml_root(toml.root_folder.clone())
            .resolve();

        let staging_root = toml
            .staging
            .dir
            .clone()
            .unwrap_or_else(|| RootFolderInitializer::new(root_folder.clone()).uploads_path());
        let max_staged_files = toml.staging.max_staged_files.unwrap_or(DEFAULT_MAX_STAGED_FILES);
        if max_staged_files == 0 {
            return Err(Error::Config("staging.max_staged_files must be at least 1".to_string()));
        }

        let engine = &toml.engine;
        let audio = EngineCommand::from_argv(&engine.audio_command)
            .ok_or_else(|| Error::Config("engine.audio_command must name a program".to_string()))?;
        let video = EngineCommand::from_argv(&engine.video_command)
            .ok_or_else(|| Error::Config("engine.video_command must name a program".to_string()))?;
        if engine.timeout_secs == 0 {
            return Err(Error::Config("engine.timeout_secs must be at least 1".to_string()));
        }
        if engine.max_concurrent == 0 {
            return Err(Error::Config("engine.max_concurrent must be at least 1".to_string()));
        }
        if engine.max_output_bytes == 0 {
            return Err(Error::Config("engine.max_output_bytes must be at least 1".to_string()));
        }
        if toml.server.max_upload_bytes == 0 {
            return Err(Error::Config("server.max_upload_bytes must be at least 1".to_string()));
        }

        Ok(Self {
            root_folder,
            log_level: toml.logging.level.clone(),
            host: toml.server.host.clone(),
            port: cli.port.unwrap_or(toml.server.port),
            max_upload_bytes: toml.server.max_upload_bytes,
            staging: StagingConfig {
                root: staging_root,
                max_staged_files,
            },
            engine: EngineConfig {
                audio,
                video,
                working_dir: engine.working_dir.clone(),
                timeout: Duration::from_secs(engine.timeout_secs),
                max_output_bytes: engine.max_output_bytes,
            },
            max_concurrent_engines: engine.max_concurrent,
        })
    }

    /// Tracing filter used when `RUST_LOG` is unset
    ///
    /// A bare level (`debug`) applies to this service's crates and the HTTP
    /// layer; anything containing `=` is taken as a full directive.
    pub fn default_log_directive(&self) -> String {
        if self.log_level.contains('=') {
            return self.log_level.clone();
        }
        format!(
            "veritas_ad={0},veritas_common={0},tower_http={0}",
            self.log_level
        )
    }

    /// Build the staging store, engine pool and orchestrator
    pub fn build_orchestrator(&self) -> AnalysisOrchestrator {
        let staging = StagingStore::new(self.staging.clone());
        let engine = Arc::new(ProcessEngine::new(self.engine.clone()));
        let pool = EnginePool::new(engine, self.max_concurrent_engines);
        AnalysisOrchestrator::new(staging, pool)
    }
}
