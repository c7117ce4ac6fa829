//! Stand-in analysis engines

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use veritas_ad::models::MediaKind;
use veritas_ad::services::{
    AnalysisEngine, AnalysisOrchestrator, EngineError, EngineInvocation, EnginePool, StagingConfig, StagingStore,
};

/// Engine output from the documented example run
pub const VALID_RESULT: &str =
    r#"{"cnn":{"label":"Real","confidence":"92%"},"rnn":{"label":"Real","confidence":"88%"}}"#;

pub const FAKE_RESULT: &str =
    r#"{"cnn":{"label":"Fake","confidence":97},"rnn":{"label":"Fake","confidence":64}}"#;

/// What a [`ScriptedEngine`] does when invoked
#[derive(Clone)]
pub enum Behavior {
    /// Exit 0 with this stdout
    Stdout(String),
    /// Exit 0 echoing the staged file's content as both confidences
    EchoContent,
    /// Fail with the error built by this function
    Fail(fn() -> EngineError),
    /// Never finish
    Hang,
    /// Panic mid-invocation
    Panic,
}

/// A staged file as seen from inside the engine
#[derive(Debug, Clone)]
pub struct SeenFile {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub existed: bool,
    pub content: Vec<u8>,
}

/// In-process engine that records every staged file it is handed
pub struct ScriptedEngine {
    behavior: Behavior,
    seen: Mutex<Vec<SeenFile>>,
}

impl ScriptedEngine {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<SeenFile> {
        self.seen.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    async fn invoke(&self, kind: MediaKind, staged_path: &Path) -> Result<EngineInvocation, EngineError> {
        let content = std::fs::read(staged_path).unwrap_or_default();
        self.seen.lock().unwrap().push(SeenFile {
            kind,
            path: staged_path.to_path_buf(),
            existed: staged_path.exists(),
            content: content.clone(),
        });

        let stdout = match &self.behavior {
            Behavior::Stdout(stdout) => stdout.clone(),
            Behavior::EchoContent => {
                let text = String::from_utf8_lossy(&content);
                format!(
                    "diagnostic: analyzing {}\n{{\"cnn\":{{\"label\":\"Real\",\"confidence\":\"{}\"}},\"rnn\":{{\"label\":\"Fake\",\"confidence\":\"{}\"}}}}\n",
                    staged_path.display(),
                    text,
                    text
                )
            }
            Behavior::Fail(make) => return Err(make()),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("engine exploded"),
        };

        Ok(EngineInvocation {
            program: "scripted".to_string(),
            args: Vec::new(),
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
            duration: Duration::from_millis(1),
        })
    }
}

/// Orchestrator over `engine` staging into `scratch`
pub fn orchestrator_with(engine: Arc<dyn AnalysisEngine>, scratch: &Path) -> AnalysisOrchestrator {
    let staging = StagingStore::new(StagingConfig {
        root: scratch.to_path_buf(),
        max_staged_files: 64,
    });
    AnalysisOrchestrator::new(staging, EnginePool::new(engine, 4))
}

/// Files currently present in the scratch directory
pub fn scratch_entries(scratch: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(scratch) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Subprocess engine running `sh -c <script> engine <staged path>`
#[cfg(unix)]
pub fn sh_engine(script: &str, timeout: Duration) -> Arc<veritas_ad::services::ProcessEngine> {
    use veritas_ad::services::{EngineCommand, EngineConfig, ProcessEngine};

    let command = EngineCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string(), "engine".to_string()],
    };
    Arc::new(ProcessEngine::new(EngineConfig {
        audio: command.clone(),
        video: command,
        working_dir: None,
        timeout,
        max_output_bytes: 64 * 1024,
    }))
}

/// Whether `pid` is a live (non-zombie) process, polling briefly for it to go away
///
/// Killed orphans are reaped by init, which may take a moment or never
/// happen inside minimal containers, so zombies count as dead.
#[cfg(unix)]
pub async fn process_alive(pid: &str) -> bool {
    let pid = pid.trim();
    for _ in 0..20 {
        let alive = match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // State is the first field after the parenthesized command name
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) if std::path::Path::new("/proc/self/stat").exists() => false,
            Err(_) => std::process::Command::new("kill")
                .args(["-0", pid])
                .stderr(std::process::Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false),
        };
        if !alive {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    true
}
