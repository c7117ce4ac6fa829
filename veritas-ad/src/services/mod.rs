//! Services behind the analysis endpoints
//!
//! Leaf-first: staging store, engine adapter and pool, result parser, and
//! the orchestrator composing them.

pub mod engine_adapter;
pub mod engine_pool;
pub mod orchestrator;
pub mod result_parser;
pub mod staging_store;

pub use engine_adapter::{AnalysisEngine, EngineCommand, EngineConfig, EngineError, EngineInvocation, ProcessEngine};
pub use engine_pool::EnginePool;
pub use orchestrator::{AnalysisError, AnalysisOrchestrator, AnalysisOutcome, ErrorKind};
pub use result_parser::{parse_engine_output, ParseError, SchemaViolation};
pub use staging_store::{sanitize_file_name, StagedFile, StagingConfig, StagingError, StagingStore};
