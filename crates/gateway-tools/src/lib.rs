//! Tool registry, schema validation, retrying executor, and per-turn
//! memoization (spec §4.C).

pub mod default_schemas;
pub mod executor;
pub mod memo;
pub mod registry;
pub mod schema;

pub use executor::{classify_status, execute_with_retry, ToolErrorCode, ToolExecutionError, ToolExecutor};
pub use memo::ToolMemoCache;
pub use registry::{ExecutorConfig, RegistryError, ToolDefinition, ToolRegistry};
pub use schema::{validate, ParamSpec, ParamType, ToolSchema};
