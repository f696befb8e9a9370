//! Operation transport port

use async_trait::async_trait;
use carelink_domain::{Operation, Result};
use serde_json::Value;

/// Executes request/response operations against the upstream platform
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute a query or mutation and return its `data` object.
    async fn execute(&self, operation: Operation) -> Result<Value>;
}
