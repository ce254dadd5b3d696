//! The actual call-out to an external service. The engine supplies a real
//! dispatcher (HTTP, gRPC, message queue); this crate ships only a mock
//! one driven by the contract's `mock` field, for development and tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("capability call failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait CapabilityDispatcher: Send + Sync {
    async fn invoke(
        &self,
        service: &str,
        function: &str,
        args: &HashMap<String, Value>,
    ) -> Result<Value, DispatchError>;
}

/// Returns each function's configured `mock` response verbatim, or
/// `Value::Null` if none was configured. Useful for running a game end to
/// end before any real capability backend exists.
pub struct MockDispatcher {
    contract: crate::contract::CapabilityContract,
}

impl MockDispatcher {
    pub fn new(contract: crate::contract::CapabilityContract) -> Self {
        Self { contract }
    }
}

#[async_trait]
impl CapabilityDispatcher for MockDispatcher {
    async fn invoke(
        &self,
        service: &str,
        function: &str,
        _args: &HashMap<String, Value>,
    ) -> Result<Value, DispatchError> {
        Ok(self
            .contract
            .function(service, function)
            .and_then(|f| f.mock.clone())
            .unwrap_or(Value::Null))
    }
}
