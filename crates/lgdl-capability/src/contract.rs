//! The on-disk JSON contract describing what each declared service
//! exposes: argument schemas, a per-function timeout, and an optional
//! mock response for environments with no live capability backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityContract {
    pub services: HashMap<String, ServiceContract>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceContract {
    pub functions: HashMap<String, FunctionContract>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionContract {
    #[serde(default)]
    pub args: HashMap<String, ArgSchema>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub mock: Option<serde_json::Value>,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSchema {
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    Number,
    Bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("failed to read contract file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse contract file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CapabilityContract {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path_str = path.as_ref().display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|source| ContractError::Read {
            path: path_str.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ContractError::Parse {
            path: path_str,
            source,
        })
    }

    pub fn function(&self, service: &str, function: &str) -> Option<&FunctionContract> {
        self.services.get(service)?.functions.get(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_contract() {
        let json = r#"{
            "services": {
                "scheduling": {
                    "functions": {
                        "check_availability": {
                            "args": { "doctor": { "type": "string", "required": true } },
                            "timeout_seconds": 5
                        }
                    }
                }
            }
        }"#;
        let contract: CapabilityContract = serde_json::from_str(json).unwrap();
        let f = contract.function("scheduling", "check_availability").unwrap();
        assert_eq!(f.timeout_seconds, 5);
        assert!(f.args["doctor"].required);
    }
}
