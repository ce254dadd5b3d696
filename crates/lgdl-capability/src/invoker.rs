//! Validates a `Capability` action against the allowlist and arg schema,
//! then dispatches it - awaiting the result under a timeout, or firing it
//! off and returning immediately, per the action's own `await` flag.
//!
//! A policy denial (not on the allowlist) and a contract failure (bad
//! args, unknown function, timeout) are deliberately different error
//! codes: a denial is "this game isn't allowed to do that" and is safe to
//! surface almost verbatim, while a contract failure can carry internal
//! detail (argument names, timeout values) that should never reach an end
//! user - both still degrade to the same sanitized `user_message()`.

use crate::contract::{ArgType, CapabilityContract};
use crate::dispatcher::CapabilityDispatcher;
use lgdl_ir::Action;
use lgdl_metrics::EngineError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum CapabilityOutcome {
    Completed(Value),
    Dispatched,
}

pub struct CapabilityInvoker {
    contract: CapabilityContract,
    allowlist: HashSet<String>,
    dispatcher: Arc<dyn CapabilityDispatcher>,
}

impl CapabilityInvoker {
    pub fn new(
        contract: CapabilityContract,
        allowlist: HashSet<String>,
        dispatcher: Arc<dyn CapabilityDispatcher>,
    ) -> Self {
        Self {
            contract,
            allowlist,
            dispatcher,
        }
    }

    pub async fn invoke(
        &self,
        action: &Action,
        resolved_args: HashMap<String, Value>,
    ) -> Result<CapabilityOutcome, EngineError> {
        let Action::Capability {
            service,
            function,
            r#await,
            timeout_seconds,
            ..
        } = action
        else {
            return Err(EngineError::new(
                "E210",
                "invoker called with a non-capability action",
            ));
        };

        let qualified = format!("{service}.{function}");
        if !self.allowlist.contains(&qualified) {
            warn!(capability = %qualified, "capability denied: not on this game's allowlist");
            return Err(EngineError::new(
                "E210",
                format!("'{qualified}' is not allowed for this game"),
            ));
        }

        let contract_fn = self.contract.function(service, function).ok_or_else(|| {
            EngineError::new(
                "E211",
                format!("'{qualified}' has no entry in the capability contract"),
            )
        })?;

        self.validate_args(&qualified, &contract_fn.args, &resolved_args)?;

        let timeout = Duration::from_secs((*timeout_seconds).min(contract_fn.timeout_seconds).max(1));

        if !*r#await {
            let dispatcher = self.dispatcher.clone();
            let service = service.clone();
            let function = function.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatcher.invoke(&service, &function, &resolved_args).await {
                    warn!(capability = %format!("{service}.{function}"), error = %e, "fire-and-forget capability call failed");
                }
            });
            return Ok(CapabilityOutcome::Dispatched);
        }

        match tokio::time::timeout(
            timeout,
            self.dispatcher.invoke(service, function, &resolved_args),
        )
        .await
        {
            Ok(Ok(value)) => Ok(CapabilityOutcome::Completed(value)),
            Ok(Err(e)) => Err(EngineError::new(
                "E212",
                format!("capability '{qualified}' failed: {e}"),
            )),
            Err(_) => Err(EngineError::new(
                "E213",
                format!("capability '{qualified}' timed out after {}s", timeout.as_secs()),
            )),
        }
    }

    fn validate_args(
        &self,
        qualified: &str,
        schema: &HashMap<String, crate::contract::ArgSchema>,
        args: &HashMap<String, Value>,
    ) -> Result<(), EngineError> {
        for (name, def) in schema {
            let Some(value) = args.get(name) else {
                if def.required {
                    return Err(EngineError::new(
                        "E211",
                        format!("capability '{qualified}' is missing required arg '{name}'"),
                    ));
                }
                continue;
            };
            let type_ok = match def.arg_type {
                ArgType::String => value.is_string(),
                ArgType::Number => value.is_number(),
                ArgType::Bool => value.is_boolean(),
            };
            if !type_ok {
                return Err(EngineError::new(
                    "E211",
                    format!("capability '{qualified}' arg '{name}' has the wrong type"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ArgSchema, FunctionContract, ServiceContract};
    use crate::dispatcher::MockDispatcher;

    fn sample_contract() -> CapabilityContract {
        let mut args = HashMap::new();
        args.insert(
            "doctor".to_string(),
            ArgSchema {
                arg_type: ArgType::String,
                required: true,
            },
        );
        let mut functions = HashMap::new();
        functions.insert(
            "check_availability".to_string(),
            FunctionContract {
                args,
                timeout_seconds: 5,
                mock: Some(Value::String("ok".to_string())),
            },
        );
        let mut services = HashMap::new();
        services.insert("scheduling".to_string(), ServiceContract { functions });
        CapabilityContract { services }
    }

    fn sample_action(r#await: bool) -> Action {
        Action::Capability {
            service: "scheduling".to_string(),
            function: "check_availability".to_string(),
            r#await,
            timeout_seconds: 5,
            arg_bindings: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn denies_capability_not_on_allowlist() {
        let invoker = CapabilityInvoker::new(
            sample_contract(),
            HashSet::new(),
            Arc::new(MockDispatcher::new(sample_contract())),
        );
        let mut args = HashMap::new();
        args.insert("doctor".to_string(), Value::String("Smith".to_string()));
        let err = invoker
            .invoke(&sample_action(true), args)
            .await
            .unwrap_err();
        assert_eq!(err.code, "E210");
    }

    #[tokio::test]
    async fn rejects_missing_required_arg() {
        let mut allowlist = HashSet::new();
        allowlist.insert("scheduling.check_availability".to_string());
        let invoker = CapabilityInvoker::new(
            sample_contract(),
            allowlist,
            Arc::new(MockDispatcher::new(sample_contract())),
        );
        let err = invoker
            .invoke(&sample_action(true), HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "E211");
    }

    #[tokio::test]
    async fn awaited_call_returns_the_mock_response() {
        let mut allowlist = HashSet::new();
        allowlist.insert("scheduling.check_availability".to_string());
        let invoker = CapabilityInvoker::new(
            sample_contract(),
            allowlist,
            Arc::new(MockDispatcher::new(sample_contract())),
        );
        let mut args = HashMap::new();
        args.insert("doctor".to_string(), Value::String("Smith".to_string()));
        let outcome = invoker.invoke(&sample_action(true), args).await.unwrap();
        assert!(matches!(outcome, CapabilityOutcome::Completed(Value::String(s)) if s == "ok"));
    }

    #[tokio::test]
    async fn fire_and_forget_call_returns_immediately() {
        let mut allowlist = HashSet::new();
        allowlist.insert("scheduling.check_availability".to_string());
        let invoker = CapabilityInvoker::new(
            sample_contract(),
            allowlist,
            Arc::new(MockDispatcher::new(sample_contract())),
        );
        let mut args = HashMap::new();
        args.insert("doctor".to_string(), Value::String("Smith".to_string()));
        let outcome = invoker.invoke(&sample_action(false), args).await.unwrap();
        assert!(matches!(outcome, CapabilityOutcome::Dispatched));
    }
}
