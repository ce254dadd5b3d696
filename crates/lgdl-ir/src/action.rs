//! Action compilation, including capability-allowlist and clarify-options
//! validation.

use crate::ir::Action;
use lgdl_ast::ActionAst;
use lgdl_metrics::EngineError;
use std::collections::HashMap as StdHashMap;

pub type ServiceCatalog = StdHashMap<String, Vec<String>>;

/// Default capability timeout when a `Capability` action doesn't specify
/// one. The compiler falls back to a conservative 30s since the contract
/// is not yet loaded at compile time; the invoker, which does see the
/// contract, may use a tighter value.
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

pub fn compile_action(
    action: &ActionAst,
    services: &ServiceCatalog,
    move_id: &str,
) -> Result<(Action, Option<String>), EngineError> {
    match action {
        ActionAst::Respond { template } => Ok((
            Action::Respond {
                template: template.clone(),
            },
            None,
        )),
        ActionAst::OfferChoices { list } => Ok((Action::OfferChoices { list: list.clone() }, None)),
        ActionAst::Clarify { prompt, options } => {
            if options.is_empty() {
                return Err(EngineError::new(
                    "E104",
                    format!("move '{move_id}': clarify action has no options"),
                )
                .with_location(format!("moves.{move_id}.blocks[].clarify")));
            }
            Ok((
                Action::Clarify {
                    prompt: prompt.clone(),
                    options: options.clone(),
                },
                None,
            ))
        }
        ActionAst::Capability {
            service,
            function,
            r#await,
            timeout_seconds,
            arg_bindings,
        } => {
            let functions = services.get(service).ok_or_else(|| {
                EngineError::new(
                    "E105",
                    format!(
                        "move '{move_id}': capability '{service}.{function}' references an undeclared service '{service}'"
                    ),
                )
                .with_location(format!("moves.{move_id}.blocks[].capability"))
            })?;
            if !functions.iter().any(|f| f == function) {
                return Err(EngineError::new(
                    "E105",
                    format!(
                        "move '{move_id}': capability '{service}.{function}' is not declared on service '{service}'"
                    ),
                )
                .with_location(format!("moves.{move_id}.blocks[].capability")));
            }
            let qualified = format!("{service}.{function}");
            Ok((
                Action::Capability {
                    service: service.clone(),
                    function: function.clone(),
                    r#await: *r#await,
                    timeout_seconds: timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
                    arg_bindings: arg_bindings.clone(),
                },
                Some(qualified),
            ))
        }
        ActionAst::Escalate { target } => Ok((
            Action::Escalate {
                target: target.clone(),
            },
            None,
        )),
    }
}
