//! Turns a `Capability` action into an actual (or mocked) call to an
//! external service: an on-disk contract, a policy allowlist carried by
//! the compiled game, and a dispatcher the engine supplies.

mod contract;
mod dispatcher;
mod invoker;

pub use contract::{ArgSchema, ArgType, CapabilityContract, ContractError, FunctionContract, ServiceContract};
pub use dispatcher::{CapabilityDispatcher, DispatchError, MockDispatcher};
pub use invoker::{CapabilityInvoker, CapabilityOutcome};
