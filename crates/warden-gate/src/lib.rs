//! Warden Gate - The mandatory enforcement boundary
//!
//! Composes the policy engine, authority manager, provenance gating,
//! escalation resolver and runtime state machine into the single path by
//! which an agent action may execute. No tool invocation may occur
//! through any path that bypasses [`EnforcementGate::execute`].

pub mod gate;
pub mod handler;
pub mod orchestrator;
pub mod result;

pub use gate::EnforcementGate;
pub use handler::{ActionHandler, HandlerOutcome, UnboundHandler};
pub use orchestrator::{OrchestratorConfig, RuntimeOrchestrator};
pub use result::ExecutionResult;
