//! Action handler seam
//!
//! The gate never performs side effects itself; it invokes a handler the
//! host binds tools to. Sandboxing of the handler's side effects belongs
//! to the host.

use async_trait::async_trait;

use warden_types::Action;

/// Outcome of one handler invocation
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// The tool ran and produced output
    Success(serde_json::Value),
    /// The tool ran and failed; the token is consumed regardless
    Failure(String),
}

/// The bound tool layer. Invoked exactly once per execution attempt,
/// only after every enforcement check has passed.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &Action) -> HandlerOutcome;
}

/// Handler that refuses everything; useful as a safe placeholder while
/// wiring a host
#[derive(Debug, Default, Clone, Copy)]
pub struct UnboundHandler;

#[async_trait]
impl ActionHandler for UnboundHandler {
    async fn handle(&self, action: &Action) -> HandlerOutcome {
        HandlerOutcome::Failure(format!("no handler bound for action kind '{}'", action.kind))
    }
}
