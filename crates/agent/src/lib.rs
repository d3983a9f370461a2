//! Dialogue orchestration for the two-persona museum guide.
//!
//! Each visitor turn flows through a fixed pipeline:
//! 1. **Intent classification** (`intent`) - ordered deterministic rules
//! 2. **Negotiation** (`docent_core::flows`) - consent before moving or disclosing
//! 3. **Prompt building** (`prompt`) - persona charter, inventory, bounded history
//! 4. **Completion** (`invoker`, `llm`) - one pass through the fallback chain
//! 5. **Sanitizing** (`sanitizer`) - strip markup, extract directive tags
//! 6. **Directive policy** (`guardrails`) - which directives may change session state
//!
//! `AgentRuntime` (see `runtime`) wires these together; `ConversationService`
//! (see `sessions`) keeps live sessions and serializes turns per session.
//!
//! The model only phrases replies. Room changes and disclosures are decided by the
//! negotiation and the directive policy.

pub mod guardrails;
pub mod intent;
pub mod invoker;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod sanitizer;
pub mod sessions;

pub use invoker::{CompletionInvoker, InvokerSettings};
pub use llm::{CompletionBackend, OpenAiBackend, ScriptedBackend};
pub use runtime::{AgentRuntime, PersonaReply, RuntimeSettings, TurnFailure, TurnOutcome};
pub use sessions::{ConversationError, ConversationService, StartedSession};
