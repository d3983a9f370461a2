pub mod engine;
pub mod states;

pub use engine::{ConsentFlow, FlowDefinition, FlowEngine, FlowTransitionError, DEFAULT_MAX_REASKS};
pub use states::{NegotiationEvent, PersonaDirective, TransitionOutcome};
