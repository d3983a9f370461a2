pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod knowledge;

pub use domain::catalog::{ArtworkId, ArtworkRecord, RoomId, RoomRecord};
pub use domain::conversation::{BoundedHistory, ConversationTurn, Persona, Speaker};
pub use domain::session::{PendingKind, PendingSnapshot, PendingStep, SessionSnapshot, SessionState};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConsentFlow, FlowEngine, NegotiationEvent, PersonaDirective, TransitionOutcome};
pub use knowledge::{KnowledgeBase, KnowledgeError};
