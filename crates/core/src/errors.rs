use thiserror::Error;

use crate::domain::session::PendingKind;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(
        "malformed session state: step {step:?} with pending room present={has_room}, pending artwork present={has_artwork}"
    )]
    MalformedState { step: PendingKind, has_room: bool, has_artwork: bool },
    #[error("unknown artwork `{0}`")]
    UnknownArtwork(String),
    #[error("unknown room `{0}`")]
    UnknownRoom(String),
    #[error("pending room `{room}` does not hold artwork `{artwork}`")]
    PendingRoomMismatch { room: String, artwork: String },
    #[error("catalog invariant violation: {0}")]
    CatalogInvariant(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("completion service failed after every fallback attempt (status {status:?}): {message}")]
    CompletionServiceFailure { status: Option<u16>, message: String },
    #[error("required credential is missing: {0}")]
    ConfigMissing(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "That conversation has ended or never existed.",
            Self::UpstreamUnavailable { .. } => {
                "Sorry, I couldn't reach the guide service just now. Please try again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::UpstreamUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::UpstreamUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::MalformedState { .. })
            | ApplicationError::Domain(DomainError::UnknownArtwork(_))
            | ApplicationError::Domain(DomainError::UnknownRoom(_))
            | ApplicationError::Domain(DomainError::PendingRoomMismatch { .. }) => Self::BadRequest {
                message: "conversation state validation failed".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Domain(DomainError::CatalogInvariant(message))
            | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::CompletionServiceFailure { message, .. }
            | ApplicationError::ConfigMissing(message) => {
                Self::UpstreamUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::session::PendingKind;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn malformed_state_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::MalformedState {
            step: PendingKind::Idle,
            has_room: true,
            has_artwork: false,
        })
        .into_interface("turn-1");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(interface.correlation_id(), "turn-1");
    }

    #[test]
    fn completion_failure_maps_to_upstream_unavailable_with_apology() {
        let interface = ApplicationError::CompletionServiceFailure {
            status: Some(503),
            message: "overloaded".to_owned(),
        }
        .into_interface("turn-2");

        assert!(matches!(interface, InterfaceError::UpstreamUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "Sorry, I couldn't reach the guide service just now. Please try again."
        );
    }

    #[test]
    fn missing_credential_degrades_instead_of_internal_error() {
        let interface =
            ApplicationError::ConfigMissing("completion.api_key".to_owned()).into_interface("t3");
        assert!(matches!(interface, InterfaceError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad catalog path".to_owned()).into_interface("t4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
