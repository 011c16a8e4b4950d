//! Session error taxonomy

/// Every reason a session operation can be refused.
///
/// The `Display` text is what the caller sees in the `details` field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Malformed or missing request fields
    #[error("{0}")]
    InvalidInput(String),

    #[error("Player {0} already registered")]
    DuplicateName(String),

    #[error("Server is full")]
    SessionFull,

    #[error("Player not registered")]
    UnknownIdentity,

    #[error("Player already connected")]
    AlreadyConnected,

    #[error("GameId is unknown")]
    UnknownSession,

    #[error("PlayerId is unknown")]
    UnknownParticipant,

    #[error("Player should wait for its turn to fire.")]
    NotYourTurn,

    #[error("The angle should be within 0-360 degrees")]
    AngleOutOfRange,

    #[error("The velocity should be positive")]
    InvalidVelocity,

    /// Reported outcomes are refused while the server referees
    #[error("Outcome is decided by the server")]
    OutcomeNotAccepted,

    /// The session manager task is no longer running
    #[error("Session service unavailable")]
    Unavailable,
}

impl SessionError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidInput(detail.into())
    }

    /// Stable machine-readable code, used as a log field
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::DuplicateName(_) => "duplicate_name",
            Self::SessionFull => "session_full",
            Self::UnknownIdentity => "unknown_identity",
            Self::AlreadyConnected => "already_connected",
            Self::UnknownSession => "unknown_session",
            Self::UnknownParticipant => "unknown_participant",
            Self::NotYourTurn => "not_your_turn",
            Self::AngleOutOfRange => "angle_out_of_range",
            Self::InvalidVelocity => "invalid_velocity",
            Self::OutcomeNotAccepted => "outcome_not_accepted",
            Self::Unavailable => "unavailable",
        }
    }
}
