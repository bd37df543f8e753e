pub mod roster;

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::DomainError;

/// Everything a roster or lifecycle operation can fail with: domain
/// validation outcomes plus the opaque infrastructure failures underneath.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("event not found")]
    EventNotFound,

    #[error("workshop instance not found")]
    InstanceNotFound,

    #[error("the registration window is not open")]
    RegistrationClosed,

    #[error("working weekend sign-up requires arrival and departure details")]
    MissingTravelDetails,

    #[error("invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("unknown feedback question {0}")]
    UnknownQuestion(i32),

    #[error("question {0} takes a free-text answer, not a grade")]
    GradeOnTextQuestion(i32),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EventNotFound | Self::InstanceNotFound => StatusCode::NOT_FOUND,
            Self::RegistrationClosed => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingTravelDetails
            | Self::UnknownQuestion(_)
            | Self::GradeOnTextQuestion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Domain(e) => match e {
                DomainError::DuplicateParticipant(_)
                | DomainError::CapacityExceeded { .. }
                | DomainError::InvalidLifecycleTransition { .. }
                | DomainError::FeedbackAlreadySubmitted => StatusCode::CONFLICT,
                DomainError::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
                DomainError::UnknownSlot(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::NotAttended | DomainError::PermissionDenied => StatusCode::FORBIDDEN,
            },
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
