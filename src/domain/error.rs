use thiserror::Error;

use super::lifecycle::InstanceStatus;

/// Validation outcomes of the registration core. All of these are
/// caller-visible and recoverable; none of them should be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("member {0} is already on the roster")]
    DuplicateParticipant(i32),

    #[error("the roster is full ({max} participants)")]
    CapacityExceeded { max: u32 },

    #[error("member {0} is not on the roster")]
    ParticipantNotFound(i32),

    #[error("unknown travel slot code \"{0}\"")]
    UnknownSlot(String),

    #[error("cannot {action} while the workshop instance is in status \"{from}\"")]
    InvalidLifecycleTransition {
        from: InstanceStatus,
        action: &'static str,
    },

    #[error("feedback for this workshop instance was already submitted")]
    FeedbackAlreadySubmitted,

    #[error("only members marked as attended may submit feedback")]
    NotAttended,

    #[error("missing permission for this action")]
    PermissionDenied,
}
