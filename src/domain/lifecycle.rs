use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Lifecycle status of a scheduled workshop instance.
///
/// The progression is linear and monotone; there is no way back. Attempting
/// a transition out of order is a caller error and is rejected before any
/// state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    RegistrationOpen,
    RegistrationClosed,
    FeedbackPending,
    Completed,
}

impl InstanceStatus {
    /// Organizer closes admission, fixing the attendee selection.
    pub fn close_admission(self) -> Result<Self, DomainError> {
        match self {
            Self::RegistrationOpen => Ok(Self::RegistrationClosed),
            from => Err(DomainError::InvalidLifecycleTransition {
                from,
                action: "close admission",
            }),
        }
    }

    /// Organizer records who actually showed up.
    pub fn record_attendance(self) -> Result<Self, DomainError> {
        match self {
            Self::RegistrationClosed => Ok(Self::FeedbackPending),
            from => Err(DomainError::InvalidLifecycleTransition {
                from,
                action: "record attendance",
            }),
        }
    }

    /// Instance is done, either because every attendee submitted feedback
    /// or because an organizer advanced it manually.
    pub fn complete(self) -> Result<Self, DomainError> {
        match self {
            Self::FeedbackPending => Ok(Self::Completed),
            from => Err(DomainError::InvalidLifecycleTransition {
                from,
                action: "complete",
            }),
        }
    }

    /// Self-service sign-up/sign-off is only possible while admission runs.
    pub fn allows_self_service(self) -> bool {
        self == Self::RegistrationOpen
    }

    /// Feedback summaries become visible once attendance was recorded.
    pub fn feedback_visible(self) -> bool {
        matches!(self, Self::FeedbackPending | Self::Completed)
    }

    pub fn as_db(self) -> &'static str {
        match self {
            Self::RegistrationOpen => "registration_open",
            Self::RegistrationClosed => "registration_closed",
            Self::FeedbackPending => "feedback_pending",
            Self::Completed => "completed",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "registration_open" => Some(Self::RegistrationOpen),
            "registration_closed" => Some(Self::RegistrationClosed),
            "feedback_pending" => Some(Self::FeedbackPending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Precondition for showing the feedback form to a member: they must have
/// attended and must not have submitted yet. Both flags live outside the
/// state machine (attendance table, feedback table).
pub fn can_submit_feedback(
    status: InstanceStatus,
    attended: bool,
    already_submitted: bool,
) -> Result<(), DomainError> {
    if !status.feedback_visible() {
        return Err(DomainError::InvalidLifecycleTransition {
            from: status,
            action: "submit feedback",
        });
    }
    if !attended {
        return Err(DomainError::NotAttended);
    }
    if already_submitted {
        return Err(DomainError::FeedbackAlreadySubmitted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let s = InstanceStatus::RegistrationOpen;
        let s = s.close_admission().unwrap();
        assert_eq!(s, InstanceStatus::RegistrationClosed);
        let s = s.record_attendance().unwrap();
        assert_eq!(s, InstanceStatus::FeedbackPending);
        let s = s.complete().unwrap();
        assert_eq!(s, InstanceStatus::Completed);
    }

    #[test]
    fn closing_twice_fails_and_keeps_state() {
        let closed = InstanceStatus::RegistrationOpen.close_admission().unwrap();
        assert_eq!(
            closed.close_admission(),
            Err(DomainError::InvalidLifecycleTransition {
                from: InstanceStatus::RegistrationClosed,
                action: "close admission",
            })
        );
        assert_eq!(closed, InstanceStatus::RegistrationClosed);
    }

    #[test]
    fn no_transition_backward_or_skipping() {
        assert!(InstanceStatus::RegistrationOpen.record_attendance().is_err());
        assert!(InstanceStatus::RegistrationOpen.complete().is_err());
        assert!(InstanceStatus::Completed.close_admission().is_err());
        assert!(InstanceStatus::Completed.complete().is_err());
    }

    #[test]
    fn self_service_only_while_registration_open() {
        assert!(InstanceStatus::RegistrationOpen.allows_self_service());
        assert!(!InstanceStatus::RegistrationClosed.allows_self_service());
        assert!(!InstanceStatus::FeedbackPending.allows_self_service());
        assert!(!InstanceStatus::Completed.allows_self_service());
    }

    #[test]
    fn feedback_eligibility_scenario() {
        // attended and not yet submitted: allowed
        assert!(can_submit_feedback(InstanceStatus::FeedbackPending, true, false).is_ok());
        // second attempt after submitting: rejected
        assert_eq!(
            can_submit_feedback(InstanceStatus::FeedbackPending, true, true),
            Err(DomainError::FeedbackAlreadySubmitted)
        );
        // never attended: rejected
        assert_eq!(
            can_submit_feedback(InstanceStatus::Completed, false, false),
            Err(DomainError::NotAttended)
        );
        // admission still running: rejected
        assert!(can_submit_feedback(InstanceStatus::RegistrationOpen, true, false).is_err());
    }

    #[test]
    fn db_strings_round_trip() {
        for status in [
            InstanceStatus::RegistrationOpen,
            InstanceStatus::RegistrationClosed,
            InstanceStatus::FeedbackPending,
            InstanceStatus::Completed,
        ] {
            assert_eq!(InstanceStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(InstanceStatus::from_db("cancelled"), None);
    }
}
