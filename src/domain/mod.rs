pub mod classifier;
pub mod error;
pub mod lifecycle;
pub mod registration;
pub mod roster;

pub use classifier::{classify, EventType};
pub use error::DomainError;
pub use lifecycle::{can_submit_feedback, InstanceStatus};
pub use registration::is_registration_open;
pub use roster::{ParticipantRoster, RosterEntry, TravelSlot};
