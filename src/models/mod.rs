pub mod event;
pub mod feedback;
pub mod member;
pub mod participant;
pub mod workshop;

pub use event::Event;
pub use feedback::{FeedbackQuestion, QuestionAverage, TextAnswer};
pub use member::{Member, MemberField};
pub use participant::{ParticipantRow, WwParticipantRow};
pub use workshop::{Workshop, WorkshopInstance};
