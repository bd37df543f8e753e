use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// One sign-up on an event or workshop instance roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub member_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub member_status: String,
    pub registered_at: NaiveDateTime,
}

/// In-memory roster of an event or workshop instance, ordered by
/// registration timestamp ascending (ties keep insertion order).
///
/// The roster only validates its own invariants: uniqueness per member and
/// the capacity limit. Who is allowed to mutate it is the caller's problem;
/// see the permission checks in the controllers.
#[derive(Debug, Clone)]
pub struct ParticipantRoster {
    max_participants: Option<u32>,
    entries: Vec<RosterEntry>,
}

impl ParticipantRoster {
    pub fn new(max_participants: Option<u32>) -> Self {
        Self {
            max_participants,
            entries: Vec::new(),
        }
    }

    /// Builds a roster from stored rows. Rows are re-sorted by registration
    /// timestamp; the sort is stable so ties keep the order they came in.
    pub fn from_entries(max_participants: Option<u32>, mut entries: Vec<RosterEntry>) -> Self {
        entries.sort_by_key(|e| e.registered_at);
        Self {
            max_participants,
            entries,
        }
    }

    pub fn add(&mut self, entry: RosterEntry) -> Result<(), DomainError> {
        if self.is_signed_up(entry.member_id) {
            return Err(DomainError::DuplicateParticipant(entry.member_id));
        }
        if let Some(max) = self.max_participants {
            if self.entries.len() as u32 >= max {
                return Err(DomainError::CapacityExceeded { max });
            }
        }
        self.entries.push(entry);
        self.entries.sort_by_key(|e| e.registered_at);
        Ok(())
    }

    pub fn remove(&mut self, member_id: i32) -> Result<RosterEntry, DomainError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.member_id == member_id)
            .ok_or(DomainError::ParticipantNotFound(member_id))?;
        Ok(self.entries.remove(pos))
    }

    pub fn is_signed_up(&self, member_id: i32) -> bool {
        self.entries.iter().any(|e| e.member_id == member_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }
}

/// Arrival/departure slot of a Working Weekend participant.
///
/// The wire codes are the historical ones from the member database. `SaF`
/// reads differently depending on direction: arriving members join for
/// breakfast, departing members leave during the morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelSlot {
    FriEarly,
    FriMidday,
    FriEvening,
    SatMorning,
    SatMidday,
    SatEvening,
    Sunday,
}

impl TravelSlot {
    pub fn parse(code: &str) -> Result<Self, DomainError> {
        match code {
            "FrF" => Ok(Self::FriEarly),
            "FrM" => Ok(Self::FriMidday),
            "FrA" => Ok(Self::FriEvening),
            "SaF" => Ok(Self::SatMorning),
            "SaM" => Ok(Self::SatMidday),
            "SaA" => Ok(Self::SatEvening),
            "So" => Ok(Self::Sunday),
            other => Err(DomainError::UnknownSlot(other.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::FriEarly => "FrF",
            Self::FriMidday => "FrM",
            Self::FriEvening => "FrA",
            Self::SatMorning => "SaF",
            Self::SatMidday => "SaM",
            Self::SatEvening => "SaA",
            Self::Sunday => "So",
        }
    }

    pub fn arrival_label(self) -> &'static str {
        match self {
            Self::SatMorning => "Sat morning/breakfast",
            other => other.common_label(),
        }
    }

    pub fn departure_label(self) -> &'static str {
        match self {
            Self::SatMorning => "Sat morning",
            other => other.common_label(),
        }
    }

    fn common_label(self) -> &'static str {
        match self {
            Self::FriEarly => "Fri early",
            Self::FriMidday => "Fri midday",
            Self::FriEvening => "Fri evening",
            Self::SatMorning => "Sat morning",
            Self::SatMidday => "Sat midday",
            Self::SatEvening => "Sat evening",
            Self::Sunday => "Sunday",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(member_id: i32, day: u32) -> RosterEntry {
        RosterEntry {
            member_id,
            first_name: "Test".into(),
            last_name: format!("Member{member_id}"),
            member_status: "aktiv".into(),
            registered_at: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn add_rejects_duplicates_and_leaves_roster_unchanged() {
        let mut roster = ParticipantRoster::new(None);
        roster.add(entry(42, 1)).unwrap();
        let before = roster.len();
        assert_eq!(
            roster.add(entry(42, 2)),
            Err(DomainError::DuplicateParticipant(42))
        );
        assert_eq!(roster.len(), before);
    }

    #[test]
    fn add_enforces_capacity() {
        let mut roster = ParticipantRoster::new(Some(2));
        roster.add(entry(1, 1)).unwrap();
        roster.add(entry(2, 2)).unwrap();
        assert_eq!(
            roster.add(entry(3, 3)),
            Err(DomainError::CapacityExceeded { max: 2 })
        );
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn remove_of_absent_member_is_an_error_not_a_mutation() {
        let mut roster = ParticipantRoster::new(None);
        roster.add(entry(1, 1)).unwrap();
        assert_eq!(
            roster.remove(99),
            Err(DomainError::ParticipantNotFound(99))
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn entries_are_ordered_by_registration_time() {
        let roster = ParticipantRoster::from_entries(
            None,
            vec![entry(3, 9), entry(1, 2), entry(2, 5)],
        );
        let ids: Vec<i32> = roster.entries().iter().map(|e| e.member_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut a = entry(10, 1);
        let mut b = entry(20, 1);
        a.registered_at = b.registered_at;
        let roster = ParticipantRoster::from_entries(None, vec![a, b]);
        let ids: Vec<i32> = roster.entries().iter().map(|e| e.member_id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn saf_maps_per_direction() {
        let slot = TravelSlot::parse("SaF").unwrap();
        assert_eq!(slot.arrival_label(), "Sat morning/breakfast");
        assert_eq!(slot.departure_label(), "Sat morning");
    }

    #[test]
    fn unknown_code_is_an_error() {
        assert_eq!(
            TravelSlot::parse("Mo"),
            Err(DomainError::UnknownSlot("Mo".to_string()))
        );
    }

    #[test]
    fn codes_round_trip() {
        for code in ["FrF", "FrM", "FrA", "SaF", "SaM", "SaA", "So"] {
            assert_eq!(TravelSlot::parse(code).unwrap().code(), code);
        }
    }
}
