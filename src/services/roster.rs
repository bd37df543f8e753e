use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::database::Database;
use crate::domain::{
    is_registration_open, InstanceStatus, ParticipantRoster, RosterEntry, TravelSlot,
};
use crate::middleware::AuthMember;
use crate::models::{Event, ParticipantRow, WorkshopInstance};

use super::ServiceError;

/// Travel details a member submits when signing up for a Working Weekend.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WwSignUpDetails {
    pub arrival: String,
    pub departure: String,
    #[serde(default)]
    pub car: bool,
    /// Free seats offered to other participants.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub seats: i32,
    #[serde(default)]
    pub vegetarian: bool,
    pub comment: Option<String>,
}

/// All roster writes go through here. Every mutation locks the parent
/// event/instance row (`FOR UPDATE`) before the roster is read, so
/// concurrent sign-ups near a capacity limit serialize instead of racing;
/// the capacity check is authoritative.
#[derive(Clone)]
pub struct RosterService {
    db: Database,
}

impl RosterService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn sign_up_for_event(
        &self,
        event_id: i64,
        member: &AuthMember,
        ww_details: Option<WwSignUpDetails>,
    ) -> Result<(), ServiceError> {
        let mut tx = self.db.pool.begin().await?;

        let event = lock_event(&mut tx, event_id)
            .await?
            .ok_or(ServiceError::EventNotFound)?;

        // Fresh wall clock on every evaluation, the window can close mid-session
        let now = Utc::now().naive_utc();
        if !is_registration_open(now, event.registration_start, event.registration_end) {
            return Err(ServiceError::RegistrationClosed);
        }

        let details = if event.event_type().is_working_weekend() {
            let details = ww_details.ok_or(ServiceError::MissingTravelDetails)?;
            // Validate the slot codes and bounds before anything is written
            details.validate()?;
            TravelSlot::parse(&details.arrival)?;
            TravelSlot::parse(&details.departure)?;
            Some(details)
        } else {
            None
        };

        let mut roster = load_event_roster(&mut tx, &event).await?;
        roster.add(RosterEntry {
            member_id: member.member_id,
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            member_status: member.member_status.clone(),
            registered_at: now,
        })?;

        sqlx::query(
            "INSERT INTO event_participants (event_id, member_id, registered_at)
             VALUES ($1, $2, $3)",
        )
        .bind(event_id)
        .bind(member.member_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(details) = details {
            sqlx::query(
                "INSERT INTO event_ww_details
                     (event_id, member_id, arrival, departure, car, seats, vegetarian, comment)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(event_id)
            .bind(member.member_id)
            .bind(&details.arrival)
            .bind(&details.departure)
            .bind(details.car)
            .bind(details.seats)
            .bind(details.vegetarian)
            .bind(&details.comment)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Removes `target_member_id` from an event roster. `self_service`
    /// marks a member removing their own registration, which is only
    /// allowed while the window is open; administrative removal (event
    /// permission or organizer, checked by the caller) is not time-bound.
    pub async fn sign_off_from_event(
        &self,
        event_id: i64,
        target_member_id: i32,
        self_service: bool,
    ) -> Result<(), ServiceError> {
        let mut tx = self.db.pool.begin().await?;

        let event = lock_event(&mut tx, event_id)
            .await?
            .ok_or(ServiceError::EventNotFound)?;

        if self_service {
            let now = Utc::now().naive_utc();
            if !is_registration_open(now, event.registration_start, event.registration_end) {
                return Err(ServiceError::RegistrationClosed);
            }
        }

        let mut roster = load_event_roster(&mut tx, &event).await?;
        roster.remove(target_member_id)?;

        // WW travel details cascade with the participant row
        sqlx::query("DELETE FROM event_participants WHERE event_id = $1 AND member_id = $2")
            .bind(event_id)
            .bind(target_member_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn sign_up_for_instance(
        &self,
        instance_id: i64,
        member: &AuthMember,
    ) -> Result<(), ServiceError> {
        let mut tx = self.db.pool.begin().await?;

        let instance = lock_instance(&mut tx, instance_id)
            .await?
            .ok_or(ServiceError::InstanceNotFound)?;

        let status =
            InstanceStatus::from_db(&instance.status).ok_or(ServiceError::InstanceNotFound)?;
        if !status.allows_self_service() {
            return Err(ServiceError::RegistrationClosed);
        }

        let now = Utc::now().naive_utc();
        let mut roster = load_instance_roster(&mut tx, &instance).await?;
        roster.add(RosterEntry {
            member_id: member.member_id,
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            member_status: member.member_status.clone(),
            registered_at: now,
        })?;

        sqlx::query(
            "INSERT INTO instance_participants (instance_id, member_id, registered_at)
             VALUES ($1, $2, $3)",
        )
        .bind(instance_id)
        .bind(member.member_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn sign_off_from_instance(
        &self,
        instance_id: i64,
        target_member_id: i32,
        self_service: bool,
    ) -> Result<(), ServiceError> {
        let mut tx = self.db.pool.begin().await?;

        let instance = lock_instance(&mut tx, instance_id)
            .await?
            .ok_or(ServiceError::InstanceNotFound)?;

        if self_service {
            let status =
                InstanceStatus::from_db(&instance.status).ok_or(ServiceError::InstanceNotFound)?;
            if !status.allows_self_service() {
                return Err(ServiceError::RegistrationClosed);
            }
        }

        let mut roster = load_instance_roster(&mut tx, &instance).await?;
        roster.remove(target_member_id)?;

        sqlx::query("DELETE FROM instance_participants WHERE instance_id = $1 AND member_id = $2")
            .bind(instance_id)
            .bind(target_member_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn lock_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: i64,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT event_id, name, description, location, start_date, end_date,
                start_time, end_time, registration_start, registration_end,
                max_participants, ww, network, jbt_goes
         FROM events WHERE event_id = $1
         FOR UPDATE",
    )
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await
}

async fn lock_instance(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    instance_id: i64,
) -> Result<Option<WorkshopInstance>, sqlx::Error> {
    sqlx::query_as::<_, WorkshopInstance>(
        "SELECT instance_id, workshop_id, date, start_time, end_time, location,
                target_audience, max_participants, status, grade
         FROM workshop_instances WHERE instance_id = $1
         FOR UPDATE",
    )
    .bind(instance_id)
    .fetch_optional(&mut **tx)
    .await
}

async fn load_event_roster(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &Event,
) -> Result<ParticipantRoster, sqlx::Error> {
    let rows = sqlx::query_as::<_, ParticipantRow>(
        "SELECT p.member_id, m.first_name, m.last_name, m.member_status, p.registered_at
         FROM event_participants p
         JOIN members m ON m.member_id = p.member_id
         WHERE p.event_id = $1
         ORDER BY p.registered_at",
    )
    .bind(event.event_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(ParticipantRoster::from_entries(
        event.max_participants.and_then(|m| u32::try_from(m).ok()),
        rows.into_iter().map(Into::into).collect(),
    ))
}

async fn load_instance_roster(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    instance: &WorkshopInstance,
) -> Result<ParticipantRoster, sqlx::Error> {
    let rows = sqlx::query_as::<_, ParticipantRow>(
        "SELECT p.member_id, m.first_name, m.last_name, m.member_status, p.registered_at
         FROM instance_participants p
         JOIN members m ON m.member_id = p.member_id
         WHERE p.instance_id = $1
         ORDER BY p.registered_at",
    )
    .bind(instance.instance_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(ParticipantRoster::from_entries(
        instance
            .max_participants
            .and_then(|m| u32::try_from(m).ok()),
        rows.into_iter().map(Into::into).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_seat_count_fails_validation() {
        let details = WwSignUpDetails {
            arrival: "FrF".into(),
            departure: "So".into(),
            car: true,
            seats: -3,
            vegetarian: false,
            comment: None,
        };
        assert!(details.validate().is_err());

        let no_seats = WwSignUpDetails { seats: 0, ..details };
        assert!(no_seats.validate().is_ok());
    }
}
