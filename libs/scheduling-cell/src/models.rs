// libs/scheduling-cell/src/models.rs
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// A start time plus a duration, with a derived end time. Value type: two
/// slots with the same fields are the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_date_time: NaiveDateTime,
    pub duration_minutes: i32,
}

impl TimeSlot {
    pub const MAX_DURATION_MINUTES: i32 = 1440;

    pub fn new(
        start_date_time: NaiveDateTime,
        duration_minutes: i32,
    ) -> Result<Self, SchedulingError> {
        if duration_minutes <= 0 || duration_minutes > Self::MAX_DURATION_MINUTES {
            return Err(SchedulingError::InvalidDuration(duration_minutes));
        }
        start_date_time
            .checked_add_signed(Duration::minutes(duration_minutes as i64))
            .ok_or_else(|| {
                SchedulingError::ValidationError(
                    "start_date_time is out of the supported date range".to_string(),
                )
            })?;
        Ok(Self {
            start_date_time,
            duration_minutes,
        })
    }

    /// Slots built through `new` always have a representable end; extreme
    /// values arriving through deserialization clamp at the calendar limit
    /// instead of panicking.
    pub fn end_date_time(&self) -> NaiveDateTime {
        self.start_date_time
            .checked_add_signed(Duration::minutes(self.duration_minutes as i64))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Half-open interval test: two slots overlap iff
    /// `start1 < end2 AND start2 < end1`. Slots that only touch at an
    /// endpoint (10:00-11:00 and 11:00-12:00) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start_date_time < other.end_date_time()
            && other.start_date_time < self.end_date_time()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Available,
    Booked,
    Cancelled,
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityStatus::Available => write!(f, "AVAILABLE"),
            AvailabilityStatus::Booked => write!(f, "BOOKED"),
            AvailabilityStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    NoShow,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::NoShow => write!(f, "NO_SHOW"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A doctor-published bookable slot. Never hard-deleted: cancellation leaves
/// the row in place so historical appointments keep a valid reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    #[serde(rename = "availability_id")]
    pub id: Uuid,
    pub doctor_id: String,
    pub facility_id: String,
    pub service_type_id: String,
    #[serde(flatten)]
    pub time_slot: TimeSlot,
    pub status: AvailabilityStatus,
}

impl Availability {
    pub fn create(
        doctor_id: &str,
        facility_id: &str,
        service_type_id: &str,
        time_slot: TimeSlot,
    ) -> Result<Self, SchedulingError> {
        // Re-validate the slot: deserialized requests bypass TimeSlot::new.
        let time_slot = TimeSlot::new(time_slot.start_date_time, time_slot.duration_minutes)?;

        Ok(Self {
            id: Uuid::new_v4(),
            doctor_id: validate_identifier("doctor_id", doctor_id)?,
            facility_id: validate_identifier("facility_id", facility_id)?,
            service_type_id: validate_identifier("service_type_id", service_type_id)?,
            time_slot,
            status: AvailabilityStatus::Available,
        })
    }

    pub fn book(self) -> Result<Self, SchedulingError> {
        self.status.ensure_transition(AvailabilityStatus::Booked)?;
        Ok(Self {
            status: AvailabilityStatus::Booked,
            ..self
        })
    }

    /// A booked slot cannot be cancelled directly; it must be freed through
    /// the owning appointment's cancellation.
    pub fn cancel(self) -> Result<Self, SchedulingError> {
        self.status.ensure_transition(AvailabilityStatus::Cancelled)?;
        Ok(Self {
            status: AvailabilityStatus::Cancelled,
            ..self
        })
    }

    /// Partial update: unspecified fields keep their prior values. Allowed
    /// only while the slot is still AVAILABLE.
    pub fn update(
        self,
        facility_id: Option<String>,
        service_type_id: Option<String>,
        time_slot: Option<TimeSlot>,
    ) -> Result<Self, SchedulingError> {
        if self.status != AvailabilityStatus::Available {
            return Err(SchedulingError::InvalidAvailabilityTransition(self.status));
        }

        let time_slot = match time_slot {
            Some(slot) => TimeSlot::new(slot.start_date_time, slot.duration_minutes)?,
            None => self.time_slot.clone(),
        };

        Ok(Self {
            facility_id: match facility_id {
                Some(value) => validate_identifier("facility_id", &value)?,
                None => self.facility_id,
            },
            service_type_id: match service_type_id {
                Some(value) => validate_identifier("service_type_id", &value)?,
                None => self.service_type_id,
            },
            time_slot,
            ..self
        })
    }
}

/// A patient's booking against one availability. Holds the reference by id
/// only; the repository and booking service keep the pair consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "appointment_id")]
    pub id: Uuid,
    pub patient_id: String,
    pub availability_id: Uuid,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    pub fn schedule(patient_id: &str, availability_id: Uuid) -> Result<Self, SchedulingError> {
        let now = Utc::now().naive_utc();
        Ok(Self {
            id: Uuid::new_v4(),
            patient_id: validate_identifier("patient_id", patient_id)?,
            availability_id,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        })
    }

    fn transition(self, next: AppointmentStatus) -> Result<Self, SchedulingError> {
        self.status.ensure_transition(next)?;
        Ok(Self {
            status: next,
            updated_at: Utc::now().naive_utc(),
            ..self
        })
    }

    pub fn complete(self) -> Result<Self, SchedulingError> {
        self.transition(AppointmentStatus::Completed)
    }

    pub fn mark_no_show(self) -> Result<Self, SchedulingError> {
        self.transition(AppointmentStatus::NoShow)
    }

    pub fn cancel(self) -> Result<Self, SchedulingError> {
        self.transition(AppointmentStatus::Cancelled)
    }

    /// Pure data update: swapping the slot reference. The protocol of booking
    /// the new slot and releasing the old one lives in the booking service.
    pub fn reschedule(self, new_availability_id: Uuid) -> Result<Self, SchedulingError> {
        if self.status != AppointmentStatus::Scheduled {
            return Err(SchedulingError::InvalidAppointmentTransition(self.status));
        }
        Ok(Self {
            availability_id: new_availability_id,
            updated_at: Utc::now().naive_utc(),
            ..self
        })
    }
}

/// Doctor, facility, service-type and patient ids are opaque strings owned by
/// the master-data services: non-blank, at most 50 characters.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<String, SchedulingError> {
    if value.trim().is_empty() {
        return Err(SchedulingError::ValidationError(format!(
            "{} cannot be blank",
            field
        )));
    }
    if value.len() > 50 {
        return Err(SchedulingError::ValidationError(format!(
            "{} cannot exceed 50 characters",
            field
        )));
    }
    Ok(value.to_string())
}

// ==============================================================================
// REQUEST/FILTER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub doctor_id: String,
    pub facility_id: String,
    pub service_type_id: String,
    pub time_slot: TimeSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub facility_id: Option<String>,
    pub service_type_id: Option<String>,
    pub time_slot: Option<TimeSlot>,
}

/// Optional, AND-combined filters.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityFilters {
    pub doctor_id: Option<String>,
    pub facility_id: Option<String>,
    pub service_type_id: Option<String>,
    pub status: Option<AvailabilityStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilters {
    pub patient_id: Option<String>,
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid slot duration: {0} minutes (must be between 1 and 1440)")]
    InvalidDuration(i32),

    #[error("Availability not found")]
    AvailabilityNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Availability cannot be modified in current status: {0}")]
    InvalidAvailabilityTransition(AvailabilityStatus),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidAppointmentTransition(AppointmentStatus),

    /// Lost the booking race (or the slot left AVAILABLE since it was read).
    /// Retry with a different slot, not with the same id.
    #[error("Availability is no longer available")]
    SlotUnavailable,

    #[error("The doctor already has an availability that overlaps with the requested time slot")]
    OverlapDetected,

    #[error("Storage error: {0}")]
    RepositoryFailure(String),

    /// The booked/released pair could not be restored after a partial
    /// failure; the availability named here needs manual reconciliation.
    #[error("Failed to compensate availability {availability_id}: {reason}")]
    CompensationFailed {
        availability_id: Uuid,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn slot(hour: u32, minute: u32, duration: i32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2026, 1, 10)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
            duration,
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_positive_and_oversized_durations() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        assert_eq!(
            TimeSlot::new(start, 0),
            Err(SchedulingError::InvalidDuration(0))
        );
        assert_eq!(
            TimeSlot::new(start, -15),
            Err(SchedulingError::InvalidDuration(-15))
        );
        assert_eq!(
            TimeSlot::new(start, 1441),
            Err(SchedulingError::InvalidDuration(1441))
        );
        assert!(TimeSlot::new(start, 1440).is_ok());
    }

    #[test]
    fn start_dates_at_the_calendar_limit_are_rejected() {
        let result = TimeSlot::new(NaiveDateTime::MAX, 30);
        assert!(matches!(result, Err(SchedulingError::ValidationError(_))));
    }

    #[test]
    fn extreme_deserialized_slots_clamp_instead_of_panicking() {
        // Bypasses `new`, as wire data does.
        let extreme = TimeSlot {
            start_date_time: NaiveDateTime::MAX,
            duration_minutes: 30,
        };
        assert_eq!(extreme.end_date_time(), NaiveDateTime::MAX);
        assert!(!slot(9, 0, 30).overlaps(&extreme));
    }

    #[test]
    fn end_time_is_start_plus_duration() {
        let ts = slot(9, 0, 30);
        assert_eq!(
            ts.end_date_time(),
            NaiveDate::from_ymd_opt(2026, 1, 10)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = slot(9, 0, 30);
        let b = slot(9, 15, 30);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = slot(10, 0, 30);
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn touching_endpoints_do_not_overlap() {
        let morning = slot(10, 0, 60);
        let next = slot(11, 0, 60);
        assert!(!morning.overlaps(&next));
        assert!(!next.overlaps(&morning));
    }

    #[test]
    fn containment_counts_as_overlap() {
        let long = slot(9, 0, 120);
        let inner = slot(9, 30, 30);
        assert!(long.overlaps(&inner));
        assert!(inner.overlaps(&long));
    }

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("doctor_id", "doc-1").is_ok());
        assert!(validate_identifier("doctor_id", "").is_err());
        assert!(validate_identifier("doctor_id", "   ").is_err());
        assert!(validate_identifier("doctor_id", &"x".repeat(51)).is_err());
        assert!(validate_identifier("doctor_id", &"x".repeat(50)).is_ok());
    }

    #[test]
    fn availability_lifecycle_through_entity_methods() {
        let published =
            Availability::create("doc-1", "fac-1", "svc-1", slot(9, 0, 30)).unwrap();
        assert_eq!(published.status, AvailabilityStatus::Available);

        let booked = published.book().unwrap();
        assert_eq!(booked.status, AvailabilityStatus::Booked);
        assert_eq!(
            booked.clone().book(),
            Err(SchedulingError::InvalidAvailabilityTransition(
                AvailabilityStatus::Booked
            ))
        );
        assert_eq!(
            booked.cancel(),
            Err(SchedulingError::InvalidAvailabilityTransition(
                AvailabilityStatus::Booked
            ))
        );
    }

    #[test]
    fn statuses_serialize_as_uppercase_names() {
        assert_eq!(
            serde_json::to_string(&AvailabilityStatus::Available).unwrap(),
            "\"AVAILABLE\""
        );
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::NoShow).unwrap(),
            "\"NO_SHOW\""
        );
    }

    #[test]
    fn availability_row_layout_is_flat() {
        let availability =
            Availability::create("doc-1", "fac-1", "svc-1", slot(9, 0, 30)).unwrap();
        let row = serde_json::to_value(&availability).unwrap();

        assert!(row.get("availability_id").is_some());
        assert!(row.get("start_date_time").is_some());
        assert!(row.get("duration_minutes").is_some());
        assert!(row.get("time_slot").is_none());
        assert_eq!(row["status"], "AVAILABLE");

        let back: Availability = serde_json::from_value(row).unwrap();
        assert_eq!(back, availability);
    }

    #[test]
    fn appointment_round_trip_is_lossless() {
        let appointment = Appointment::schedule("patient-1", Uuid::new_v4()).unwrap();
        let row = serde_json::to_value(&appointment).unwrap();
        assert!(row.get("appointment_id").is_some());
        assert_eq!(row["status"], "SCHEDULED");

        let back: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(back, appointment);
    }
}
