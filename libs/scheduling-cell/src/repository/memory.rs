// libs/scheduling-cell/src/repository/memory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilters, Availability, AvailabilityFilters, AvailabilityStatus,
    SchedulingError, TimeSlot,
};
use crate::repository::{AppointmentRepository, AvailabilityRepository};

/// In-process store backing both repositories. The write lock taken in
/// `transition_status` makes the status check-and-set linearizable: of N
/// tasks racing to book one availability, exactly one observes the expected
/// status.
#[derive(Default)]
pub struct InMemoryScheduleStore {
    availabilities: Arc<RwLock<HashMap<Uuid, Availability>>>,
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryScheduleStore {
    async fn save(&self, availability: &Availability) -> Result<Availability, SchedulingError> {
        let mut slots = self.availabilities.write().await;
        slots.insert(availability.id, availability.clone());
        debug!("Availability {} saved", availability.id);
        Ok(availability.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Availability>, SchedulingError> {
        let slots = self.availabilities.read().await;
        Ok(slots.get(&id).cloned())
    }

    async fn find_by_filters(
        &self,
        filters: &AvailabilityFilters,
    ) -> Result<Vec<Availability>, SchedulingError> {
        let slots = self.availabilities.read().await;

        let mut matches: Vec<Availability> = slots
            .values()
            .filter(|a| {
                filters
                    .doctor_id
                    .as_ref()
                    .map_or(true, |d| &a.doctor_id == d)
                    && filters
                        .facility_id
                        .as_ref()
                        .map_or(true, |f| &a.facility_id == f)
                    && filters
                        .service_type_id
                        .as_ref()
                        .map_or(true, |s| &a.service_type_id == s)
                    && filters.status.map_or(true, |st| a.status == st)
            })
            .cloned()
            .collect();

        // Stable iteration order regardless of map internals.
        matches.sort_by(|a, b| {
            a.time_slot
                .start_date_time
                .cmp(&b.time_slot.start_date_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matches)
    }

    async fn update(
        &self,
        availability: &Availability,
    ) -> Result<Option<Availability>, SchedulingError> {
        let mut slots = self.availabilities.write().await;
        if !slots.contains_key(&availability.id) {
            return Ok(None);
        }
        slots.insert(availability.id, availability.clone());
        Ok(Some(availability.clone()))
    }

    async fn check_overlap(
        &self,
        doctor_id: &str,
        time_slot: &TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, SchedulingError> {
        let slots = self.availabilities.read().await;

        Ok(slots.values().any(|a| {
            a.doctor_id == doctor_id
                && a.status != AvailabilityStatus::Cancelled
                && exclude_id.map_or(true, |ex| a.id != ex)
                && a.time_slot.overlaps(time_slot)
        }))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AvailabilityStatus,
        next: AvailabilityStatus,
    ) -> Result<Availability, SchedulingError> {
        expected.ensure_transition(next)?;

        let mut slots = self.availabilities.write().await;
        let current = slots
            .get_mut(&id)
            .ok_or(SchedulingError::AvailabilityNotFound)?;

        if current.status != expected {
            warn!(
                "Conditional update lost on availability {}: expected {}, found {}",
                id, expected, current.status
            );
            return Err(SchedulingError::SlotUnavailable);
        }

        current.status = next;
        debug!("Availability {} transitioned {} -> {}", id, expected, next);
        Ok(current.clone())
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryScheduleStore {
    async fn save(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;
        appointments.insert(appointment.id, appointment.clone());
        debug!("Appointment {} saved", appointment.id);
        Ok(appointment.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(&id).cloned())
    }

    async fn find_by_filters(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;

        let mut matches: Vec<Appointment> = appointments
            .values()
            .filter(|a| {
                filters
                    .patient_id
                    .as_ref()
                    .map_or(true, |p| &a.patient_id == p)
                    && filters.status.map_or(true, |st| a.status == st)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(matches)
    }

    async fn update(
        &self,
        appointment: &Appointment,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let mut appointments = self.appointments.write().await;
        if !appointments.contains_key(&appointment.id) {
            return Ok(None);
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(Some(appointment.clone()))
    }
}
