// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilters, AvailabilityStatus, SchedulingError,
};
use crate::repository::{AppointmentRepository, AvailabilityRepository};

/// Orchestrates availability lookup, the atomic booking transition, and
/// appointment creation as one logical unit. The two writes are not assumed
/// to share a transaction; a failure between them is rolled back by
/// compensation (releasing the slot that was just booked).
pub struct BookingService {
    appointments: Arc<dyn AppointmentRepository>,
    availabilities: Arc<dyn AvailabilityRepository>,
}

impl BookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        availabilities: Arc<dyn AvailabilityRepository>,
    ) -> Self {
        Self {
            appointments,
            availabilities,
        }
    }

    /// Book one availability for a patient. Exactly one of any number of
    /// concurrent callers wins the AVAILABLE -> BOOKED transition; the rest
    /// get `SlotUnavailable` and should pick a different slot rather than
    /// retry the same id.
    pub async fn book_appointment(
        &self,
        patient_id: &str,
        availability_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking availability {} for patient {}",
            availability_id, patient_id
        );

        let availability = self
            .availabilities
            .find_by_id(availability_id)
            .await?
            .ok_or(SchedulingError::AvailabilityNotFound)?;

        if availability.status != AvailabilityStatus::Available {
            warn!(
                "Availability {} is not bookable (status {})",
                availability_id, availability.status
            );
            return Err(SchedulingError::SlotUnavailable);
        }

        // The conditional update is the authority; the read above only
        // short-circuits requests that already lost.
        let booked = self
            .availabilities
            .transition_status(
                availability_id,
                AvailabilityStatus::Available,
                AvailabilityStatus::Booked,
            )
            .await?;

        let appointment = Appointment::schedule(patient_id, booked.id)?;

        match self.appointments.save(&appointment).await {
            Ok(saved) => {
                info!(
                    "Appointment {} scheduled against availability {}",
                    saved.id, availability_id
                );
                Ok(saved)
            }
            Err(save_error) => {
                warn!(
                    "Appointment persistence failed for availability {}, releasing slot: {}",
                    availability_id, save_error
                );
                self.release_availability(availability_id).await?;
                Err(save_error)
            }
        }
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment {}", id);
        self.appointments
            .find_by_id(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    pub async fn list_appointments(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.find_by_filters(filters).await?;
        debug!("Found {} appointments", appointments.len());
        Ok(appointments)
    }

    /// Cancel an appointment and free its slot for other patients: the
    /// reverse of booking, with the same compensation rules.
    pub async fn cancel_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        info!("Cancelling appointment {}", id);

        let appointment = self.get_appointment(id).await?;
        let cancelled = appointment.cancel()?;

        let saved = self
            .appointments
            .update(&cancelled)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        self.release_availability(saved.availability_id).await?;

        info!(
            "Appointment {} cancelled, availability {} released",
            id, saved.availability_id
        );
        Ok(saved)
    }

    pub async fn complete_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        info!("Completing appointment {}", id);

        let appointment = self.get_appointment(id).await?;
        let completed = appointment.complete()?;

        self.appointments
            .update(&completed)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    pub async fn mark_appointment_no_show(
        &self,
        id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        info!("Marking appointment {} as no-show", id);

        let appointment = self.get_appointment(id).await?;
        let no_show = appointment.mark_no_show()?;

        self.appointments
            .update(&no_show)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    /// Move a SCHEDULED appointment onto a different availability. The new
    /// slot is booked first (same atomic transition as a fresh booking); the
    /// old slot is released only after the appointment row points at the new
    /// one, so a crash in between never leaves the patient without a slot.
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        new_availability_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Rescheduling appointment {} onto availability {}",
            id, new_availability_id
        );

        let appointment = self.get_appointment(id).await?;
        let old_availability_id = appointment.availability_id;

        if new_availability_id == old_availability_id {
            return Err(SchedulingError::ValidationError(
                "Appointment already references this availability".to_string(),
            ));
        }

        self.availabilities
            .find_by_id(new_availability_id)
            .await?
            .ok_or(SchedulingError::AvailabilityNotFound)?;

        let rescheduled = appointment.reschedule(new_availability_id)?;

        self.availabilities
            .transition_status(
                new_availability_id,
                AvailabilityStatus::Available,
                AvailabilityStatus::Booked,
            )
            .await?;

        let saved = match self.appointments.update(&rescheduled).await {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                warn!(
                    "Appointment {} vanished during reschedule, releasing availability {}",
                    id, new_availability_id
                );
                self.release_availability(new_availability_id).await?;
                return Err(SchedulingError::AppointmentNotFound);
            }
            Err(update_error) => {
                warn!(
                    "Appointment update failed during reschedule, releasing availability {}: {}",
                    new_availability_id, update_error
                );
                self.release_availability(new_availability_id).await?;
                return Err(update_error);
            }
        };

        self.release_availability(old_availability_id).await?;

        info!(
            "Appointment {} rescheduled from availability {} to {}",
            id, old_availability_id, new_availability_id
        );
        Ok(saved)
    }

    /// BOOKED -> AVAILABLE conditional update. A failure here leaves the
    /// availability/appointment pair inconsistent and is the one condition
    /// needing manual reconciliation, hence the error-level log.
    async fn release_availability(&self, availability_id: Uuid) -> Result<(), SchedulingError> {
        match self
            .availabilities
            .transition_status(
                availability_id,
                AvailabilityStatus::Booked,
                AvailabilityStatus::Available,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(release_error) => {
                error!(
                    "CONSISTENCY ALERT: failed to release availability {}: {}",
                    availability_id, release_error
                );
                Err(SchedulingError::CompensationFailed {
                    availability_id,
                    reason: release_error.to_string(),
                })
            }
        }
    }
}
