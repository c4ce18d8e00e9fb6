// libs/scheduling-cell/src/services/availability.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Availability, AvailabilityFilters, CreateAvailabilityRequest, SchedulingError, TimeSlot,
    UpdateAvailabilityRequest,
};
use crate::repository::AvailabilityRepository;

pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
}

impl AvailabilityService {
    pub fn new(repository: Arc<dyn AvailabilityRepository>) -> Self {
        Self { repository }
    }

    /// Publish a new bookable slot for a doctor. A doctor cannot hold two
    /// simultaneously bookable overlapping slots, so the overlap check gates
    /// admission. The check and the insert are two storage calls, not one
    /// atomic unit: two clients publishing overlapping slots at the same
    /// instant can both pass; only the booking transition is race-proof.
    pub async fn create_availability(
        &self,
        request: CreateAvailabilityRequest,
    ) -> Result<Availability, SchedulingError> {
        info!("Creating availability for doctor {}", request.doctor_id);

        let availability = Availability::create(
            &request.doctor_id,
            &request.facility_id,
            &request.service_type_id,
            request.time_slot,
        )?;

        let has_overlap = self
            .repository
            .check_overlap(&availability.doctor_id, &availability.time_slot, None)
            .await?;

        if has_overlap {
            warn!(
                "Overlap detected for doctor {} in slot starting {}",
                availability.doctor_id, availability.time_slot.start_date_time
            );
            return Err(SchedulingError::OverlapDetected);
        }

        let saved = self.repository.save(&availability).await?;
        info!("Availability created with ID {}", saved.id);
        Ok(saved)
    }

    pub async fn get_availability(&self, id: Uuid) -> Result<Availability, SchedulingError> {
        debug!("Fetching availability {}", id);
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(SchedulingError::AvailabilityNotFound)
    }

    pub async fn list_availabilities(
        &self,
        filters: &AvailabilityFilters,
    ) -> Result<Vec<Availability>, SchedulingError> {
        let availabilities = self.repository.find_by_filters(filters).await?;
        debug!("Found {} availabilities", availabilities.len());
        Ok(availabilities)
    }

    /// Partial update of a slot that is still AVAILABLE. When the time slot
    /// changes, the overlap check runs again with the slot's own id
    /// excluded, so a slot never conflicts with itself.
    pub async fn update_availability(
        &self,
        id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<Availability, SchedulingError> {
        info!("Updating availability {}", id);

        let availability = self.get_availability(id).await?;

        if let Some(new_slot) = &request.time_slot {
            // Malformed slots are rejected before any storage query.
            let new_slot = TimeSlot::new(new_slot.start_date_time, new_slot.duration_minutes)?;

            let has_overlap = self
                .repository
                .check_overlap(&availability.doctor_id, &new_slot, Some(id))
                .await?;

            if has_overlap {
                warn!(
                    "Overlap detected when updating availability {} for doctor {}",
                    id, availability.doctor_id
                );
                return Err(SchedulingError::OverlapDetected);
            }
        }

        let updated = availability.update(
            request.facility_id,
            request.service_type_id,
            request.time_slot,
        )?;

        let saved = self
            .repository
            .update(&updated)
            .await?
            .ok_or(SchedulingError::AvailabilityNotFound)?;

        info!("Availability {} updated", id);
        Ok(saved)
    }

    /// Withdraw a slot. Rejected while BOOKED: a booked slot is freed via
    /// the owning appointment, not here.
    pub async fn cancel_availability(&self, id: Uuid) -> Result<Availability, SchedulingError> {
        info!("Cancelling availability {}", id);

        let availability = self.get_availability(id).await?;
        let cancelled = availability.cancel()?;

        let saved = self
            .repository
            .update(&cancelled)
            .await?
            .ok_or(SchedulingError::AvailabilityNotFound)?;

        info!("Availability {} cancelled", id);
        Ok(saved)
    }
}
