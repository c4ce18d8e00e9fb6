// libs/scheduling-cell/src/repository/mod.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilters, Availability, AvailabilityFilters, AvailabilityStatus,
    SchedulingError, TimeSlot,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryScheduleStore;
pub use supabase::{SupabaseAppointmentRepository, SupabaseAvailabilityRepository};

#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn save(&self, availability: &Availability) -> Result<Availability, SchedulingError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Availability>, SchedulingError>;

    async fn find_by_filters(
        &self,
        filters: &AvailabilityFilters,
    ) -> Result<Vec<Availability>, SchedulingError>;

    /// Full-row update; `None` when the id is unknown.
    async fn update(
        &self,
        availability: &Availability,
    ) -> Result<Option<Availability>, SchedulingError>;

    /// True iff any non-CANCELLED availability of `doctor_id` overlaps
    /// `time_slot`, skipping `exclude_id` (the slot being edited). This is
    /// the admission check run before creating or updating an availability;
    /// it is best-effort, not atomic with the subsequent write.
    async fn check_overlap(
        &self,
        doctor_id: &str,
        time_slot: &TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, SchedulingError>;

    /// Conditional single-row status update: succeeds only if the persisted
    /// status still equals `expected` at the moment of the write. Among
    /// concurrent callers racing on the same id, exactly one wins; the rest
    /// get `SlotUnavailable`. This is the linchpin against double booking:
    /// booking is CAS(AVAILABLE -> BOOKED), releasing is
    /// CAS(BOOKED -> AVAILABLE).
    async fn transition_status(
        &self,
        id: Uuid,
        expected: AvailabilityStatus,
        next: AvailabilityStatus,
    ) -> Result<Availability, SchedulingError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn save(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    async fn find_by_filters(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn update(
        &self,
        appointment: &Appointment,
    ) -> Result<Option<Appointment>, SchedulingError>;
}
