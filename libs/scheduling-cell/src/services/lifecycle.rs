// libs/scheduling-cell/src/services/lifecycle.rs
//
// Status lifecycles for both scheduling entities, expressed as explicit
// transition tables (current state -> allowed next states) rather than
// checks scattered over call sites.

use crate::models::{AppointmentStatus, AvailabilityStatus, SchedulingError};

impl AvailabilityStatus {
    /// BOOKED -> AVAILABLE is the release performed when the owning
    /// appointment is cancelled or rescheduled; there is no direct
    /// self-service path out of BOOKED. CANCELLED is terminal.
    pub fn valid_transitions(&self) -> &'static [AvailabilityStatus] {
        match self {
            AvailabilityStatus::Available => {
                &[AvailabilityStatus::Booked, AvailabilityStatus::Cancelled]
            }
            AvailabilityStatus::Booked => &[AvailabilityStatus::Available],
            AvailabilityStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AvailabilityStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn ensure_transition(self, next: AvailabilityStatus) -> Result<(), SchedulingError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidAvailabilityTransition(self))
        }
    }
}

impl AppointmentStatus {
    /// SCHEDULED is the only non-terminal state.
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::NoShow
            | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn ensure_transition(self, next: AppointmentStatus) -> Result<(), SchedulingError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidAppointmentTransition(self))
        }
    }
}
