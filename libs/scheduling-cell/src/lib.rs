pub mod models;
pub mod repository;
pub mod services;

// Re-export all models and services for external use
pub use models::*;
pub use repository::{
    AppointmentRepository, AvailabilityRepository, InMemoryScheduleStore,
    SupabaseAppointmentRepository, SupabaseAvailabilityRepository,
};
pub use services::{AvailabilityService, BookingService};
