pub mod availability;
pub mod booking;
pub mod lifecycle;

pub use availability::AvailabilityService;
pub use booking::BookingService;
