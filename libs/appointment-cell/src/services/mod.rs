pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notes;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use notes::ConsultationNoteService;
